//! Molecule view over an O database.
//!
//! O keeps a molecule `m` as a family of datablocks sharing the prefix `m_`:
//! `m_atom_xyz` (3 reals per atom), `m_atom_name`, optional per-atom
//! `m_atom_b`, `m_atom_wt` and `m_atom_z`, and per-residue `m_residue_name`,
//! `m_residue_type` and `m_residue_pointers` (first and last atom of each
//! residue, 1-based).

use crate::types::{BlockData, BlockType, OdbDatabase};
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

const ATOM_XYZ: &str = "_atom_xyz";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoleculeError {
    #[error("datablock '{0}' not found")]
    MissingBlock(String),
    #[error("datablock '{block}' has type {actual}, expected {expected}")]
    WrongType {
        block: String,
        expected: BlockType,
        actual: BlockType,
    },
    #[error("datablock '{block}' holds {len} reals, not a multiple of 3")]
    CoordinateCount { block: String, len: usize },
    #[error("datablock '{block}' has {actual} elements, expected {expected}")]
    LengthMismatch {
        block: String,
        expected: usize,
        actual: usize,
    },
    #[error("residue {residue} points at atoms {first}..{last}, molecule has {atoms} atoms")]
    ResiduePointer {
        residue: usize,
        first: i32,
        last: i32,
        atoms: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    pub name: String,
    pub position: [f32; 3],
    pub b_factor: Option<f32>,
    pub occupancy: Option<f32>,
    pub atomic_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Residue {
    pub name: String,
    pub residue_type: Option<String>,
    /// Atom indices (0-based, half-open).
    pub atoms: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<Atom>,
    pub residues: Vec<Residue>,
}

/// Names of all molecules in the database, in file order.
pub fn molecule_names(db: &OdbDatabase) -> Vec<String> {
    db.iter()
        .filter(|b| b.block_type() == BlockType::Real)
        .filter_map(|b| {
            let lower = b.name.to_ascii_lowercase();
            let prefix = lower.strip_suffix(ATOM_XYZ)?;
            (!prefix.is_empty()).then(|| prefix.to_string())
        })
        .collect()
}

impl Molecule {
    /// Assemble molecule `name` from its datablocks.
    pub fn from_database(db: &OdbDatabase, name: &str) -> Result<Self, MoleculeError> {
        let name = name.to_ascii_lowercase();
        let block = |suffix: &str| format!("{name}_{suffix}");

        let xyz_name = block("atom_xyz");
        let xyz = reals(db, &xyz_name)?.ok_or_else(|| MoleculeError::MissingBlock(xyz_name.clone()))?;
        if xyz.len() % 3 != 0 {
            return Err(MoleculeError::CoordinateCount {
                block: xyz_name,
                len: xyz.len(),
            });
        }
        let natoms = xyz.len() / 3;

        let names_block = block("atom_name");
        let names = strings(db, &names_block, BlockType::Character)?
            .ok_or_else(|| MoleculeError::MissingBlock(names_block.clone()))?;
        check_len(&names_block, natoms, names.len())?;

        let b_block = block("atom_b");
        let b_factors = reals(db, &b_block)?;
        if let Some(v) = b_factors {
            check_len(&b_block, natoms, v.len())?;
        }
        let wt_block = block("atom_wt");
        let occupancies = reals(db, &wt_block)?;
        if let Some(v) = occupancies {
            check_len(&wt_block, natoms, v.len())?;
        }
        let z_block = block("atom_z");
        let atomic_numbers = integers(db, &z_block)?;
        if let Some(v) = atomic_numbers {
            check_len(&z_block, natoms, v.len())?;
        }

        let atoms = (0..natoms)
            .map(|i| Atom {
                name: names[i].clone(),
                position: [xyz[3 * i], xyz[3 * i + 1], xyz[3 * i + 2]],
                b_factor: b_factors.map(|v| v[i]),
                occupancy: occupancies.map(|v| v[i]),
                atomic_number: atomic_numbers.map(|v| v[i]),
            })
            .collect();

        let residues = Self::residues(db, &name, natoms)?;

        Ok(Molecule {
            name,
            atoms,
            residues,
        })
    }

    fn residues(
        db: &OdbDatabase,
        name: &str,
        natoms: usize,
    ) -> Result<Vec<Residue>, MoleculeError> {
        let name_block = format!("{name}_residue_name");
        let Some(res_names) = strings(db, &name_block, BlockType::Character)? else {
            return Ok(Vec::new());
        };
        let nres = res_names.len();

        let ptr_block = format!("{name}_residue_pointers");
        let pointers =
            integers(db, &ptr_block)?.ok_or_else(|| MoleculeError::MissingBlock(ptr_block.clone()))?;
        check_len(&ptr_block, 2 * nres, pointers.len())?;

        let type_block = format!("{name}_residue_type");
        let res_types = strings(db, &type_block, BlockType::Character)?;
        if let Some(t) = res_types {
            check_len(&type_block, nres, t.len())?;
        }

        res_names
            .iter()
            .enumerate()
            .map(|(i, res_name)| {
                let (first, last) = (pointers[2 * i], pointers[2 * i + 1]);
                let in_range = first >= 1 && last >= first && (last as usize) <= natoms;
                if !in_range {
                    return Err(MoleculeError::ResiduePointer {
                        residue: i + 1,
                        first,
                        last,
                        atoms: natoms,
                    });
                }
                Ok(Residue {
                    name: res_name.clone(),
                    residue_type: res_types.map(|t| t[i].clone()),
                    atoms: (first as usize - 1)..(last as usize),
                })
            })
            .collect()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    /// Residue containing the atom at `atom_index` (0-based).
    pub fn residue_of(&self, atom_index: usize) -> Option<&Residue> {
        self.residues.iter().find(|r| r.atoms.contains(&atom_index))
    }

    /// Atoms of one residue.
    pub fn residue_atoms(&self, residue: &Residue) -> &[Atom] {
        &self.atoms[residue.atoms.clone()]
    }

    /// Mean position of all atoms, `None` for an empty molecule.
    pub fn centroid(&self) -> Option<[f32; 3]> {
        if self.atoms.is_empty() {
            return None;
        }
        let mut sum = [0.0f64; 3];
        for atom in &self.atoms {
            for (s, p) in sum.iter_mut().zip(atom.position) {
                *s += f64::from(p);
            }
        }
        let n = self.atoms.len() as f64;
        Some(sum.map(|s| (s / n) as f32))
    }
}

fn check_len(block: &str, expected: usize, actual: usize) -> Result<(), MoleculeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MoleculeError::LengthMismatch {
            block: block.to_string(),
            expected,
            actual,
        })
    }
}

fn wrong_type(block: &str, expected: BlockType, data: &BlockData) -> MoleculeError {
    MoleculeError::WrongType {
        block: block.to_string(),
        expected,
        actual: data.block_type(),
    }
}

fn reals<'a>(db: &'a OdbDatabase, block: &str) -> Result<Option<&'a [f32]>, MoleculeError> {
    match db.get(block).map(|b| &b.data) {
        None => Ok(None),
        Some(BlockData::Real(v)) => Ok(Some(v)),
        Some(other) => Err(wrong_type(block, BlockType::Real, other)),
    }
}

fn integers<'a>(db: &'a OdbDatabase, block: &str) -> Result<Option<&'a [i32]>, MoleculeError> {
    match db.get(block).map(|b| &b.data) {
        None => Ok(None),
        Some(BlockData::Integer(v)) => Ok(Some(v)),
        Some(other) => Err(wrong_type(block, BlockType::Integer, other)),
    }
}

fn strings<'a>(
    db: &'a OdbDatabase,
    block: &str,
    expected: BlockType,
) -> Result<Option<&'a [String]>, MoleculeError> {
    match db.get(block).map(|b| &b.data) {
        None => Ok(None),
        Some(BlockData::Character(v)) if expected == BlockType::Character => Ok(Some(v)),
        Some(BlockData::Text(v)) if expected == BlockType::Text => Ok(Some(v)),
        Some(other) => Err(wrong_type(block, expected, other)),
    }
}
