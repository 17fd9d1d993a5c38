use anyhow::Result;
use odb_ir::{BlockData, Datablock, Molecule, OdbDatabase, molecule_names};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::convert::{Input, parse_input};

const PREVIEW_VALUES: usize = 4;

pub fn run_info(inputs: &[PathBuf]) -> Result<()> {
    // Decode in parallel, report in argument order.
    let parsed: Vec<Result<Input>> = inputs.par_iter().map(|p| parse_input(p, false)).collect();

    for (i, (path, input)) in inputs.iter().zip(parsed).enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", describe(path, &input?));
    }
    Ok(())
}

fn describe(path: &Path, input: &Input) -> String {
    let db = &input.db;
    let mut out = String::new();

    let _ = writeln!(out, "File:        {}", path.display());
    match &input.metadata {
        Some(meta) => {
            let _ = writeln!(out, "Encoding:    {}", meta.encoding);
            let _ = writeln!(
                out,
                "Compression: {}",
                meta.compression.algorithm_name().unwrap_or("none")
            );
            let _ = writeln!(out, "Size:        {} bytes", meta.size);
            if meta.dgnl {
                let _ = writeln!(out, "Layout:      dgnl");
            }
            if meta.warnings > 0 {
                let _ = writeln!(out, "Warnings:    {}", meta.warnings);
            }
        }
        None => {
            let _ = writeln!(out, "Encoding:    serialized model");
        }
    }
    let _ = writeln!(out, "Datablocks:  {}", db.len());

    for block in db {
        let _ = writeln!(
            out,
            "  {:<25} {} {:>8}  {}",
            block.name,
            block.block_type(),
            block.len(),
            preview(block)
        );
    }

    let molecules = describe_molecules(db);
    if !molecules.is_empty() {
        let _ = writeln!(out, "Molecules:   {}", molecules.join(", "));
    }
    out
}

fn describe_molecules(db: &OdbDatabase) -> Vec<String> {
    molecule_names(db)
        .into_iter()
        .map(|name| match Molecule::from_database(db, &name) {
            Ok(m) => format!(
                "{} ({} atoms, {} residues)",
                name,
                m.atom_count(),
                m.residue_count()
            ),
            Err(e) => format!("{name} (incomplete: {e})"),
        })
        .collect()
}

/// First few values of a block.
fn preview(block: &Datablock) -> String {
    let mut parts: Vec<String> = match &block.data {
        BlockData::Integer(v) => v.iter().take(PREVIEW_VALUES).map(ToString::to_string).collect(),
        BlockData::Real(v) => v.iter().take(PREVIEW_VALUES).map(|x| format!("{x:.3}")).collect(),
        BlockData::Character(v) => v.iter().take(PREVIEW_VALUES).map(|s| format!("'{s}'")).collect(),
        BlockData::Text(v) => v.iter().take(1).map(|s| format!("\"{s}\"")).collect(),
    };
    let shown = match block.data {
        BlockData::Text(_) => 1,
        _ => PREVIEW_VALUES,
    };
    if block.len() > shown {
        parts.push("...".into());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preview_truncates() {
        let b = Datablock::new("n", BlockData::Integer(vec![1, 2, 3, 4, 5]));
        assert_eq!(preview(&b), "1 2 3 4 ...");
        let b = Datablock::new("c", BlockData::Character(vec!["CA".into()]));
        assert_eq!(preview(&b), "'CA'");
        let b = Datablock::new("t", BlockData::Text(vec!["one".into(), "two".into()]));
        assert_eq!(preview(&b), "\"one\" ...");
        let b = Datablock::new("r", BlockData::Real(Vec::new()));
        assert_eq!(preview(&b), "");
    }

    #[test]
    fn describe_lists_blocks_and_molecules() {
        let db: OdbDatabase = [
            Datablock::new("m_atom_xyz", BlockData::Real(vec![0.0; 6])),
            Datablock::new("m_atom_name", BlockData::Character(vec!["N".into(), "CA".into()])),
            Datablock::new("x_atom_xyz", BlockData::Real(vec![0.0; 4])),
        ]
        .into_iter()
        .collect();
        let text = describe(Path::new("t.json"), &Input { db, metadata: None });

        assert!(text.contains("Datablocks:  3"));
        assert!(text.contains("m_atom_name"));
        assert!(text.contains("m (2 atoms, 0 residues)"));
        assert!(text.contains("x (incomplete:"));
    }
}
