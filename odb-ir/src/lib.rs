pub mod filter;
pub mod molecule;
pub mod types;
pub mod validate;

pub use filter::{filter_by_pattern, matches_pattern, select};
pub use molecule::{Atom, Molecule, MoleculeError, Residue, molecule_names};
pub use types::*;
pub use validate::{ValidationError, validate_database};
