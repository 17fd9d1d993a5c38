use crate::molecule::{Molecule, MoleculeError, molecule_names};
use crate::types::{BlockData, CHARACTER_WIDTH, MAX_NAME_LEN, OdbDatabase};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("empty datablock name at position {0}")]
    EmptyName(usize),
    #[error("datablock name '{0}' is longer than {max} characters", max = MAX_NAME_LEN)]
    NameTooLong(String),
    #[error("datablock name '{0}' is not lower case")]
    NameNotLowercase(String),
    #[error("datablock name '{0}' contains blanks or starts with '!'")]
    InvalidName(String),
    #[error("duplicate datablock name '{0}'")]
    DuplicateName(String),
    #[error("element {index} of '{block}' is longer than {width} characters: '{value}'", width = CHARACTER_WIDTH)]
    CharacterTooLong {
        block: String,
        index: usize,
        value: String,
    },
    #[error("element {index} of '{block}' contains a line terminator")]
    LineBreak { block: String, index: usize },
    #[error("element {index} of '{block}' ends in a blank or control character")]
    TrailingBlank { block: String, index: usize },
    #[error("molecule '{0}': {1}")]
    Molecule(String, MoleculeError),
}

/// Validate an OdbDatabase for structural consistency.
pub fn validate_database(db: &OdbDatabase) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for (pos, block) in db.blocks.iter().enumerate() {
        let name = &block.name;
        if name.is_empty() {
            errors.push(ValidationError::EmptyName(pos));
            continue;
        }
        if name.len() > MAX_NAME_LEN {
            errors.push(ValidationError::NameTooLong(name.clone()));
        }
        if name.starts_with('!') || name.chars().any(char::is_whitespace) {
            errors.push(ValidationError::InvalidName(name.clone()));
        }
        if name.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push(ValidationError::NameNotLowercase(name.clone()));
        }
        if !names.insert(name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateName(name.clone()));
        }

        match &block.data {
            BlockData::Character(values) => {
                for (index, value) in values.iter().enumerate() {
                    check_value(&mut errors, name, index, value);
                    if value.chars().count() > CHARACTER_WIDTH {
                        errors.push(ValidationError::CharacterTooLong {
                            block: name.clone(),
                            index,
                            value: value.clone(),
                        });
                    }
                }
            }
            BlockData::Text(records) => {
                for (index, rec) in records.iter().enumerate() {
                    check_value(&mut errors, name, index, rec);
                }
            }
            BlockData::Real(values) => {
                let non_finite = values.iter().filter(|v| !v.is_finite()).count();
                if non_finite > 0 {
                    log::warn!("datablock '{}' has {} non-finite reals", name, non_finite);
                }
            }
            BlockData::Integer(_) => {}
        }
    }

    for mol in molecule_names(db) {
        if let Err(e) = Molecule::from_database(db, &mol) {
            errors.push(ValidationError::Molecule(mol, e));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Readers end values at line breaks and strip trailing blanks and control
/// characters, so neither can be stored.
fn check_value(errors: &mut Vec<ValidationError>, block: &str, index: usize, value: &str) {
    if value.contains(['\r', '\n']) {
        errors.push(ValidationError::LineBreak {
            block: block.to_string(),
            index,
        });
    } else if value.ends_with(|c: char| c <= ' ') {
        errors.push(ValidationError::TrailingBlank {
            block: block.to_string(),
            index,
        });
    }
}
