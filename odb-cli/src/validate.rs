use anyhow::{Result, bail};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::convert::parse_input;

/// Decode one file strictly and collect its validation errors.
fn check_file(input: &Path) -> Vec<String> {
    let parsed = match parse_input(input, false) {
        Ok(p) => p,
        Err(e) => return vec![format!("{e:#}")],
    };
    match odb_ir::validate_database(&parsed.db) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

pub fn run_validate(inputs: &[PathBuf], quiet: bool, summary: bool) -> Result<()> {
    let results: Vec<(&PathBuf, Vec<String>)> = inputs
        .par_iter()
        .map(|input| (input, check_file(input)))
        .collect();

    let mut failed = 0;
    for (input, errors) in &results {
        if errors.is_empty() {
            if !quiet {
                println!("{}: valid", input.display());
            }
            continue;
        }
        failed += 1;

        if !quiet && !summary {
            for e in errors {
                eprintln!("{}: {e}", input.display());
            }
        }
        if summary || !quiet {
            println!(
                "{}: {} validation error{}",
                input.display(),
                errors.len(),
                plural(errors.len())
            );
        }
    }

    if failed > 0 {
        bail!(
            "{failed} of {} file{} failed validation",
            inputs.len(),
            plural(inputs.len())
        );
    }
    Ok(())
}
