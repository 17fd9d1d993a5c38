use anyhow::{Context, Result};
use odb_ir::{BlockData, Datablock};
use std::fmt::Write as _;
use std::path::Path;

use crate::convert::parse_input;

const INTEGERS_PER_LINE: usize = 8;
const REALS_PER_LINE: usize = 6;
const CHARACTERS_PER_LINE: usize = 10;

pub fn run_show(input: &Path, name: &str) -> Result<()> {
    let parsed = parse_input(input, false)?;
    let block = parsed
        .db
        .get(name)
        .with_context(|| format!("no datablock '{name}' in {}", input.display()))?;
    print!("{}", render(block));
    Ok(())
}

fn render(block: &Datablock) -> String {
    let mut out = format!("{} {} {}\n", block.name, block.block_type(), block.len());
    match &block.data {
        BlockData::Integer(v) => {
            for chunk in v.chunks(INTEGERS_PER_LINE) {
                for x in chunk {
                    let _ = write!(out, "{x:>10}");
                }
                out.push('\n');
            }
        }
        BlockData::Real(v) => {
            for chunk in v.chunks(REALS_PER_LINE) {
                for x in chunk {
                    let _ = write!(out, "{x:>13.4}");
                }
                out.push('\n');
            }
        }
        BlockData::Character(v) => {
            for chunk in v.chunks(CHARACTERS_PER_LINE) {
                let line: Vec<String> = chunk.iter().map(|s| format!("{s:<6}")).collect();
                let _ = writeln!(out, "{}", line.join(" ").trim_end());
            }
        }
        BlockData::Text(v) => {
            for line in v {
                let _ = writeln!(out, "{line}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_integers_wrap() {
        let b = Datablock::new("n", BlockData::Integer((1..=9).collect()));
        let text = render(&b);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "n I 9");
        assert_eq!(lines[1].len(), 80);
        assert_eq!(lines[2], "         9");
    }

    #[test]
    fn render_characters_and_text() {
        let b = Datablock::new("c", BlockData::Character(vec!["N".into(), "CA".into()]));
        assert_eq!(render(&b), "c C 2\nN      CA\n");
        let b = Datablock::new("t", BlockData::Text(vec!["hello".into(), String::new()]));
        assert_eq!(render(&b), "t T 2\nhello\n\n");
    }

    #[test]
    fn render_reals() {
        let b = Datablock::new("r", BlockData::Real(vec![1.5, -0.25]));
        assert_eq!(render(&b), "r R 2\n       1.5000      -0.2500\n");
    }
}
