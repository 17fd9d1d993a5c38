//! Column layout of formatted type `C` datablocks.
//!
//! The header of a formatted `C` block carries the Fortran FORMAT the
//! values were written with. Only the character-relevant subset is
//! interpreted: `nX` skips columns, `nAw` reads `n` fields of width `w`
//! (default 6) and `n(...)` repeats a group. Other edit descriptors are
//! ignored together with their width.
//!
//! ```text
//! (2a)          -> AAAAAAAAAAAA
//! (1x,5a)       -> _AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA
//! (5(1x,a6))    -> _AAAAAA_AAAAAA_AAAAAA_AAAAAA_AAAAAA
//! (1x,2(2x,a))  -> ___AAAAAA__AAAAAA
//! ```

use thiserror::Error;

/// Default width of an `A` descriptor without explicit width.
pub const DEFAULT_FIELD_WIDTH: usize = odb_ir::CHARACTER_WIDTH;

const MAX_SLOTS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("unbalanced parentheses in format '{0}'")]
    Unbalanced(String),
    #[error("format '{0}' expands to more than {max} columns", max = MAX_SLOTS)]
    TooLarge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Skip(usize),
    Field(usize),
}

/// One line's worth of skip and field slots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Layout {
    slots: Vec<Slot>,
}

impl Layout {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn field_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Field(_)))
            .count()
    }

    /// Number of columns one pass of the layout covers.
    pub fn width(&self) -> usize {
        self.slots
            .iter()
            .fold(0usize, |acc, s| match s {
                Slot::Skip(n) | Slot::Field(n) => acc.saturating_add(*n),
            })
    }

    /// Cut one line into fields. Columns beyond the end of the line read as
    /// blanks; trailing blanks of each field are stripped.
    pub fn split_line(&self, line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        let mut col: usize = 0;
        let mut fields = Vec::with_capacity(self.field_count());
        for slot in &self.slots {
            match *slot {
                Slot::Skip(n) => col = col.saturating_add(n),
                Slot::Field(w) => {
                    let end = col.saturating_add(w).min(chars.len());
                    let field: String = chars.get(col..end).unwrap_or_default().iter().collect();
                    fields.push(field.trim_end_matches(|c: char| c <= ' ').to_string());
                    col = col.saturating_add(w);
                }
            }
        }
        fields
    }
}

/// Compile a Fortran FORMAT string into a line layout.
pub fn compile(fmt: &str) -> Result<Layout, FormatError> {
    let chars: Vec<char> = fmt.chars().collect();
    let mut parser = Parser {
        chars: &chars,
        pos: 0,
        fmt,
    };
    let slots = parser.list(0)?;
    Ok(Layout { slots })
}

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    fmt: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        // Overlong counts saturate and are caught by the slot limit.
        Some(digits.parse().unwrap_or(usize::MAX))
    }

    fn push(&self, slots: &mut Vec<Slot>, slot: Slot, count: usize) -> Result<(), FormatError> {
        if slots.len().saturating_add(count) > MAX_SLOTS {
            return Err(FormatError::TooLarge(self.fmt.to_string()));
        }
        slots.extend(std::iter::repeat_n(slot, count));
        Ok(())
    }

    fn list(&mut self, depth: usize) -> Result<Vec<Slot>, FormatError> {
        let mut slots = Vec::new();
        loop {
            let repeat = self.number();
            let count = repeat.unwrap_or(1).max(1);
            let Some(c) = self.peek() else {
                if depth > 0 {
                    return Err(FormatError::Unbalanced(self.fmt.to_string()));
                }
                return Ok(slots);
            };
            self.pos += 1;
            match c.to_ascii_lowercase() {
                '(' => {
                    let group = self.list(depth + 1)?;
                    if slots.len().saturating_add(group.len().saturating_mul(count)) > MAX_SLOTS {
                        return Err(FormatError::TooLarge(self.fmt.to_string()));
                    }
                    for _ in 0..count {
                        slots.extend_from_slice(&group);
                    }
                }
                ')' => {
                    if depth == 0 {
                        return Err(FormatError::Unbalanced(self.fmt.to_string()));
                    }
                    return Ok(slots);
                }
                'x' => self.push(&mut slots, Slot::Skip(count), 1)?,
                'a' => {
                    let width = self.number().unwrap_or(DEFAULT_FIELD_WIDTH);
                    self.push(&mut slots, Slot::Field(width), count)?;
                }
                c if c.is_ascii_alphabetic() => {
                    // Width and precision of an ignored descriptor (I5, F8.3).
                    while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                        self.pos += 1;
                    }
                }
                _ => {}
            }
        }
    }
}
