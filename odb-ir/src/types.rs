use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest datablock name the binary header can hold.
pub const MAX_NAME_LEN: usize = 25;

/// Width of a type `C` element.
pub const CHARACTER_WIDTH: usize = 6;

// --- Top-level ---

/// An O database: named datablocks in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OdbDatabase {
    pub blocks: Vec<Datablock>,
}

impl OdbDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a datablock by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Datablock> {
        self.blocks.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Datablock> {
        self.blocks
            .iter_mut()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    /// Insert a datablock. A block with the same name is replaced in place
    /// and returned; otherwise the block is appended.
    pub fn insert(&mut self, block: Datablock) -> Option<Datablock> {
        match self.get_mut(&block.name) {
            Some(existing) => Some(std::mem::replace(existing, block)),
            None => {
                self.blocks.push(block);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Datablock> {
        let idx = self
            .blocks
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(name))?;
        Some(self.blocks.remove(idx))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datablock> {
        self.blocks.iter()
    }

    /// Integer values of a block, if it exists and has type `I`.
    pub fn integers(&self, name: &str) -> Option<&[i32]> {
        match &self.get(name)?.data {
            BlockData::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Real values of a block, if it exists and has type `R`.
    pub fn reals(&self, name: &str) -> Option<&[f32]> {
        match &self.get(name)?.data {
            BlockData::Real(v) => Some(v),
            _ => None,
        }
    }

    /// String values of a block, if it exists and has type `C` or `T`.
    pub fn strings(&self, name: &str) -> Option<&[String]> {
        match &self.get(name)?.data {
            BlockData::Character(v) | BlockData::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a OdbDatabase {
    type Item = &'a Datablock;
    type IntoIter = std::slice::Iter<'a, Datablock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl FromIterator<Datablock> for OdbDatabase {
    fn from_iter<I: IntoIterator<Item = Datablock>>(iter: I) -> Self {
        let mut db = OdbDatabase::new();
        for block in iter {
            db.insert(block);
        }
        db
    }
}

// --- Datablocks ---

/// One named, typed array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datablock {
    pub name: String,
    #[serde(flatten)]
    pub data: BlockData,
}

impl Datablock {
    pub fn new(name: impl Into<String>, data: BlockData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.data.block_type()
    }

    /// Number of elements (records for type `T`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Payload of a datablock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum BlockData {
    #[serde(rename = "I")]
    Integer(Vec<i32>),
    #[serde(rename = "R")]
    Real(Vec<f32>),
    #[serde(rename = "C")]
    Character(Vec<String>),
    #[serde(rename = "T")]
    Text(Vec<String>),
}

impl BlockData {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockData::Integer(_) => BlockType::Integer,
            BlockData::Real(_) => BlockType::Real,
            BlockData::Character(_) => BlockType::Character,
            BlockData::Text(_) => BlockType::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BlockData::Integer(v) => v.len(),
            BlockData::Real(v) => v.len(),
            BlockData::Character(v) | BlockData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Datablock type letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    Integer,
    Real,
    Character,
    Text,
}

impl BlockType {
    pub fn code(self) -> char {
        match self {
            BlockType::Integer => 'I',
            BlockType::Real => 'R',
            BlockType::Character => 'C',
            BlockType::Text => 'T',
        }
    }

    /// Parse a type letter, ignoring case.
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'I' => Some(BlockType::Integer),
            'R' => Some(BlockType::Real),
            'C' => Some(BlockType::Character),
            'T' => Some(BlockType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
