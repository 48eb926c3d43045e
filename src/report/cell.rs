//! A1-style cell references.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{Error, Result};

static A1_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{1,3})([1-9][0-9]{0,6})$").expect("valid A1 regex"));

/// Zero-based (row, column) position of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Parse an A1 reference such as `D3` or `AA10`.
    pub fn parse(a1: &str) -> Result<Self> {
        let caps = A1_PATTERN
            .captures(a1)
            .ok_or_else(|| Error::Config(format!("invalid cell reference '{}'", a1)))?;

        let col = column_index(&caps[1])
            .ok_or_else(|| Error::Config(format!("column out of range in '{}'", a1)))?;
        let row: u32 = caps[2]
            .parse()
            .map_err(|_| Error::Config(format!("row out of range in '{}'", a1)))?;

        Ok(Self { row: row - 1, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

/// `A` -> 0, `Z` -> 25, `AA` -> 26.
pub fn column_index(letters: &str) -> Option<u16> {
    let mut index: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        index = index * 26 + (ch as u32 - 'A' as u32 + 1);
    }
    // Spreadsheet columns stop at XFD (16384).
    if index == 0 || index > 16_384 {
        return None;
    }
    Some((index - 1) as u16)
}

/// 0 -> `A`, 25 -> `Z`, 26 -> `AA`.
pub fn column_letters(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
