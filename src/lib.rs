//! Survey record intake and report generation.
//!
//! Rows collected from the field survey app live in a spreadsheet; each run
//! renders the pending ones into a single multi-sheet report workbook.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod intake;
pub mod report;
pub mod reset;

pub use error::{Error, Result};
