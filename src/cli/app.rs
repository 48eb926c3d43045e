use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "survey-reports")]
#[command(about = "Render pending well survey records into a consolidated report workbook")]
pub struct Cli {
    /// Settings file (defaults to <config dir>/survey-reports/settings.toml)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Write the log to this file (truncated) instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render every pending row into the report and mark the rows generated
    Generate,
    /// Put a record back to pending so the next run renders it again
    Reset {
        /// Value of the identifying field (well number)
        identifier: String,
        /// Run `generate` right after the reset
        #[arg(long)]
        generate: bool,
    },
    /// Store a survey submission as a pending row and upload its photos
    Ingest {
        /// JSON file holding the submission
        #[arg(long)]
        data: PathBuf,
        /// Photo files to attach, in order
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
    },
    /// Consolidate records from a local JSON file into a local workbook
    Render {
        /// Template workbook (.xlsx)
        #[arg(long)]
        template: PathBuf,
        /// JSON array of records
        #[arg(long)]
        records: PathBuf,
        /// Output workbook path
        #[arg(long)]
        out: PathBuf,
    },
}
