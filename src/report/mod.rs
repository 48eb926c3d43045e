//! Record-to-document rendering pipeline.

pub mod cell;
pub mod consolidate;
pub mod filler;
pub mod lifecycle;
pub mod mapping;
pub mod package;
pub mod raster;
pub mod record;
pub mod workbook;

pub use cell::CellRef;
pub use consolidate::{Consolidation, Consolidator, SheetNamer};
pub use filler::{FillReport, SheetFiller, SheetLayout};
pub use lifecycle::{ReportRunner, RunSummary};
pub use mapping::{FieldMapping, Rule, survey_mapping};
pub use raster::{FontMetrics, Rasterizer};
pub use record::{Connection, Record};
pub use workbook::{Workbook, Worksheet};
