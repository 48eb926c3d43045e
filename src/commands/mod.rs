pub mod generate;
pub mod ingest;
pub mod render;
pub mod reset;

pub use generate::generate_command;
pub use ingest::ingest_command;
pub use render::render_command;
pub use reset::reset_command;

use crate::config::Settings;
use crate::report::filler::SheetFiller;
use crate::report::raster::{FontMetrics, Rasterizer};

/// Assemble the sheet filler from the rendering settings.
pub fn build_filler(settings: &Settings) -> SheetFiller {
    let metrics = FontMetrics::load(settings.font_path.as_deref());
    let placeholder = settings
        .placeholder_path
        .as_deref()
        .and_then(SheetFiller::load_placeholder);
    SheetFiller::new(Rasterizer::new(metrics), settings.sheet_layout()).with_placeholder(placeholder)
}
