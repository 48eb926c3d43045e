//! Populates one worksheet from one record.

use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;

use super::cell::CellRef;
use super::mapping::{Applied, FieldMapping, FieldOutcome, OBSERVATIONS_FIELD, Skipped, survey_mapping};
use super::raster::Rasterizer;
use super::record::{Record, value_text};
use super::workbook::{BorderWeight, CellValue, Edge, OutsideFill, Worksheet, is_embeddable_image};
use crate::error::{Error, Result};

/// Fixed positions and sizes of the report template.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub connections_anchor: CellRef,
    pub connections_width_px: u32,
    /// Receives the first connection's crown elevation.
    pub crown_elevation_cell: CellRef,
    pub placeholder_anchor: CellRef,
    pub observations_width: usize,
    pub observations_filler: char,
    pub content_last_row: u32,
    pub content_last_col: u16,
    pub outside_rgb: u32,
    pub outside_extra_rows: u32,
    pub outside_extra_cols: u16,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            connections_anchor: CellRef::new(54, 12),   // M55
            connections_width_px: 380,
            crown_elevation_cell: CellRef::new(6, 3),  // D7
            placeholder_anchor: CellRef::new(1, 12),    // M2
            observations_width: 90,
            observations_filler: '_',
            content_last_row: 84,                       // row 85
            content_last_col: 18,                       // column S
            outside_rgb: 0xFFFFFF,
            outside_extra_rows: 60,
            outside_extra_cols: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStep {
    Fields,
    Connections,
    Placeholder,
    Frame,
}

/// What one `fill` call did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    pub fields: Vec<(String, FieldOutcome)>,
    pub connections_rendered: usize,
    pub placeholder_embedded: bool,
    pub failures: Vec<(FillStep, String)>,
}

impl FillReport {
    pub fn applied(&self) -> usize {
        self.fields.iter().filter(|(_, o)| o.is_ok()).count()
    }

    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, o)| o)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Truncate or right-pad `text` to exactly `width` characters.
pub fn fixed_width(text: &str, width: usize, filler: char) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(filler).take(width - len));
    out
}

pub struct SheetFiller {
    mapping: &'static FieldMapping,
    rasterizer: Rasterizer,
    placeholder: Option<Vec<u8>>,
    layout: SheetLayout,
}

impl SheetFiller {
    pub fn new(rasterizer: Rasterizer, layout: SheetLayout) -> Self {
        Self {
            mapping: survey_mapping(),
            rasterizer,
            placeholder: None,
            layout,
        }
    }

    pub fn with_placeholder(mut self, png: Option<Vec<u8>>) -> Self {
        self.placeholder = png;
        self
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Read the schematic placeholder; a missing or undecodable file is
    /// logged and tolerated.
    pub fn load_placeholder(path: &Path) -> Option<Vec<u8>> {
        match std::fs::read(path) {
            Ok(bytes) if is_embeddable_image(&bytes) => Some(bytes),
            Ok(_) => {
                warn!("Schematic placeholder '{}' is not a readable image", path.display());
                None
            }
            Err(e) => {
                warn!("Schematic placeholder '{}' unavailable: {}", path.display(), e);
                None
            }
        }
    }

    /// Fill `sheet` in place from `record`.
    ///
    /// Each step is isolated: a failure is logged and recorded in the report
    /// while the remaining steps still run. Cell writes are idempotent, but
    /// images are appended, so calling this twice on the same sheet embeds the
    /// connections table and the placeholder twice. Callers fill each sheet
    /// once, or call [`Worksheet::clear_images`] first.
    pub fn fill(&self, sheet: &mut Worksheet, record: &Record) -> FillReport {
        let label = record.text("pozo_numero").unwrap_or_else(|| sheet.name().to_string());
        info!("Filling sheet '{}' for well '{}'", sheet.name(), label);

        let mut report = FillReport::default();

        report.fields = self.apply_fields(sheet, record);

        match self.embed_connections(sheet, record) {
            Ok(count) => report.connections_rendered = count,
            Err(e) => {
                warn!("Well '{}': connections table skipped: {}", label, e);
                report.failures.push((FillStep::Connections, e.to_string()));
            }
        }

        match self.embed_placeholder(sheet) {
            Ok(embedded) => report.placeholder_embedded = embedded,
            Err(e) => {
                warn!("Well '{}': schematic placeholder skipped: {}", label, e);
                report.failures.push((FillStep::Placeholder, e.to_string()));
            }
        }

        self.apply_frame(sheet);

        debug!(
            "Well '{}': {} fields applied, {} connections, {} failures",
            label,
            report.applied(),
            report.connections_rendered,
            report.failures.len()
        );
        report
    }

    fn apply_fields(&self, sheet: &mut Worksheet, record: &Record) -> Vec<(String, FieldOutcome)> {
        let mut outcomes = Vec::with_capacity(self.mapping.len());

        for (field, _) in self.mapping.iter() {
            let outcome = match self.mapping.resolve(field, record) {
                Ok(Applied::Written { cell, value }) if field == OBSERVATIONS_FIELD => {
                    let value = fixed_width(
                        &value,
                        self.layout.observations_width,
                        self.layout.observations_filler,
                    );
                    sheet.write(cell, value.clone());
                    sheet.style_mut(cell).font.underline = true;
                    Ok(Applied::Written { cell, value })
                }
                Ok(Applied::Written { cell, value }) => {
                    match record.get(field).and_then(Value::as_f64).filter(|n| n.is_finite()) {
                        Some(number) => sheet.write(cell, CellValue::Number(number)),
                        None => sheet.write(cell, value.clone()),
                    }
                    Ok(Applied::Written { cell, value })
                }
                Ok(Applied::Marked { cell, option }) => {
                    sheet.write(cell, super::mapping::MARK);
                    Ok(Applied::Marked { cell, option })
                }
                Err(skip) => {
                    if let Skipped::NoMatchingOption(value) = &skip {
                        debug!("Field '{}': '{}' matches no option, left blank", field, value);
                    }
                    Err(skip)
                }
            };
            outcomes.push((field.to_string(), outcome));
        }

        let mut extra: Vec<&String> = record
            .fields()
            .keys()
            .filter(|name| self.mapping.rule(name).is_none())
            .collect();
        extra.sort();
        outcomes.extend(extra.into_iter().map(|name| (name.clone(), Err(Skipped::Unmapped))));

        outcomes
    }

    fn embed_connections(&self, sheet: &mut Worksheet, record: &Record) -> Result<usize> {
        let connections = record.connections()?;
        if connections.is_empty() {
            return Ok(0);
        }

        if let Some(crown) = connections[0].crown_elevation.as_ref().and_then(value_text) {
            sheet.write(self.layout.crown_elevation_cell, crown);
        }

        let image = self
            .rasterizer
            .render(&connections, Some(self.layout.connections_width_px))?;
        sheet.add_image(self.layout.connections_anchor, image.png);
        Ok(connections.len())
    }

    fn embed_placeholder(&self, sheet: &mut Worksheet) -> Result<bool> {
        let Some(png) = &self.placeholder else {
            warn!("No schematic placeholder available for '{}'", sheet.name());
            return Ok(false);
        };
        if png.is_empty() {
            return Err(Error::missing_asset("schematic placeholder", "file is empty"));
        }
        if !is_embeddable_image(png) {
            return Err(Error::missing_asset("schematic placeholder", "not a readable image"));
        }
        sheet.add_image(self.layout.placeholder_anchor, png.clone());
        Ok(true)
    }

    fn apply_frame(&self, sheet: &mut Worksheet) {
        let last_row = self.layout.content_last_row;
        let last_col = self.layout.content_last_col;

        sheet.set_outside_fill(OutsideFill {
            last_row,
            last_col,
            rgb: self.layout.outside_rgb,
            extra_rows: self.layout.outside_extra_rows,
            extra_cols: self.layout.outside_extra_cols,
        });

        let edge = Some(Edge::from(BorderWeight::Thick));
        for row in 0..=last_row {
            sheet.style_mut(CellRef::new(row, last_col)).border_right = edge;
        }
        for col in 0..=last_col {
            sheet.style_mut(CellRef::new(last_row, col)).border_bottom = edge;
        }
    }
}
