use anyhow::{Context, Result};
use log::info;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::build_filler;
use crate::config::Settings;
use crate::report::consolidate::Consolidator;
use crate::report::record::Record;
use crate::report::workbook::Workbook;

/// Parse a JSON array of flat record objects.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let objects: Vec<Map<String, Value>> =
        serde_json::from_str(json).context("Records file must hold a JSON array of objects")?;
    Ok(objects
        .into_iter()
        .map(|object| Record::from_fields(object.into_iter().collect()))
        .collect())
}

/// Consolidate local records into a local workbook, no remote access.
pub fn render_command(settings: &Settings, template: &Path, records: &Path, out: &Path) -> Result<()> {
    let template_bytes =
        fs::read(template).with_context(|| format!("Failed to read template {:?}", template))?;
    let workbook = Workbook::from_xlsx_bytes(&template_bytes)
        .with_context(|| format!("Failed to load template {:?}", template))?;

    let json = fs::read_to_string(records)
        .with_context(|| format!("Failed to read records {:?}", records))?;
    let records = parse_records(&json)?;
    if records.is_empty() {
        anyhow::bail!("No records to render");
    }

    let filler = build_filler(settings);
    let consolidation = Consolidator::new(&filler, settings.identifier_field.clone())
        .consolidate(workbook, &records)?;
    let bytes = consolidation.workbook.to_xlsx_bytes()?;
    fs::write(out, &bytes).with_context(|| format!("Failed to write {:?}", out))?;

    info!("Wrote {} sheets to {:?}", consolidation.sheets.len(), out);
    println!("Rendered {} records into {:?}.", consolidation.sheets.len(), out);
    Ok(())
}
