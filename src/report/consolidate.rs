//! Builds one multi-sheet workbook out of a template and a batch of records.

use log::{debug, info};
use std::collections::HashSet;

use super::filler::{FillReport, SheetFiller};
use super::record::Record;
use super::workbook::{Workbook, Worksheet};
use crate::error::{Error, Result};

/// Longest sheet title spreadsheet applications accept.
pub const MAX_TITLE_LEN: usize = 31;

const FORBIDDEN_TITLE_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Titles may not start or end with an apostrophe.
fn trim_title(title: &str) -> &str {
    title.trim_matches(|c: char| c.is_whitespace() || c == '\'')
}

/// Make `raw` a legal sheet title: forbidden characters become `_`, the
/// result is cut to [`MAX_TITLE_LEN`] characters and trimmed of whitespace
/// and apostrophes on both ends.
pub fn sanitize_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if FORBIDDEN_TITLE_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let cut: String = trim_title(&cleaned).chars().take(MAX_TITLE_LEN).collect();
    match trim_title(&cut) {
        "" => "Hoja".to_string(),
        title => title.to_string(),
    }
}

/// Hands out sheet titles that are unique within one workbook.
///
/// Comparison ignores case. A taken title gets a `(n)` suffix, `n` starting
/// at 2; the base is shortened when needed so the suffix always fits.
#[derive(Debug, Default)]
pub struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, title: &str) {
        self.used.insert(title.to_lowercase());
    }

    pub fn is_taken(&self, title: &str) -> bool {
        self.used.contains(&title.to_lowercase())
    }

    pub fn claim(&mut self, base: &str) -> String {
        let base = sanitize_title(base);
        if !self.is_taken(&base) {
            self.reserve(&base);
            return base;
        }

        let mut n = 2u32;
        loop {
            let suffix = format!("({})", n);
            let room = MAX_TITLE_LEN - suffix.chars().count();
            let stem: String = base.chars().take(room).collect();
            let candidate = format!("{}{}", trim_title(&stem), suffix);
            if !self.is_taken(&candidate) {
                self.reserve(&candidate);
                return candidate;
            }
            n += 1;
        }
    }
}

/// Per-record result of a consolidation.
#[derive(Debug, Clone)]
pub struct FilledSheet {
    pub title: String,
    pub index: usize,
    pub report: FillReport,
}

#[derive(Debug)]
pub struct Consolidation {
    pub workbook: Workbook,
    pub sheets: Vec<FilledSheet>,
}

impl Consolidation {
    pub fn titles(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.title.as_str()).collect()
    }
}

pub struct Consolidator<'a> {
    filler: &'a SheetFiller,
    identifier_field: String,
}

impl<'a> Consolidator<'a> {
    pub fn new(filler: &'a SheetFiller, identifier_field: impl Into<String>) -> Self {
        Self {
            filler,
            identifier_field: identifier_field.into(),
        }
    }

    /// Fill one sheet per record, in order.
    ///
    /// The first record takes over the template's first sheet; every later
    /// record gets a copy of that sheet as it was before any filling. Other
    /// template sheets stay where they are. Template titles are reserved up
    /// front, so a record named like the template's first sheet is suffixed.
    pub fn consolidate(&self, template: Workbook, records: &[Record]) -> Result<Consolidation> {
        let mut workbook = template;
        let pristine = workbook
            .sheet(0)
            .cloned()
            .ok_or_else(|| Error::Workbook("template has no worksheets".to_string()))?;

        let mut namer = SheetNamer::new();
        for name in workbook.sheet_names() {
            namer.reserve(name);
        }

        let mut sheets = Vec::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            let title = self.title_for(&mut namer, position, record);
            let index = if position == 0 {
                0
            } else {
                workbook.insert(position, pristine.clone())
            };
            let sheet = workbook
                .sheet_mut(index)
                .ok_or_else(|| Error::Workbook(format!("sheet {} vanished during consolidation", index)))?;
            sheet.set_name(title.clone());

            let report = self.filler.fill(sheet, record);
            sheets.push(FilledSheet { title, index, report });
        }

        info!(
            "Consolidated {} records into a workbook of {} sheets",
            sheets.len(),
            workbook.len()
        );
        Ok(Consolidation { workbook, sheets })
    }

    /// Append one filled copy of `layout` per record after the sheets
    /// `master` already holds. Existing sheets are left untouched and their
    /// titles are reserved.
    pub fn append(&self, master: Workbook, layout: &Worksheet, records: &[Record]) -> Result<Consolidation> {
        let mut workbook = master;
        let mut namer = SheetNamer::new();
        for name in workbook.sheet_names() {
            namer.reserve(name);
        }
        let existing = workbook.len();

        let mut sheets = Vec::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            let title = self.title_for(&mut namer, position, record);
            let mut sheet = layout.clone();
            sheet.set_name(title.clone());
            let index = workbook.push(sheet);
            let sheet = workbook
                .sheet_mut(index)
                .ok_or_else(|| Error::Workbook(format!("sheet {} vanished during consolidation", index)))?;

            let report = self.filler.fill(sheet, record);
            sheets.push(FilledSheet { title, index, report });
        }

        info!(
            "Appended {} records to a workbook of {} existing sheets",
            sheets.len(),
            existing
        );
        Ok(Consolidation { workbook, sheets })
    }

    fn title_for(&self, namer: &mut SheetNamer, position: usize, record: &Record) -> String {
        let base = record
            .text(&self.identifier_field)
            .unwrap_or_else(|| format!("Registro_{}", position + 1));
        let title = namer.claim(&base);
        if title != sanitize_title(&base) {
            debug!("Sheet title '{}' taken, using '{}'", base, title);
        }
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::cell::CellRef;
    use crate::report::filler::SheetLayout;
    use crate::report::raster::{FontMetrics, Rasterizer};

    fn filler() -> SheetFiller {
        SheetFiller::new(Rasterizer::new(FontMetrics::builtin()), SheetLayout::default())
    }

    fn template() -> Workbook {
        let mut wb = Workbook::new();
        let mut sheet = Worksheet::new("Hoja1");
        sheet.write(CellRef::parse("B2").unwrap(), "FORMATO DE INSPECCION");
        wb.push(sheet);
        wb
    }

    fn well(id: &str) -> Record {
        Record::new().with("pozo_numero", id)
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("P-1/2"), "P-1_2");
        assert_eq!(sanitize_title("a[b]:c*d?e\\f"), "a_b__c_d_e_f");
        assert_eq!(sanitize_title("  W1  "), "W1");
        assert_eq!(sanitize_title(""), "Hoja");
        assert_eq!(sanitize_title(&"x".repeat(40)).chars().count(), MAX_TITLE_LEN);
        assert_eq!(sanitize_title("'''"), "Hoja");
    }

    #[test]
    fn test_truncation_never_leaves_a_trailing_apostrophe() {
        let raw = format!("{}'b", "a".repeat(30));
        let title = sanitize_title(&raw);
        assert_eq!(title, "a".repeat(30));
        assert!(rust_xlsxwriter::utility::check_sheet_name(&title).is_ok());

        let raw = format!("{} 'x", "a".repeat(29));
        assert_eq!(sanitize_title(&raw), "a".repeat(29));
    }

    #[test]
    fn test_suffix_stem_is_trimmed() {
        let mut namer = SheetNamer::new();
        let base = format!("{}'bcd", "a".repeat(27));
        assert_eq!(namer.claim(&base), base);
        let second = namer.claim(&base);
        assert_eq!(second, format!("{}(2)", "a".repeat(27)));
        assert!(rust_xlsxwriter::utility::check_sheet_name(&second).is_ok());
    }

    #[test]
    fn test_namer_suffixes_duplicates() {
        let mut namer = SheetNamer::new();
        assert_eq!(namer.claim("W1"), "W1");
        assert_eq!(namer.claim("W1"), "W1(2)");
        assert_eq!(namer.claim("w1"), "w1(3)");
        assert_eq!(namer.claim("W2"), "W2");
    }

    #[test]
    fn test_namer_keeps_suffix_within_limit() {
        let mut namer = SheetNamer::new();
        let long = "a".repeat(MAX_TITLE_LEN);
        assert_eq!(namer.claim(&long), long);
        let second = namer.claim(&long);
        assert_eq!(second.chars().count(), MAX_TITLE_LEN);
        assert!(second.ends_with("(2)"));
    }

    #[test]
    fn test_one_sheet_per_record_in_order() {
        let filler = filler();
        let records = vec![well("W1"), well("W2"), well("W3")];
        let result = Consolidator::new(&filler, "pozo_numero")
            .consolidate(template(), &records)
            .unwrap();

        assert_eq!(result.workbook.sheet_names(), vec!["W1", "W2", "W3"]);
        assert_eq!(result.titles(), vec!["W1", "W2", "W3"]);
        let d6 = CellRef::parse("D6").unwrap();
        for (i, id) in ["W1", "W2", "W3"].iter().enumerate() {
            assert_eq!(result.workbook.sheet(i).unwrap().text(d6), Some(*id));
        }
    }

    #[test]
    fn test_clones_come_from_the_unfilled_template() {
        let filler = filler();
        let records = vec![
            well("W1").with("direccion", "Calle 1"),
            well("W2"),
        ];
        let result = Consolidator::new(&filler, "pozo_numero")
            .consolidate(template(), &records)
            .unwrap();

        let d4 = CellRef::parse("D4").unwrap();
        let b2 = CellRef::parse("B2").unwrap();
        let second = result.workbook.sheet(1).unwrap();
        assert_eq!(second.text(d4), None);
        assert_eq!(second.text(b2), Some("FORMATO DE INSPECCION"));
    }

    #[test]
    fn test_duplicate_identifiers_get_suffixes() {
        let filler = filler();
        let records = vec![well("W1"), well("W1"), well("W1")];
        let result = Consolidator::new(&filler, "pozo_numero")
            .consolidate(template(), &records)
            .unwrap();
        assert_eq!(result.titles(), vec!["W1", "W1(2)", "W1(3)"]);
    }

    #[test]
    fn test_collision_with_template_name_and_missing_identifier() {
        let filler = filler();
        let records = vec![well("Hoja1"), Record::new()];
        let result = Consolidator::new(&filler, "pozo_numero")
            .consolidate(template(), &records)
            .unwrap();
        assert_eq!(result.titles(), vec!["Hoja1(2)", "Registro_2"]);
    }

    #[test]
    fn test_extra_template_sheets_are_kept_after_generated_ones() {
        let filler = filler();
        let mut wb = template();
        wb.push(Worksheet::new("Listas"));
        let result = Consolidator::new(&filler, "pozo_numero")
            .consolidate(wb, &[well("W1"), well("W2")])
            .unwrap();
        assert_eq!(result.workbook.sheet_names(), vec!["W1", "W2", "Listas"]);
    }

    #[test]
    fn test_empty_template_is_rejected() {
        let filler = filler();
        let err = Consolidator::new(&filler, "pozo_numero")
            .consolidate(Workbook::new(), &[well("W1")])
            .unwrap_err();
        assert!(matches!(err, Error::Workbook(_)));
    }

    #[test]
    fn test_append_keeps_existing_sheets() {
        let filler = filler();
        let mut master = template();
        let layout = master.sheet(0).cloned().unwrap();
        let mut earlier = layout.clone();
        earlier.set_name("W1");
        earlier.write(CellRef::parse("D6").unwrap(), "W1");
        master.push(earlier);

        let result = Consolidator::new(&filler, "pozo_numero")
            .append(master, &layout, &[well("W2"), well("W1")])
            .unwrap();

        assert_eq!(result.workbook.sheet_names(), vec!["Hoja1", "W1", "W2", "W1(2)"]);
        assert_eq!(result.sheets[0].index, 2);
        let d6 = CellRef::parse("D6").unwrap();
        assert_eq!(result.workbook.sheet(0).unwrap().text(d6), None);
        assert_eq!(result.workbook.sheet(1).unwrap().text(d6), Some("W1"));
        assert_eq!(result.workbook.sheet(3).unwrap().text(d6), Some("W1"));
    }
}
