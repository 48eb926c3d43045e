//! In-memory workbook: loaded from template bytes, mutated sheet by sheet,
//! serialized once.

use calamine::{Data, Reader, Xlsx};
use log::{debug, warn};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatUnderline, Image};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;

use super::cell::CellRef;
use super::package::{self, SheetFormat};
use crate::error::{Error, Result};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet serial date.
    DateTime(f64),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderWeight {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderWeight {
    /// Map an OOXML `style` attribute. `none` and unknown styles yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "thin" => BorderWeight::Thin,
            "medium" => BorderWeight::Medium,
            "thick" => BorderWeight::Thick,
            "dashed" => BorderWeight::Dashed,
            "dotted" => BorderWeight::Dotted,
            "double" => BorderWeight::Double,
            "hair" => BorderWeight::Hair,
            "mediumDashed" => BorderWeight::MediumDashed,
            "dashDot" => BorderWeight::DashDot,
            "mediumDashDot" => BorderWeight::MediumDashDot,
            "dashDotDot" => BorderWeight::DashDotDot,
            "mediumDashDotDot" => BorderWeight::MediumDashDotDot,
            "slantDashDot" => BorderWeight::SlantDashDot,
            _ => return None,
        })
    }
}

impl From<BorderWeight> for FormatBorder {
    fn from(weight: BorderWeight) -> Self {
        match weight {
            BorderWeight::Thin => FormatBorder::Thin,
            BorderWeight::Medium => FormatBorder::Medium,
            BorderWeight::Thick => FormatBorder::Thick,
            BorderWeight::Dashed => FormatBorder::Dashed,
            BorderWeight::Dotted => FormatBorder::Dotted,
            BorderWeight::Double => FormatBorder::Double,
            BorderWeight::Hair => FormatBorder::Hair,
            BorderWeight::MediumDashed => FormatBorder::MediumDashed,
            BorderWeight::DashDot => FormatBorder::DashDot,
            BorderWeight::MediumDashDot => FormatBorder::MediumDashDot,
            BorderWeight::DashDotDot => FormatBorder::DashDotDot,
            BorderWeight::MediumDashDotDot => FormatBorder::MediumDashDotDot,
            BorderWeight::SlantDashDot => FormatBorder::SlantDashDot,
        }
    }
}

/// One side of a cell border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub weight: BorderWeight,
    /// 0xRRGGBB; `None` is the automatic color.
    pub color: Option<u32>,
}

impl From<BorderWeight> for Edge {
    fn from(weight: BorderWeight) -> Self {
        Self { weight, color: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontStyle {
    pub name: Option<String>,
    /// Points.
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub color: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
    Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumFormat {
    /// One of the spreadsheet's built-in format ids.
    Builtin(u8),
    Custom(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub font: FontStyle,
    /// Solid background as 0xRRGGBB.
    pub fill: Option<u32>,
    pub border_left: Option<Edge>,
    pub border_right: Option<Edge>,
    pub border_top: Option<Edge>,
    pub border_bottom: Option<Edge>,
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap: bool,
    pub rotation: Option<i16>,
    pub indent: Option<u8>,
    pub num_format: Option<NumFormat>,
}

impl CellStyle {
    pub fn is_plain(&self) -> bool {
        *self == CellStyle::default()
    }

    fn to_format(&self) -> Format {
        let mut format = Format::new();

        let font = &self.font;
        if let Some(name) = &font.name {
            format = format.set_font_name(name.as_str());
        }
        if let Some(size) = font.size {
            format = format.set_font_size(size);
        }
        if font.bold {
            format = format.set_bold();
        }
        if font.italic {
            format = format.set_italic();
        }
        if font.underline {
            format = format.set_underline(FormatUnderline::Single);
        }
        if font.strike {
            format = format.set_font_strikethrough();
        }
        if let Some(rgb) = font.color {
            format = format.set_font_color(Color::RGB(rgb));
        }

        if let Some(rgb) = self.fill {
            format = format.set_background_color(Color::RGB(rgb));
        }

        if let Some(edge) = self.border_left {
            format = format.set_border_left(edge.weight.into());
            if let Some(rgb) = edge.color {
                format = format.set_border_left_color(Color::RGB(rgb));
            }
        }
        if let Some(edge) = self.border_right {
            format = format.set_border_right(edge.weight.into());
            if let Some(rgb) = edge.color {
                format = format.set_border_right_color(Color::RGB(rgb));
            }
        }
        if let Some(edge) = self.border_top {
            format = format.set_border_top(edge.weight.into());
            if let Some(rgb) = edge.color {
                format = format.set_border_top_color(Color::RGB(rgb));
            }
        }
        if let Some(edge) = self.border_bottom {
            format = format.set_border_bottom(edge.weight.into());
            if let Some(rgb) = edge.color {
                format = format.set_border_bottom_color(Color::RGB(rgb));
            }
        }

        if let Some(horizontal) = self.horizontal {
            format = format.set_align(match horizontal {
                HorizontalAlign::Left => FormatAlign::Left,
                HorizontalAlign::Center => FormatAlign::Center,
                HorizontalAlign::Right => FormatAlign::Right,
                HorizontalAlign::Fill => FormatAlign::Fill,
                HorizontalAlign::Justify => FormatAlign::Justify,
                HorizontalAlign::CenterAcross => FormatAlign::CenterAcross,
                HorizontalAlign::Distributed => FormatAlign::Distributed,
            });
        }
        if let Some(vertical) = self.vertical {
            format = format.set_align(match vertical {
                VerticalAlign::Top => FormatAlign::Top,
                VerticalAlign::Center => FormatAlign::VerticalCenter,
                VerticalAlign::Bottom => FormatAlign::Bottom,
                VerticalAlign::Justify => FormatAlign::VerticalJustify,
                VerticalAlign::Distributed => FormatAlign::VerticalDistributed,
            });
        }
        if self.wrap {
            format = format.set_text_wrap();
        }
        if let Some(rotation) = self.rotation {
            format = format.set_rotation(rotation);
        }
        if let Some(indent) = self.indent {
            format = format.set_indent(indent);
        }

        match &self.num_format {
            Some(NumFormat::Builtin(index)) => format = format.set_num_format_index(*index),
            Some(NumFormat::Custom(code)) => format = format.set_num_format(code.as_str()),
            None => {}
        }
        format
    }
}

/// Width, height or visibility carried by a whole column or row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineFormat {
    /// Column width in character units as stored in the file, or row height in points.
    pub size: Option<f64>,
    pub hidden: bool,
    pub style: Option<CellStyle>,
}

impl LineFormat {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && !self.hidden && self.style.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSetup {
    pub landscape: Option<bool>,
    pub paper_size: Option<u8>,
    pub scale: Option<u16>,
    pub fit_to_pages: Option<(u16, u16)>,
    pub margins: Option<Margins>,
    pub hide_gridlines: bool,
    pub zoom: Option<u16>,
}

impl PageSetup {
    fn apply(&self, ws: &mut rust_xlsxwriter::Worksheet) {
        match self.landscape {
            Some(true) => {
                ws.set_landscape();
            }
            Some(false) => {
                ws.set_portrait();
            }
            None => {}
        }
        if let Some(paper) = self.paper_size {
            ws.set_paper_size(paper);
        }
        if let Some((width, height)) = self.fit_to_pages {
            ws.set_print_fit_to_pages(width, height);
        } else if let Some(scale) = self.scale.filter(|s| *s != 100 && (10..=400).contains(s)) {
            ws.set_print_scale(scale);
        }
        if let Some(m) = self.margins {
            ws.set_margins(m.left, m.right, m.top, m.bottom, m.header, m.footer);
        }
        if self.hide_gridlines {
            ws.set_screen_gridlines(false);
        }
        if let Some(zoom) = self.zoom.filter(|z| *z != 100 && (10..=400).contains(z)) {
            ws.set_zoom(zoom);
        }
    }
}

/// Pixel width the file's character-unit width renders at (7 px digits).
fn column_pixels(width: f64) -> u16 {
    (((256.0 * width + 18.0) / 256.0) * 7.0).trunc().clamp(0.0, u16::MAX as f64) as u16
}

/// True when `bytes` decode as an image the artifact can embed.
pub fn is_embeddable_image(bytes: &[u8]) -> bool {
    Image::new_from_buffer(bytes).is_ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: Option<CellValue>,
    pub style: CellStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub anchor: CellRef,
    /// Pixels right of and below the anchor cell's top-left corner.
    pub offset: (u32, u32),
    /// Displayed size in pixels; `None` keeps the picture's own size.
    pub size: Option<(f64, f64)>,
    pub data: Arc<Vec<u8>>,
}

/// Background applied to whole rows and columns beyond the content box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutsideFill {
    pub last_row: u32,
    pub last_col: u16,
    pub rgb: u32,
    pub extra_rows: u32,
    pub extra_cols: u16,
}

impl OutsideFill {
    pub fn covers(&self, cell: CellRef) -> bool {
        cell.row > self.last_row || cell.col > self.last_col
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    base_style: CellStyle,
    cells: BTreeMap<CellRef, Cell>,
    merges: Vec<(CellRef, CellRef)>,
    images: Vec<EmbeddedImage>,
    columns: Vec<(u16, u16, LineFormat)>,
    rows: BTreeMap<u32, LineFormat>,
    page: PageSetup,
    outside_fill: Option<OutsideFill>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_style: CellStyle::default(),
            cells: BTreeMap::new(),
            merges: Vec::new(),
            images: Vec::new(),
            columns: Vec::new(),
            rows: BTreeMap::new(),
            page: PageSetup::default(),
            outside_fill: None,
        }
    }

    /// Take over everything a template sheet carries besides values and merges.
    fn apply_format(&mut self, format: SheetFormat) {
        self.base_style = format.base_style;
        for (at, style) in format.styles {
            self.cells.entry(at).or_default().style = style;
        }
        self.columns = format.columns;
        self.rows = format.rows;
        self.images = format.images;
        self.page = format.page;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn cell_mut(&mut self, at: CellRef) -> &mut Cell {
        let base = &self.base_style;
        self.cells.entry(at).or_insert_with(|| Cell {
            value: None,
            style: base.clone(),
        })
    }

    pub fn write(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        self.cell_mut(cell).value = Some(value.into());
    }

    pub fn value(&self, cell: CellRef) -> Option<&CellValue> {
        self.cells.get(&cell).and_then(|c| c.value.as_ref())
    }

    pub fn text(&self, cell: CellRef) -> Option<&str> {
        self.value(cell).and_then(CellValue::as_text)
    }

    pub fn style(&self, cell: CellRef) -> CellStyle {
        self.cells
            .get(&cell)
            .map(|c| c.style.clone())
            .unwrap_or_else(|| self.base_style.clone())
    }

    pub fn style_mut(&mut self, cell: CellRef) -> &mut CellStyle {
        &mut self.cell_mut(cell).style
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    pub fn merge(&mut self, first: CellRef, last: CellRef) {
        self.merges.push((first, last));
    }

    pub fn merges(&self) -> &[(CellRef, CellRef)] {
        &self.merges
    }

    /// Appends another image layer; nothing already anchored is replaced.
    pub fn add_image(&mut self, anchor: CellRef, png: Vec<u8>) {
        self.images.push(EmbeddedImage {
            anchor,
            offset: (0, 0),
            size: None,
            data: Arc::new(png),
        });
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    /// Column width in the file's character units, when one was set.
    pub fn column_width(&self, col: u16) -> Option<f64> {
        self.column_format(col).and_then(|line| line.size)
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.rows.get(&row).and_then(|line| line.size)
    }

    pub fn page(&self) -> &PageSetup {
        &self.page
    }

    fn column_format(&self, col: u16) -> Option<&LineFormat> {
        self.columns
            .iter()
            .rev()
            .find(|(first, last, _)| (*first..=*last).contains(&col))
            .map(|(_, _, line)| line)
    }

    pub fn set_outside_fill(&mut self, fill: OutsideFill) {
        self.outside_fill = Some(fill);
    }

    pub fn outside_fill(&self) -> Option<&OutsideFill> {
        self.outside_fill.as_ref()
    }

    fn write_to(&self, ws: &mut rust_xlsxwriter::Worksheet) -> Result<()> {
        ws.set_name(&self.name)?;
        self.page.apply(ws);

        for (first, last, line) in &self.columns {
            let format = line.style.as_ref().map(CellStyle::to_format);
            for col in *first..=*last {
                if let Some(format) = &format {
                    ws.set_column_format(col, format)?;
                }
                if let Some(width) = line.size {
                    let pixels = column_pixels(width);
                    if pixels > 0 {
                        ws.set_column_width_pixels(col, pixels)?;
                    }
                }
                if line.hidden {
                    ws.set_column_hidden(col)?;
                }
            }
        }
        for (row, line) in &self.rows {
            if let Some(style) = &line.style {
                ws.set_row_format(*row, &style.to_format())?;
            }
            if let Some(height) = line.size.filter(|h| *h > 0.0) {
                ws.set_row_height(*row, height)?;
            }
            if line.hidden {
                ws.set_row_hidden(*row)?;
            }
        }

        if let Some(fill) = &self.outside_fill {
            let filled = |style: Option<&CellStyle>| {
                CellStyle {
                    fill: Some(fill.rgb),
                    ..style.cloned().unwrap_or_else(|| self.base_style.clone())
                }
                .to_format()
            };
            for col in fill.last_col + 1..=fill.last_col.saturating_add(fill.extra_cols) {
                let style = self.column_format(col).and_then(|line| line.style.as_ref());
                ws.set_column_format(col, &filled(style))?;
            }
            for row in fill.last_row + 1..=fill.last_row.saturating_add(fill.extra_rows) {
                let style = self.rows.get(&row).and_then(|line| line.style.as_ref());
                ws.set_row_format(row, &filled(style))?;
            }
        }

        for (first, last) in &self.merges {
            if first == last {
                continue;
            }
            let top_left = self.cells.get(first).cloned().unwrap_or_default();
            let text = match &top_left.value {
                Some(CellValue::Text(s)) => s.clone(),
                _ => String::new(),
            };
            ws.merge_range(
                first.row,
                first.col,
                last.row,
                last.col,
                &text,
                &top_left.style.to_format(),
            )?;
        }

        for (at, cell) in &self.cells {
            let format = cell.style.to_format();
            match &cell.value {
                Some(CellValue::Text(s)) => {
                    ws.write_string_with_format(at.row, at.col, s, &format)?;
                }
                Some(CellValue::Number(n)) => {
                    ws.write_number_with_format(at.row, at.col, *n, &format)?;
                }
                Some(CellValue::Bool(b)) => {
                    ws.write_boolean_with_format(at.row, at.col, *b, &format)?;
                }
                Some(CellValue::DateTime(serial)) => {
                    let format = match cell.style.num_format {
                        Some(_) => format,
                        None => format.set_num_format("yyyy-mm-dd"),
                    };
                    ws.write_number_with_format(at.row, at.col, *serial, &format)?;
                }
                None if !cell.style.is_plain() => {
                    ws.write_blank(at.row, at.col, &format)?;
                }
                None => {}
            }
        }

        for image in &self.images {
            let mut picture = match Image::new_from_buffer(&image.data) {
                Ok(picture) => picture,
                Err(e) => {
                    warn!(
                        "Sheet '{}': picture at {} is not an embeddable image, left out: {}",
                        self.name, image.anchor, e
                    );
                    continue;
                }
            };
            if let Some((width, height)) = image.size {
                picture = picture.set_scale_to_size(width, height, false);
            }
            ws.insert_image_with_offset(
                image.anchor.row,
                image.anchor.col,
                &picture,
                image.offset.0,
                image.offset.1,
            )?;
        }

        Ok(())
    }
}

/// Ordered collection of uniquely titled worksheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load xlsx/xltx bytes: values and merged regions through calamine,
    /// styles, dimensions, pictures and page setup from the package parts.
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
        let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
        xlsx.load_merged_regions()?;

        let names = xlsx.sheet_names().to_owned();
        if names.is_empty() {
            return Err(Error::Workbook("template contains no sheets".into()));
        }

        let mut formats: HashMap<String, SheetFormat> = package::read_formatting(bytes)?
            .into_iter()
            .map(|format| (format.name.clone(), format))
            .collect();

        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let mut sheet = Worksheet::new(name.clone());
            match formats.remove(&name) {
                Some(format) => sheet.apply_format(format),
                None => warn!("Sheet '{}' has no readable formatting", name),
            }

            let range = xlsx
                .worksheet_range(&name)
                .map_err(|e| Error::Workbook(format!("reading sheet '{}': {}", name, e)))?;
            let (row0, col0) = range.start().unwrap_or((0, 0));
            for (r, c, data) in range.used_cells() {
                if let Some(value) = cell_value(data) {
                    let at = CellRef::new(row0 + r as u32, (col0 + c as u32) as u16);
                    sheet.write(at, value);
                }
            }

            for (_, _, dims) in xlsx.merged_regions_by_sheet(&name) {
                sheet.merge(
                    CellRef::new(dims.start.0, dims.start.1 as u16),
                    CellRef::new(dims.end.0, dims.end.1 as u16),
                );
            }

            debug!(
                "Loaded sheet '{}' with {} cells, {} merged regions and {} pictures",
                sheet.name(),
                sheet.cells.len(),
                sheet.merges.len(),
                sheet.images.len()
            );
            sheets.push(sheet);
        }

        Ok(Self { sheets })
    }

    /// Serialize every sheet into one xlsx buffer.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        let mut book = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            let ws = book.add_worksheet();
            sheet.write_to(ws)?;
        }
        Ok(book.save_to_buffer()?)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Append a sheet and return its index.
    pub fn push(&mut self, sheet: Worksheet) -> usize {
        self.sheets.push(sheet);
        self.sheets.len() - 1
    }

    /// Insert a sheet at `index` (clamped to the end) and return where it landed.
    pub fn insert(&mut self, index: usize, sheet: Worksheet) -> usize {
        let index = index.min(self.sheets.len());
        self.sheets.insert(index, sheet);
        index
    }
}

fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::DateTime(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}
