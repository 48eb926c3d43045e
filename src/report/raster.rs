//! Connections sub-table rendered to a PNG.
//!
//! The report template has no room for a native table, so the connections
//! are laid out as SVG using real glyph advances from the configured font,
//! rasterized with resvg and handed back as an in-memory PNG.

use log::{debug, warn};
use resvg::tiny_skia;
use resvg::usvg::{Options, Tree, fontdb};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use super::record::Connection;
use crate::error::{Error, Result};

pub const HEADERS: [&str; 3] = ["Diámetro (pulg)", "Profundidad (m)", "Material"];

const COLUMNS: usize = HEADERS.len();

// Used when no font file can be read: a fixed advance of 0.6 em.
const BUILTIN_ADVANCE_EM: f32 = 0.6;
const BUILTIN_ASCENT_EM: f32 = 0.8;
const BUILTIN_LINE_EM: f32 = 1.2;
const BUILTIN_FAMILY: &str = "sans-serif";

/// Base sizes and the floors they may shrink to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStyle {
    pub font_size: u32,
    pub header_font_size: u32,
    pub padding: u32,
    pub min_font_size: u32,
    pub min_header_font_size: u32,
    pub min_padding: u32,
}

impl Default for RasterStyle {
    fn default() -> Self {
        Self {
            font_size: 16,
            header_font_size: 18,
            padding: 10,
            min_font_size: 8,
            min_header_font_size: 10,
            min_padding: 4,
        }
    }
}

/// Glyph metrics of the table font.
#[derive(Clone)]
pub struct FontMetrics {
    face: Option<FaceData>,
}

#[derive(Clone)]
struct FaceData {
    bytes: Arc<Vec<u8>>,
    family: String,
}

impl FontMetrics {
    /// Load a TrueType/OpenType font, falling back to built-in metrics.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        match Self::from_file(path) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Falling back to the built-in table font: {}", e);
                Self::builtin()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::missing_asset(path.display().to_string(), e))?;
        Self::from_bytes(bytes)
            .map_err(|e| Error::missing_asset(path.display().to_string(), e))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let family = {
            let face = ttf_parser::Face::parse(&bytes, 0)
                .map_err(|e| Error::Config(format!("unreadable font: {}", e)))?;
            face.names()
                .into_iter()
                .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
                .find_map(|name| name.to_string())
                .unwrap_or_else(|| BUILTIN_FAMILY.to_string())
        };

        Ok(Self {
            face: Some(FaceData {
                bytes: Arc::new(bytes),
                family,
            }),
        })
    }

    pub fn builtin() -> Self {
        Self { face: None }
    }

    pub fn is_builtin(&self) -> bool {
        self.face.is_none()
    }

    pub fn family(&self) -> &str {
        self.face.as_ref().map(|f| f.family.as_str()).unwrap_or(BUILTIN_FAMILY)
    }

    fn with_face<T>(&self, f: impl FnOnce(&ttf_parser::Face<'_>) -> T) -> Option<T> {
        let data = self.face.as_ref()?;
        let face = ttf_parser::Face::parse(&data.bytes, 0).ok()?;
        Some(f(&face))
    }

    /// Advance width of `text` at `size` pixels.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.with_face(|face| {
            let upem = face.units_per_em() as f32;
            let fallback = face
                .glyph_hor_advance(ttf_parser::GlyphId(0))
                .unwrap_or(face.units_per_em() / 2);
            let units: u32 = text
                .chars()
                .map(|ch| {
                    face.glyph_index(ch)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .unwrap_or(fallback) as u32
                })
                .sum();
            units as f32 * size / upem
        })
        .unwrap_or_else(|| text.chars().count() as f32 * size * BUILTIN_ADVANCE_EM)
    }

    pub fn ascent(&self, size: f32) -> f32 {
        self.with_face(|face| face.ascender() as f32 * size / face.units_per_em() as f32)
            .unwrap_or(size * BUILTIN_ASCENT_EM)
    }

    pub fn line_height(&self, size: f32) -> f32 {
        self.with_face(|face| {
            (face.ascender() as f32 - face.descender() as f32) * size / face.units_per_em() as f32
        })
        .unwrap_or(size * BUILTIN_LINE_EM)
    }
}

/// Resolved geometry of one table image.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub font_size: u32,
    pub header_font_size: u32,
    pub padding: u32,
    pub column_widths: [f32; COLUMNS],
    pub header_height: f32,
    pub row_height: f32,
    pub width: u32,
    pub height: u32,
    /// Natural width before any shrinking.
    pub natural_width: f32,
    /// True when a floor stopped the shrink short of the requested scale.
    pub clamped: bool,
}

/// Rendered table, ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    pub header_font_size: u32,
}

pub struct Rasterizer {
    metrics: FontMetrics,
    style: RasterStyle,
    fontdb: Arc<fontdb::Database>,
}

impl Rasterizer {
    pub fn new(metrics: FontMetrics) -> Self {
        Self::with_style(metrics, RasterStyle::default())
    }

    pub fn with_style(metrics: FontMetrics, style: RasterStyle) -> Self {
        let mut db = fontdb::Database::new();
        match &metrics.face {
            Some(face) => db.load_font_data(face.bytes.as_ref().clone()),
            None => db.load_system_fonts(),
        }
        debug!("Table font database holds {} faces", db.len());

        Self {
            metrics,
            style,
            fontdb: Arc::new(db),
        }
    }

    /// One text row per connection: diameter, depth, material.
    pub fn table_rows(connections: &[Connection]) -> Vec<[String; COLUMNS]> {
        connections
            .iter()
            .map(|c| [c.diameter_text(), c.depth_text(), c.material_text()])
            .collect()
    }

    fn column_widths(&self, rows: &[[String; COLUMNS]], font: f32, header_font: f32) -> [f32; COLUMNS] {
        let mut widths = [0.0f32; COLUMNS];
        for (i, header) in HEADERS.iter().enumerate() {
            let body = rows
                .iter()
                .map(|row| self.metrics.text_width(&row[i], font))
                .fold(0.0f32, f32::max);
            widths[i] = self.metrics.text_width(header, header_font).max(body);
        }
        widths
    }

    fn total_width(widths: &[f32; COLUMNS], padding: f32) -> f32 {
        widths.iter().sum::<f32>() + (COLUMNS as f32 + 1.0) * padding
    }

    /// Size the table, shrinking fonts and padding uniformly to fit `target_width_px`.
    pub fn layout(&self, rows: &[[String; COLUMNS]], target_width_px: Option<u32>) -> TableLayout {
        let style = &self.style;
        let natural_widths = self.column_widths(
            rows,
            style.font_size as f32,
            style.header_font_size as f32,
        );
        let natural_width = Self::total_width(&natural_widths, style.padding as f32);

        let mut font_size = style.font_size;
        let mut header_font_size = style.header_font_size;
        let mut padding = style.padding;
        let mut clamped = false;

        if let Some(target) = target_width_px {
            if natural_width > target as f32 {
                let scale = target as f32 / natural_width;
                let shrink = |base: u32, floor: u32, clamped: &mut bool| {
                    let scaled = (base as f32 * scale).floor() as u32;
                    if scaled < floor {
                        *clamped = true;
                        floor
                    } else {
                        scaled
                    }
                };
                font_size = shrink(style.font_size, style.min_font_size, &mut clamped);
                header_font_size =
                    shrink(style.header_font_size, style.min_header_font_size, &mut clamped);
                padding = shrink(style.padding, style.min_padding, &mut clamped);
                debug!(
                    "Shrinking connections table by {:.3} (font {} -> {})",
                    scale, style.font_size, font_size
                );
            }
        }

        let column_widths = self.column_widths(rows, font_size as f32, header_font_size as f32);
        let width = Self::total_width(&column_widths, padding as f32).ceil() as u32;
        let row_height = self.metrics.line_height(font_size as f32).ceil() + padding as f32;
        let header_height = self.metrics.line_height(header_font_size as f32).ceil() + padding as f32;
        let height = (header_height + rows.len() as f32 * row_height).ceil() as u32;

        TableLayout {
            font_size,
            header_font_size,
            padding,
            column_widths,
            header_height,
            row_height,
            width: width.max(1),
            height: height.max(1),
            natural_width,
            clamped,
        }
    }

    /// Render `connections` as a PNG no wider than `target_width_px` where the floors allow.
    pub fn render(&self, connections: &[Connection], target_width_px: Option<u32>) -> Result<RasterImage> {
        let rows = Self::table_rows(connections);
        let layout = self.layout(&rows, target_width_px);
        let svg = self.to_svg(&layout, &rows);

        let mut options = Options::default();
        options.font_family = self.metrics.family().to_string();
        options.fontdb = self.fontdb.clone();

        let tree = Tree::from_str(&svg, &options)
            .map_err(|e| Error::Workbook(format!("connections table SVG: {}", e)))?;

        let mut pixmap = tiny_skia::Pixmap::new(layout.width, layout.height)
            .ok_or_else(|| Error::Workbook("failed to allocate table pixmap".into()))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        let png = pixmap
            .encode_png()
            .map_err(|e| Error::Workbook(format!("connections table PNG: {}", e)))?;

        debug!(
            "Rendered connections table {}x{} px for {} rows",
            layout.width,
            layout.height,
            rows.len()
        );

        Ok(RasterImage {
            png,
            width: layout.width,
            height: layout.height,
            font_size: layout.font_size,
            header_font_size: layout.header_font_size,
        })
    }

    fn to_svg(&self, layout: &TableLayout, rows: &[[String; COLUMNS]]) -> String {
        let family = escape_xml(self.metrics.family());
        let width = layout.width;
        let mut svg = String::new();

        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = layout.height
        );
        let _ = writeln!(svg, r#"<rect x="0" y="0" width="{}" height="{}" fill="white"/>"#, width, layout.height);

        let mut y = 0.0f32;
        self.write_row(&mut svg, &HEADERS.map(String::from), layout, y, layout.header_font_size, &family);
        y += layout.header_height;
        let _ = writeln!(
            svg,
            r#"<line x1="0" y1="{y:.1}" x2="{w}" y2="{y:.1}" stroke="black" stroke-width="2"/>"#,
            y = y,
            w = width
        );

        for row in rows {
            self.write_row(&mut svg, row, layout, y, layout.font_size, &family);
            y += layout.row_height;
            let _ = writeln!(
                svg,
                r#"<line x1="0" y1="{y:.1}" x2="{w}" y2="{y:.1}" stroke="black" stroke-width="1"/>"#,
                y = y,
                w = width
            );
        }

        let _ = writeln!(svg, "</svg>");
        svg
    }

    fn write_row(
        &self,
        svg: &mut String,
        cells: &[String; COLUMNS],
        layout: &TableLayout,
        top: f32,
        size: u32,
        family: &str,
    ) {
        let padding = layout.padding as f32;
        let baseline = top + (padding / 2.0).floor() + self.metrics.ascent(size as f32);
        let mut x = padding;
        for (i, cell) in cells.iter().enumerate() {
            let _ = writeln!(
                svg,
                r#"<text x="{x:.1}" y="{y:.1}" font-family="{family}" font-size="{size}" fill="black">{text}</text>"#,
                x = x,
                y = baseline,
                family = family,
                size = size,
                text = escape_xml(cell)
            );
            x += layout.column_widths[i] + padding;
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(png: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if png.len() < 24 || &png[..8] != SIGNATURE || &png[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(png[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(png[20..24].try_into().ok()?);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection(diameter: &str, crown: f64, invert: f64, material: &str) -> Connection {
        Connection {
            diameter: Some(json!(diameter)),
            crown_elevation: Some(json!(crown)),
            invert_elevation: Some(json!(invert)),
            material: Some(json!(material)),
        }
    }

    fn sample() -> Vec<Connection> {
        vec![
            connection("8", 102.5, 100.25, "PVC"),
            connection("12", 101.0, 99.4, "Concreto reforzado"),
            Connection {
                diameter: Some(json!("6")),
                material: Some(json!("Gres")),
                ..Default::default()
            },
        ]
    }

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(FontMetrics::builtin())
    }

    #[test]
    fn test_rows_render_depth_or_marker() {
        let rows = Rasterizer::table_rows(&sample());
        assert_eq!(rows[0], ["8".to_string(), "2.25".to_string(), "PVC".to_string()]);
        assert_eq!(rows[1][1], "1.6");
        assert_eq!(rows[2][1], "N/A");
    }

    #[test]
    fn test_natural_layout_without_target() {
        let r = rasterizer();
        let rows = Rasterizer::table_rows(&sample());
        let layout = r.layout(&rows, None);
        assert_eq!(layout.font_size, 16);
        assert_eq!(layout.header_font_size, 18);
        assert_eq!(layout.padding, 10);
        assert!(!layout.clamped);
        assert_eq!(layout.width as f32, layout.natural_width.ceil());
    }

    #[test]
    fn test_wide_target_does_not_grow() {
        let r = rasterizer();
        let rows = Rasterizer::table_rows(&sample());
        let layout = r.layout(&rows, Some(10_000));
        assert_eq!(layout.font_size, 16);
    }

    #[test]
    fn test_shrinks_to_fit_target() {
        let r = rasterizer();
        let rows = Rasterizer::table_rows(&sample());
        let natural = r.layout(&rows, None).width;
        let target = natural * 3 / 4;

        let layout = r.layout(&rows, Some(target));
        assert!(layout.font_size < 16);
        assert!(!layout.clamped);
        assert!(layout.width <= target, "{} > {}", layout.width, target);
    }

    #[test]
    fn test_font_size_is_monotonic_in_target() {
        let r = rasterizer();
        let rows = Rasterizer::table_rows(&sample());
        let natural = r.layout(&rows, None).width;

        let mut previous = u32::MAX;
        for target in (20..=natural + 20).rev().step_by(7) {
            let layout = r.layout(&rows, Some(target));
            assert!(layout.font_size <= previous);
            assert!(layout.font_size >= 8);
            assert!(layout.header_font_size >= 10);
            assert!(layout.padding >= 4);
            if !layout.clamped {
                assert!(layout.width <= target);
            }
            previous = layout.font_size;
        }
    }

    #[test]
    fn test_tiny_target_hits_floors() {
        let r = rasterizer();
        let rows = Rasterizer::table_rows(&sample());
        let layout = r.layout(&rows, Some(10));
        assert!(layout.clamped);
        assert_eq!(layout.font_size, 8);
        assert_eq!(layout.header_font_size, 10);
        assert_eq!(layout.padding, 4);
    }

    #[test]
    fn test_render_emits_png_matching_layout() {
        let r = rasterizer();
        let connections = sample();
        let rows = Rasterizer::table_rows(&connections);
        let natural = r.layout(&rows, None).width;

        let image = r.render(&connections, Some(natural / 2)).unwrap();
        let (width, height) = png_dimensions(&image.png).unwrap();
        assert_eq!((width, height), (image.width, image.height));
        assert!(width <= natural / 2 || r.layout(&rows, Some(natural / 2)).clamped);
    }

    #[test]
    fn test_render_header_only_for_empty_list() {
        let image = rasterizer().render(&[], None).unwrap();
        assert!(image.height > 0);
        assert!(png_dimensions(&image.png).is_some());
    }

    #[test]
    fn test_missing_font_falls_back() {
        let metrics = FontMetrics::load(Some(Path::new("/definitely/not/here.ttf")));
        assert!(metrics.is_builtin());
        assert!((metrics.text_width("abcd", 10.0) - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
