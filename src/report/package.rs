//! Formatting read straight from the xlsx package parts.
//!
//! calamine yields values and merged regions only. Cell styles, column and
//! row dimensions, pictures and page setup are read here from the OOXML
//! parts and folded into the same sheet model.

use log::{debug, warn};
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::Arc;
use zip::ZipArchive;

use super::cell::CellRef;
use super::workbook::{
    BorderWeight, CellStyle, Edge, EmbeddedImage, FontStyle, HorizontalAlign, LineFormat, Margins,
    NumFormat, PageSetup, VerticalAlign,
};
use crate::error::{Error, Result};

const EMU_PER_PIXEL: f64 = 9525.0;
const MAX_COLUMN: u32 = 16_384;

/// Everything but values and merges for one worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetFormat {
    pub name: String,
    /// Style of `xf` 0, used for cells the template never touched.
    pub base_style: CellStyle,
    pub styles: BTreeMap<CellRef, CellStyle>,
    /// Inclusive zero-based column ranges.
    pub columns: Vec<(u16, u16, LineFormat)>,
    pub rows: BTreeMap<u32, LineFormat>,
    pub images: Vec<EmbeddedImage>,
    pub page: PageSetup,
}

/// Read the formatting of every worksheet, in workbook order.
pub fn read_formatting(bytes: &[u8]) -> Result<Vec<SheetFormat>> {
    let package = Package::from_bytes(bytes)?;

    let workbook_part = "xl/workbook.xml";
    let workbook_xml = package
        .xml(workbook_part)?
        .ok_or_else(|| Error::Workbook("package has no xl/workbook.xml".to_string()))?;
    let workbook = parse(workbook_part, &workbook_xml)?;
    let workbook_rels = package.relationships(workbook_part)?;

    let theme = workbook_rels
        .values()
        .find(|rel| rel.kind.ends_with("/theme"))
        .map(|rel| package.theme_colors(&rel.target))
        .transpose()?
        .unwrap_or_default();

    let styles = match workbook_rels.values().find(|rel| rel.kind.ends_with("/styles")) {
        Some(rel) => package.styles(&rel.target, theme)?,
        None => StyleTable::default(),
    };

    let mut sheets = Vec::new();
    for sheet in workbook.descendants().filter(|n| n.has_tag_name("sheet")) {
        let Some(name) = sheet.attribute("name") else {
            continue;
        };
        let Some(target) = relationship_id(sheet).and_then(|id| workbook_rels.get(id)) else {
            warn!("Sheet '{}' has no worksheet part, formatting skipped", name);
            continue;
        };
        if !target.kind.ends_with("/worksheet") {
            debug!("Sheet '{}' is not a worksheet, formatting skipped", name);
            continue;
        }
        let mut format = package.sheet_format(&target.target, &styles)?;
        format.name = name.to_string();
        sheets.push(format);
    }
    Ok(sheets)
}

struct Relationship {
    target: String,
    kind: String,
}

struct Package {
    parts: HashMap<String, Vec<u8>>,
}

impl Package {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Workbook(format!("not an xlsx package: {}", e)))?;

        let mut parts = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| Error::Workbook(format!("reading package entry: {}", e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .map_err(|e| Error::Workbook(format!("reading part {}: {}", name, e)))?;
            parts.insert(name, buf);
        }
        Ok(Self { parts })
    }

    fn xml(&self, part: &str) -> Result<Option<String>> {
        let Some(bytes) = self.parts.get(part) else {
            return Ok(None);
        };
        let bytes: &[u8] = bytes;
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| Error::Workbook(format!("part {} is not UTF-8: {}", part, e)))
    }

    /// Relationship id to target part for `part`.
    fn relationships(&self, part: &str) -> Result<HashMap<String, Relationship>> {
        let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
        let rels_part = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };
        let Some(xml) = self.xml(&rels_part)? else {
            return Ok(HashMap::new());
        };
        let doc = parse(&rels_part, &xml)?;

        let mut rels = HashMap::new();
        for rel in doc.descendants().filter(|n| n.has_tag_name("Relationship")) {
            if rel.attribute("TargetMode") == Some("External") {
                continue;
            }
            if let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) {
                rels.insert(
                    id.to_string(),
                    Relationship {
                        target: resolve_target(dir, target),
                        kind: rel.attribute("Type").unwrap_or_default().to_string(),
                    },
                );
            }
        }
        Ok(rels)
    }

    /// Theme colors in the order cell colors index them.
    fn theme_colors(&self, part: &str) -> Result<Vec<u32>> {
        let Some(xml) = self.xml(part)? else {
            return Ok(Vec::new());
        };
        let doc = parse(part, &xml)?;
        let Some(scheme) = doc.descendants().find(|n| n.has_tag_name("clrScheme")) else {
            return Ok(Vec::new());
        };

        let mut colors: Vec<u32> = scheme
            .children()
            .filter(Node::is_element)
            .map(|slot| {
                slot.children()
                    .filter(Node::is_element)
                    .find_map(|c| match c.tag_name().name() {
                        "srgbClr" => c.attribute("val").and_then(parse_rgb),
                        "sysClr" => c.attribute("lastClr").and_then(parse_rgb),
                        _ => None,
                    })
                    .unwrap_or(0)
            })
            .collect();
        // Scheme order is dk1 lt1 dk2 lt2; cell colors index lt1 dk1 lt2 dk2.
        if colors.len() >= 4 {
            colors.swap(0, 1);
            colors.swap(2, 3);
        }
        Ok(colors)
    }

    fn styles(&self, part: &str, theme: Vec<u32>) -> Result<StyleTable> {
        let Some(xml) = self.xml(part)? else {
            return Ok(StyleTable::default());
        };
        let doc = parse(part, &xml)?;
        let root = doc.root_element();

        let indexed = child(root, "colors")
            .and_then(|c| child(c, "indexedColors"))
            .map(|list| {
                list.children()
                    .filter(|n| n.has_tag_name("rgbColor"))
                    .map(|n| n.attribute("rgb").and_then(parse_rgb).unwrap_or(0))
                    .collect::<Vec<_>>()
            })
            .filter(|colors| !colors.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEXED.to_vec());
        let palette = Palette { theme, indexed };

        let num_fmts: HashMap<u32, String> = child(root, "numFmts")
            .map(|list| {
                list.children()
                    .filter(|n| n.has_tag_name("numFmt"))
                    .filter_map(|n| {
                        let id = n.attribute("numFmtId")?.parse().ok()?;
                        Some((id, n.attribute("formatCode")?.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let fonts: Vec<FontStyle> = list_of(root, "fonts", "font")
            .map(|font| parse_font(font, &palette))
            .collect();
        let fills: Vec<Option<u32>> = list_of(root, "fills", "fill")
            .map(|fill| parse_fill(fill, &palette))
            .collect();
        let borders: Vec<[Option<Edge>; 4]> = list_of(root, "borders", "border")
            .map(|border| parse_border(border, &palette))
            .collect();

        let xfs = list_of(root, "cellXfs", "xf")
            .map(|xf| {
                let index = |name: &str| {
                    xf.attribute(name)
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0)
                };
                let [left, right, top, bottom] = borders.get(index("borderId")).cloned().unwrap_or_default();
                let num_fmt_id = index("numFmtId") as u32;
                let num_format = match num_fmt_id {
                    0 => None,
                    id => match num_fmts.get(&id) {
                        Some(code) => Some(NumFormat::Custom(code.clone())),
                        None => u8::try_from(id).ok().map(NumFormat::Builtin),
                    },
                };

                let mut style = CellStyle {
                    font: fonts.get(index("fontId")).cloned().unwrap_or_default(),
                    fill: fills.get(index("fillId")).copied().flatten(),
                    border_left: left,
                    border_right: right,
                    border_top: top,
                    border_bottom: bottom,
                    num_format,
                    ..CellStyle::default()
                };
                if let Some(alignment) = child(xf, "alignment") {
                    apply_alignment(&mut style, alignment);
                }
                style
            })
            .collect();

        Ok(StyleTable { xfs })
    }

    fn sheet_format(&self, part: &str, styles: &StyleTable) -> Result<SheetFormat> {
        let mut format = SheetFormat {
            base_style: styles.get("0"),
            ..SheetFormat::default()
        };
        let Some(xml) = self.xml(part)? else {
            warn!("Worksheet part {} is missing", part);
            return Ok(format);
        };
        let doc = parse(part, &xml)?;
        let root = doc.root_element();

        if let Some(view) = root.descendants().find(|n| n.has_tag_name("sheetView")) {
            format.page.hide_gridlines = view.attribute("showGridLines") == Some("0");
            format.page.zoom = view.attribute("zoomScale").and_then(|v| v.parse().ok());
        }

        for col in list_of(root, "cols", "col") {
            let first = attr_u32(col, "min").unwrap_or(1).clamp(1, MAX_COLUMN);
            let last = attr_u32(col, "max").unwrap_or(first).clamp(first, MAX_COLUMN);
            let line = LineFormat {
                size: col.attribute("width").and_then(|v| v.parse().ok()),
                hidden: flag(col, "hidden"),
                style: col.attribute("style").map(|s| styles.get(s)),
            };
            if !line.is_empty() {
                format.columns.push(((first - 1) as u16, (last - 1) as u16, line));
            }
        }

        if let Some(data) = child(root, "sheetData") {
            let mut next_row = 0u32;
            for row in data.children().filter(|n| n.has_tag_name("row")) {
                let row_index = attr_u32(row, "r").map(|r| r.saturating_sub(1)).unwrap_or(next_row);
                next_row = row_index + 1;

                let line = LineFormat {
                    size: row
                        .attribute("ht")
                        .and_then(|v| v.parse().ok())
                        .filter(|_| flag(row, "customHeight")),
                    hidden: flag(row, "hidden"),
                    style: row
                        .attribute("s")
                        .filter(|_| flag(row, "customFormat"))
                        .map(|s| styles.get(s)),
                };
                if !line.is_empty() {
                    format.rows.insert(row_index, line);
                }

                let mut next_col = 0u16;
                for cell in row.children().filter(|n| n.has_tag_name("c")) {
                    let at = cell
                        .attribute("r")
                        .and_then(|r| CellRef::parse(r).ok())
                        .unwrap_or(CellRef::new(row_index, next_col));
                    next_col = at.col.saturating_add(1);
                    if let Some(s) = cell.attribute("s") {
                        format.styles.insert(at, styles.get(s));
                    }
                }
            }
        }

        if let Some(margins) = child(root, "pageMargins") {
            let m = |name: &str, default: f64| {
                margins
                    .attribute(name)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default)
            };
            format.page.margins = Some(Margins {
                left: m("left", 0.7),
                right: m("right", 0.7),
                top: m("top", 0.75),
                bottom: m("bottom", 0.75),
                header: m("header", 0.3),
                footer: m("footer", 0.3),
            });
        }

        if let Some(setup) = child(root, "pageSetup") {
            format.page.landscape = setup.attribute("orientation").map(|o| o == "landscape");
            format.page.paper_size = setup.attribute("paperSize").and_then(|v| v.parse().ok());
            format.page.scale = setup.attribute("scale").and_then(|v| v.parse().ok());
            let fit_to_page = root
                .descendants()
                .find(|n| n.has_tag_name("pageSetUpPr"))
                .is_some_and(|n| flag(n, "fitToPage"));
            if fit_to_page {
                let fit = |name: &str| setup.attribute(name).and_then(|v| v.parse().ok()).unwrap_or(1);
                format.page.fit_to_pages = Some((fit("fitToWidth"), fit("fitToHeight")));
            }
        }

        let drawing_ids: Vec<&str> = root
            .children()
            .filter(|n| n.has_tag_name("drawing"))
            .filter_map(relationship_id)
            .collect();
        if !drawing_ids.is_empty() {
            let rels = self.relationships(part)?;
            for id in drawing_ids {
                let Some(drawing) = rels.get(id) else {
                    continue;
                };
                match self.pictures(&drawing.target) {
                    Ok(mut images) => format.images.append(&mut images),
                    Err(e) => warn!("Pictures in {} skipped: {}", drawing.target, e),
                }
            }
        }

        debug!(
            "Worksheet {}: {} styled cells, {} column ranges, {} rows, {} pictures",
            part,
            format.styles.len(),
            format.columns.len(),
            format.rows.len(),
            format.images.len()
        );
        Ok(format)
    }

    fn pictures(&self, part: &str) -> Result<Vec<EmbeddedImage>> {
        let Some(xml) = self.xml(part)? else {
            return Ok(Vec::new());
        };
        let doc = parse(part, &xml)?;
        let rels = self.relationships(part)?;

        let mut images = Vec::new();
        for anchor in anchor_nodes(doc.root_element()) {
            let Some(from) = child(anchor, "from") else {
                continue;
            };
            let Some(blip) = anchor
                .descendants()
                .find(|n| n.has_tag_name("pic"))
                .and_then(|pic| pic.descendants().find(|n| n.has_tag_name("blip")))
            else {
                continue;
            };
            let Some(media) = blip
                .attributes()
                .find(|a| a.name() == "embed" && a.namespace().is_some())
                .and_then(|a| rels.get(a.value()))
                .and_then(|rel| self.parts.get(&rel.target))
            else {
                continue;
            };

            let coordinate = |name: &str| {
                child(from, name)
                    .and_then(|n| n.text())
                    .and_then(|t| t.trim().parse::<i64>().ok())
                    .unwrap_or(0)
                    .max(0)
            };
            let extent = anchor
                .descendants()
                .find(|n| n.has_tag_name("xfrm"))
                .and_then(|xfrm| child(xfrm, "ext"))
                .or_else(|| child(anchor, "ext"))
                .and_then(|ext| {
                    let cx = ext.attribute("cx")?.parse::<f64>().ok()?;
                    let cy = ext.attribute("cy")?.parse::<f64>().ok()?;
                    Some((cx / EMU_PER_PIXEL, cy / EMU_PER_PIXEL))
                })
                .filter(|(w, h)| *w > 0.0 && *h > 0.0);

            images.push(EmbeddedImage {
                anchor: CellRef::new(coordinate("row") as u32, coordinate("col") as u16),
                offset: (
                    (coordinate("colOff") as f64 / EMU_PER_PIXEL).round() as u32,
                    (coordinate("rowOff") as f64 / EMU_PER_PIXEL).round() as u32,
                ),
                size: extent,
                data: Arc::new(media.clone()),
            });
        }
        Ok(images)
    }
}

#[derive(Default)]
struct StyleTable {
    xfs: Vec<CellStyle>,
}

impl StyleTable {
    fn get(&self, index: &str) -> CellStyle {
        index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.xfs.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

struct Palette {
    theme: Vec<u32>,
    indexed: Vec<u32>,
}

impl Palette {
    fn resolve(&self, color: Node) -> Option<u32> {
        let base = if let Some(rgb) = color.attribute("rgb") {
            parse_rgb(rgb)?
        } else if let Some(theme) = color.attribute("theme") {
            *self.theme.get(theme.parse::<usize>().ok()?)?
        } else if let Some(indexed) = color.attribute("indexed") {
            *self.indexed.get(indexed.parse::<usize>().ok()?)?
        } else {
            return None;
        };
        let tint = color
            .attribute("tint")
            .and_then(|t| t.parse::<f64>().ok())
            .unwrap_or(0.0);
        Some(apply_tint(base, tint))
    }
}

/// Legacy 64-entry palette, minus the two system slots.
const DEFAULT_INDEXED: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333,
];

fn parse<'x>(part: &str, xml: &'x str) -> Result<Document<'x>> {
    Document::parse(xml).map_err(|e| Error::Workbook(format!("part {}: {}", part, e)))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn list_of<'a, 'input>(
    root: Node<'a, 'input>,
    list: &str,
    item: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    child(root, list)
        .into_iter()
        .flat_map(move |l| l.children().filter(move |n| n.has_tag_name(item)))
}

fn flag(node: Node, name: &str) -> bool {
    matches!(node.attribute(name), Some("1") | Some("true"))
}

fn attr_u32(node: Node, name: &str) -> Option<u32> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

/// The `r:id` attribute, whichever relationships namespace the producer used.
fn relationship_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == "id" && a.namespace().is_some())
        .map(|a| a.value())
}

fn resolve_target(dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Anchors directly under `wsDr`, looking through `AlternateContent` wrappers.
fn anchor_nodes<'a, 'input>(root: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let is_anchor = |n: &Node| n.has_tag_name("twoCellAnchor") || n.has_tag_name("oneCellAnchor");
    let mut out = Vec::new();
    for node in root.children().filter(Node::is_element) {
        if is_anchor(&node) {
            out.push(node);
        } else if node.has_tag_name("AlternateContent") {
            if let Some(branch) = node
                .children()
                .filter(|n| n.has_tag_name("Choice") || n.has_tag_name("Fallback"))
                .find(|b| b.descendants().any(|n| is_anchor(&n)))
            {
                out.extend(branch.descendants().filter(|n| is_anchor(n)));
            }
        }
    }
    out
}

fn parse_rgb(value: &str) -> Option<u32> {
    let hex = value.trim().trim_start_matches('#');
    match hex.len() {
        8 => u32::from_str_radix(&hex[2..], 16).ok(),
        6 => u32::from_str_radix(hex, 16).ok(),
        _ => None,
    }
}

fn parse_font(font: Node, palette: &Palette) -> FontStyle {
    let val = |name: &str| child(font, name).and_then(|n| n.attribute("val"));
    let on = |name: &str| child(font, name).is_some_and(|n| !matches!(n.attribute("val"), Some("0") | Some("false")));
    FontStyle {
        name: val("name").map(str::to_string),
        size: val("sz").and_then(|v| v.parse().ok()),
        bold: on("b"),
        italic: on("i"),
        underline: child(font, "u").is_some_and(|u| u.attribute("val") != Some("none")),
        strike: on("strike"),
        color: child(font, "color").and_then(|c| palette.resolve(c)),
    }
}

fn parse_fill(fill: Node, palette: &Palette) -> Option<u32> {
    let pattern = child(fill, "patternFill")?;
    if pattern.attribute("patternType") != Some("solid") {
        return None;
    }
    child(pattern, "fgColor")
        .and_then(|c| palette.resolve(c))
        .or_else(|| child(pattern, "bgColor").and_then(|c| palette.resolve(c)))
}

fn parse_border(border: Node, palette: &Palette) -> [Option<Edge>; 4] {
    ["left", "right", "top", "bottom"].map(|side| {
        let edge = child(border, side)?;
        let weight = BorderWeight::from_name(edge.attribute("style")?)?;
        Some(Edge {
            weight,
            color: child(edge, "color").and_then(|c| palette.resolve(c)),
        })
    })
}

fn apply_alignment(style: &mut CellStyle, alignment: Node) {
    style.horizontal = match alignment.attribute("horizontal") {
        Some("left") => Some(HorizontalAlign::Left),
        Some("center") => Some(HorizontalAlign::Center),
        Some("right") => Some(HorizontalAlign::Right),
        Some("fill") => Some(HorizontalAlign::Fill),
        Some("justify") => Some(HorizontalAlign::Justify),
        Some("centerContinuous") => Some(HorizontalAlign::CenterAcross),
        Some("distributed") => Some(HorizontalAlign::Distributed),
        _ => None,
    };
    style.vertical = match alignment.attribute("vertical") {
        Some("top") => Some(VerticalAlign::Top),
        Some("center") => Some(VerticalAlign::Center),
        Some("bottom") => Some(VerticalAlign::Bottom),
        Some("justify") => Some(VerticalAlign::Justify),
        Some("distributed") => Some(VerticalAlign::Distributed),
        _ => None,
    };
    style.wrap = flag(alignment, "wrapText");
    // Stored as 0..=90 up, 91..=180 down, 255 for stacked text.
    style.rotation = alignment
        .attribute("textRotation")
        .and_then(|v| v.parse::<i16>().ok())
        .and_then(|r| match r {
            1..=90 => Some(r),
            91..=180 => Some(90 - r),
            255 => Some(270),
            _ => None,
        });
    style.indent = alignment
        .attribute("indent")
        .and_then(|v| v.parse().ok())
        .filter(|i: &u8| *i != 0);
}

/// Lighten (positive) or darken (negative) a color in HSL space.
fn apply_tint(rgb: u32, tint: f64) -> u32 {
    if tint == 0.0 {
        return rgb;
    }
    let (h, s, l) = rgb_to_hsl(rgb);
    let l = if tint < 0.0 {
        l * (1.0 + tint)
    } else {
        l * (1.0 - tint) + tint
    };
    hsl_to_rgb(h, s, l.clamp(0.0, 1.0))
}

fn rgb_to_hsl(rgb: u32) -> (f64, f64, f64) {
    let r = ((rgb >> 16) & 0xFF) as f64 / 255.0;
    let g = ((rgb >> 8) & 0xFF) as f64 / 255.0;
    let b = (rgb & 0xFF) as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> u32 {
    let channel = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u32;
    if s == 0.0 {
        let v = channel(l);
        return (v << 16) | (v << 8) | v;
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f64| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    (channel(hue(h + 1.0 / 3.0)) << 16) | (channel(hue(h)) << 8) | channel(hue(h - 1.0 / 3.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Image};

    fn styled_template() -> Vec<u8> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let ws = book.add_worksheet();
        ws.set_name("Plantilla").unwrap();
        let title = Format::new()
            .set_bold()
            .set_font_name("Arial")
            .set_font_size(14)
            .set_background_color(Color::RGB(0xFFCC00))
            .set_border_bottom(FormatBorder::Medium)
            .set_align(FormatAlign::Center);
        ws.write_string_with_format(0, 0, "FORMATO DE INSPECCION", &title).unwrap();
        ws.set_column_width(0, 42).unwrap();
        ws.set_row_height(3, 30).unwrap();
        ws.set_landscape();
        ws.set_screen_gridlines(false);
        book.save_to_buffer().unwrap()
    }

    #[test]
    fn test_cell_styles_and_dimensions_are_read() {
        let sheets = read_formatting(&styled_template()).unwrap();
        assert_eq!(sheets.len(), 1);
        let sheet = &sheets[0];
        assert_eq!(sheet.name, "Plantilla");

        let a1 = &sheet.styles[&CellRef::new(0, 0)];
        assert!(a1.font.bold);
        assert_eq!(a1.font.name.as_deref(), Some("Arial"));
        assert_eq!(a1.font.size, Some(14.0));
        assert_eq!(a1.fill, Some(0xFFCC00));
        assert_eq!(a1.border_bottom.map(|e| e.weight), Some(BorderWeight::Medium));
        assert_eq!(a1.horizontal, Some(HorizontalAlign::Center));

        let (first, last, column) = &sheet.columns[0];
        assert_eq!((*first, *last), (0, 0));
        assert!((column.size.unwrap() - 42.71).abs() < 0.01);
        assert_eq!(sheet.rows[&3].size, Some(30.0));
        assert_eq!(sheet.page.landscape, Some(true));
        assert!(sheet.page.hide_gridlines);
    }

    #[test]
    fn test_pictures_are_read_with_anchor() {
        let png = resvg::tiny_skia::Pixmap::new(3, 2).unwrap().encode_png().unwrap();
        let mut book = rust_xlsxwriter::Workbook::new();
        let ws = book.add_worksheet();
        let image = Image::new_from_buffer(&png).unwrap();
        ws.insert_image_with_offset(1, 12, &image, 4, 2).unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let sheets = read_formatting(&bytes).unwrap();
        let images = &sheets[0].images;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].anchor, CellRef::new(1, 12));
        assert_eq!(images[0].offset, (4, 2));
        assert_eq!(images[0].data.as_slice(), png.as_slice());
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/worksheets", "../drawings/drawing1.xml"), "xl/drawings/drawing1.xml");
        assert_eq!(resolve_target("xl", "/xl/styles.xml"), "xl/styles.xml");
    }

    #[test]
    fn test_tint() {
        assert_eq!(apply_tint(0x4472C4, 0.0), 0x4472C4);
        assert_eq!(apply_tint(0x000000, 0.5), 0x808080);
        assert_eq!(apply_tint(0xFFFFFF, -0.5), 0x808080);
    }

    #[test]
    fn test_parse_rgb_drops_alpha() {
        assert_eq!(parse_rgb("FFFFCC00"), Some(0xFFCC00));
        assert_eq!(parse_rgb("FFCC00"), Some(0xFFCC00));
        assert_eq!(parse_rgb("nope"), None);
    }
}
