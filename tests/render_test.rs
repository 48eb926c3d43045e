mod support;

use calamine::{Data, Reader, Xlsx};
use std::fs;
use std::io::Cursor;

use support::template_bytes;
use survey_reports::commands::render_command;
use survey_reports::config::Settings;
use survey_reports::report::filler::FillStep;
use survey_reports::report::workbook::CellValue;
use survey_reports::report::{
    CellRef, Consolidator, FontMetrics, Rasterizer, Record, SheetFiller, SheetLayout, Workbook,
};

fn png() -> Vec<u8> {
    resvg::tiny_skia::Pixmap::new(16, 12).unwrap().encode_png().unwrap()
}

fn settings_with_placeholder(path: Option<std::path::PathBuf>) -> Settings {
    Settings {
        placeholder_path: path,
        ..Settings::default()
    }
}

/// A template carrying a styled title, a wide first column and a logo.
fn styled_template_bytes() -> Vec<u8> {
    use rust_xlsxwriter::{Color, Format, FormatBorder, Image};

    let mut book = rust_xlsxwriter::Workbook::new();
    let ws = book.add_worksheet();
    ws.set_name("Plantilla").unwrap();
    let title = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xFFCC00))
        .set_border_bottom(FormatBorder::Medium);
    ws.write_string_with_format(0, 0, "FORMATO DE INSPECCION DE POZOS", &title).unwrap();
    ws.merge_range(0, 1, 0, 7, "", &title).unwrap();
    ws.set_column_width(0, 42).unwrap();
    ws.set_row_height(2, 28).unwrap();
    ws.set_landscape();
    ws.insert_image(0, 9, &Image::new_from_buffer(&png()).unwrap()).unwrap();
    book.save_to_buffer().unwrap()
}

#[test]
fn test_render_local_records_to_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    let records = dir.path().join("records.json");
    let out = dir.path().join("reporte.xlsx");

    fs::write(&template, template_bytes()).unwrap();
    fs::write(
        &records,
        r#"[
            {"pozo_numero": "A/1", "tipo_pozo": "Camara", "observaciones": "Tapa partida"},
            {"pozo_numero": "A/1", "conexiones": [{"diameter": "6", "crown_elevation": "3", "material": "Gres"}]}
        ]"#,
    )
    .unwrap();

    let settings = Settings {
        placeholder_path: None,
        ..Settings::default()
    };
    render_command(&settings, &template, &records, &out).unwrap();

    let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(fs::read(&out).unwrap())).unwrap();
    assert_eq!(xlsx.sheet_names(), vec!["A_1", "A_1(2)"]);

    let first = xlsx.worksheet_range("A_1").unwrap();
    // F11 marks "Camara", M80 holds the padded observations.
    assert_eq!(first.get_value((10, 5)), Some(&Data::String("X".into())));
    match first.get_value((79, 12)) {
        Some(Data::String(text)) => {
            assert_eq!(text.chars().count(), 90);
            assert!(text.starts_with("Tapa partida_"));
        }
        other => panic!("unexpected observations cell: {:?}", other),
    }

    let second = xlsx.worksheet_range("A_1(2)").unwrap();
    assert_eq!(second.get_value((6, 3)), Some(&Data::String("3".into())));
}

#[test]
fn test_render_rejects_missing_template() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.json");
    fs::write(&records, "[{}]").unwrap();

    let result = render_command(
        &Settings::default(),
        &dir.path().join("absent.xlsx"),
        &records,
        &dir.path().join("out.xlsx"),
    );
    assert!(result.is_err());
}

#[test]
fn test_placeholder_image_is_embedded_in_every_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    let records = dir.path().join("records.json");
    let placeholder = dir.path().join("esquema.png");
    let out = dir.path().join("reporte.xlsx");
    fs::write(&template, template_bytes()).unwrap();
    fs::write(&records, r#"[{"pozo_numero": "W1"}, {"pozo_numero": "W2"}]"#).unwrap();
    fs::write(&placeholder, png()).unwrap();

    render_command(&settings_with_placeholder(Some(placeholder)), &template, &records, &out).unwrap();

    let report = Workbook::from_xlsx_bytes(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(report.sheet_names(), vec!["W1", "W2"]);
    for sheet in report.sheets() {
        let anchors: Vec<CellRef> = sheet.images().iter().map(|i| i.anchor).collect();
        assert_eq!(anchors, vec![CellRef::new(1, 12)], "sheet {}", sheet.name());
    }
}

#[test]
fn test_unreadable_placeholder_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    let records = dir.path().join("records.json");
    let placeholder = dir.path().join("esquema.png");
    let out = dir.path().join("reporte.xlsx");
    fs::write(&template, template_bytes()).unwrap();
    fs::write(&records, r#"[{"pozo_numero": "W1"}]"#).unwrap();
    fs::write(&placeholder, b"<html>moved</html>").unwrap();

    render_command(&settings_with_placeholder(Some(placeholder)), &template, &records, &out).unwrap();

    let report = Workbook::from_xlsx_bytes(&fs::read(&out).unwrap()).unwrap();
    assert!(report.sheet(0).unwrap().images().is_empty());
}

#[test]
fn test_bad_placeholder_bytes_are_a_step_failure_and_still_serialize() {
    let filler = SheetFiller::new(Rasterizer::new(FontMetrics::builtin()), SheetLayout::default())
        .with_placeholder(Some(vec![0x89, b'P', b'N', b'G']));
    let template = Workbook::from_xlsx_bytes(&template_bytes()).unwrap();
    let records = vec![Record::new().with("pozo_numero", "W1"), Record::new().with("pozo_numero", "W2")];

    let result = Consolidator::new(&filler, "pozo_numero")
        .consolidate(template, &records)
        .unwrap();
    for sheet in &result.sheets {
        assert!(!sheet.report.placeholder_embedded);
        assert!(sheet.report.failures.iter().any(|(step, _)| *step == FillStep::Placeholder));
    }

    let bytes = result.workbook.to_xlsx_bytes().unwrap();
    let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
    assert_eq!(xlsx.sheet_names(), vec!["W1", "W2"]);
    let w2 = xlsx.worksheet_range("W2").unwrap();
    assert_eq!(w2.get_value((5, 3)), Some(&Data::String("W2".into())));
}

#[test]
fn test_truncated_and_suffixed_titles_are_accepted_by_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    let records = dir.path().join("records.json");
    let out = dir.path().join("reporte.xlsx");
    fs::write(&template, template_bytes()).unwrap();

    let apostrophe = format!("{}'b", "a".repeat(30));
    let long = "P".repeat(40);
    let json = serde_json::json!([
        {"pozo_numero": apostrophe},
        {"pozo_numero": long},
        {"pozo_numero": long},
    ]);
    fs::write(&records, json.to_string()).unwrap();

    render_command(&settings_with_placeholder(None), &template, &records, &out).unwrap();

    let xlsx: Xlsx<_> = Xlsx::new(Cursor::new(fs::read(&out).unwrap())).unwrap();
    assert_eq!(
        xlsx.sheet_names(),
        vec!["a".repeat(30), "P".repeat(31), format!("{}(2)", "P".repeat(28))]
    );
}

#[test]
fn test_template_formatting_survives_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    let records = dir.path().join("records.json");
    let out = dir.path().join("reporte.xlsx");
    fs::write(&template, styled_template_bytes()).unwrap();
    fs::write(&records, r#"[{"pozo_numero": "W1", "consecutivo": 12}, {"pozo_numero": "W2"}]"#).unwrap();

    render_command(&settings_with_placeholder(None), &template, &records, &out).unwrap();

    let report = Workbook::from_xlsx_bytes(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(report.sheet_names(), vec!["W1", "W2"]);
    assert_eq!(
        report.sheet(0).unwrap().value(CellRef::new(2, 7)),
        Some(&CellValue::Number(12.0))
    );
    for sheet in report.sheets() {
        let title = sheet.style(CellRef::new(0, 0));
        assert!(title.font.bold, "sheet {}", sheet.name());
        assert_eq!(title.fill, Some(0xFFCC00));
        assert!(title.border_bottom.is_some());
        assert_eq!(sheet.text(CellRef::new(0, 0)), Some("FORMATO DE INSPECCION DE POZOS"));
        assert_eq!(sheet.column_width(0), Some(42.7109375));
        assert_eq!(sheet.row_height(2), Some(28.0));
        assert_eq!(sheet.page().landscape, Some(true));
        assert!(sheet.merges().contains(&(CellRef::new(0, 1), CellRef::new(0, 7))));
        assert!(sheet.images().iter().any(|i| i.anchor == CellRef::new(0, 9)));
    }
}
