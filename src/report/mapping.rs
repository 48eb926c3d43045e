//! Declarative field -> cell layout of the inspection report.
//!
//! Every field is either written verbatim into one cell or, for single-choice
//! fields, selects exactly one cell among its options to mark with [`MARK`].
//! Fields absent from the table, empty values and values matching no option
//! are skipped; skips are reported, never raised.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use super::cell::CellRef;
use super::record::Record;
use crate::error::{Error, Result};

/// Written into the selected cell of a single-choice field.
pub const MARK: &str = "X";

/// Free-text field rendered at a fixed width with an underline.
pub const OBSERVATIONS_FIELD: &str = "observaciones";

/// How one field lands on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Direct(CellRef),
    Choice(BTreeMap<String, CellRef>),
}

/// What applying a rule to a record produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Written { cell: CellRef, value: String },
    Marked { cell: CellRef, option: String },
}

/// Why a field left the sheet untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    Unmapped,
    Empty,
    NoMatchingOption(String),
}

pub type FieldOutcome = std::result::Result<Applied, Skipped>;

/// Compact form of the layout, validated into [`FieldMapping`] once.
enum RawRule {
    Direct(&'static str),
    Choice(&'static [(&'static str, &'static str)]),
}

macro_rules! diagnosis {
    ($row:literal) => {
        &[
            ("Cambiar", concat!("D", $row)),
            ("Reparar", concat!("F", $row)),
            ("No Requiere", concat!("H", $row)),
        ]
    };
}

macro_rules! exists {
    ($row:literal) => {
        &[("Si", concat!("D", $row)), ("No", concat!("F", $row))]
    };
}

const SURVEY_LAYOUT: &[(&str, RawRule)] = &[
    ("fecha", RawRule::Direct("D3")),
    ("consecutivo", RawRule::Direct("H3")),
    ("direccion", RawRule::Direct("D4")),
    ("levanto", RawRule::Direct("D5")),
    ("pozo_numero", RawRule::Direct("D6")),
    ("cilindro_cual", RawRule::Direct("H52")),
    (OBSERVATIONS_FIELD, RawRule::Direct("M80")),
    (
        "tipo_sistema",
        RawRule::Choice(&[("Aguas Lluvia", "D9"), ("Aguas Residuales", "F9"), ("Combinado", "H9")]),
    ),
    (
        "tipo_pozo",
        RawRule::Choice(&[("Pozo", "D11"), ("Camara", "F11"), ("Alivio", "H11")]),
    ),
    ("tapa_existe", RawRule::Choice(exists!("16"))),
    (
        "tapa_tipo",
        RawRule::Choice(&[
            ("Ferroconcreto", "D18"),
            ("Concreto", "F18"),
            ("Hierro sin Bisagra", "H18"),
            ("Hierro con bisagra", "D19"),
            ("Tapa Seguridad", "F19"),
            ("Tapa en fibra", "H19"),
        ]),
    ),
    (
        "tapa_estado",
        RawRule::Choice(&[("Bueno", "D21"), ("Regular", "F21"), ("Malo", "H21")]),
    ),
    ("tapa_diagnostico", RawRule::Choice(diagnosis!("23"))),
    ("cargue_existe", RawRule::Choice(exists!("28"))),
    (
        "cargue_estado",
        RawRule::Choice(&[
            ("Bueno", "D30"),
            ("Regular", "F30"),
            ("Malo", "H30"),
            ("Grietas", "D31"),
            ("Partido", "F31"),
            ("Hundido", "H31"),
        ]),
    ),
    ("cargue_diagnostico", RawRule::Choice(diagnosis!("33"))),
    ("cono_existe", RawRule::Choice(exists!("38"))),
    (
        "cono_estado",
        RawRule::Choice(&[
            ("Bueno", "D40"),
            ("Regular", "F40"),
            ("Malo", "H40"),
            ("Grietas", "D41"),
            ("Partido", "F41"),
            ("Hundido", "H41"),
        ]),
    ),
    ("cono_diagnostico", RawRule::Choice(diagnosis!("43"))),
    (
        "cilindro_material",
        RawRule::Choice(&[("Mamposteria", "D48"), ("Concreto", "F48"), ("GRP", "H48")]),
    ),
    (
        "cilindro_estado",
        RawRule::Choice(&[
            ("Bueno", "D50"),
            ("Regular", "F50"),
            ("Malo", "H50"),
            ("Grietas", "D51"),
            ("Partido", "F51"),
            ("Huecos", "H51"),
            ("Sin Pañete", "D52"),
            ("Otro", "F52"),
        ]),
    ),
    ("cilindro_diagnostico", RawRule::Choice(diagnosis!("54"))),
    (
        "canuela_estado",
        RawRule::Choice(&[
            ("Bueno", "D59"),
            ("Regular", "F59"),
            ("Malo", "H59"),
            ("Sedimentada", "D60"),
            ("Desgastada", "F60"),
            ("Socavacion", "H60"),
        ]),
    ),
    ("canuela_diagnostico", RawRule::Choice(diagnosis!("62"))),
    ("escalones_existe", RawRule::Choice(exists!("67"))),
    (
        "escalones_tipo",
        RawRule::Choice(&[("Escalones", "D69"), ("Ladrillos", "F69")]),
    ),
    (
        "escalones_estado",
        RawRule::Choice(&[
            ("Bueno", "D71"),
            ("Regular", "F71"),
            ("Malo", "H71"),
            ("Doblados", "D72"),
            ("Faltan", "F72"),
            ("Corroidos", "H72"),
        ]),
    ),
    ("escalones_diagnostico", RawRule::Choice(diagnosis!("74"))),
    (
        "estado_general_pozo",
        RawRule::Choice(&[
            ("Infiltracion", "D79"),
            ("Represado", "F79"),
            ("Con basura", "H79"),
            ("Raices", "D80"),
            ("Fuera de Servicio", "F80"),
            ("Lleno de tierra", "H80"),
        ]),
    ),
];

static SURVEY_MAPPING: Lazy<FieldMapping> = Lazy::new(|| {
    FieldMapping::from_layout(SURVEY_LAYOUT).expect("survey layout holds valid cell references")
});

/// The inspection report layout, validated on first use.
pub fn survey_mapping() -> &'static FieldMapping {
    &SURVEY_MAPPING
}

/// Immutable field -> rule table. Iteration follows declaration order.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    rules: Vec<(String, Rule)>,
}

impl FieldMapping {
    fn from_layout(layout: &[(&str, RawRule)]) -> Result<Self> {
        let mut rules = Vec::with_capacity(layout.len());
        for (field, raw) in layout {
            let rule = match raw {
                RawRule::Direct(cell) => Rule::Direct(CellRef::parse(cell)?),
                RawRule::Choice(options) => {
                    if options.is_empty() {
                        return Err(Error::Config(format!("field '{}' has no options", field)));
                    }
                    let mut cells = BTreeMap::new();
                    for (option, cell) in options.iter() {
                        cells.insert(option.to_string(), CellRef::parse(cell)?);
                    }
                    Rule::Choice(cells)
                }
            };
            rules.push((field.to_string(), rule));
        }
        Ok(Self { rules })
    }

    /// Build a table from already-typed rules.
    pub fn from_rules(rules: Vec<(String, Rule)>) -> Self {
        Self { rules }
    }

    pub fn rule(&self, field: &str) -> Option<&Rule> {
        self.rules.iter().find(|(name, _)| name == field).map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide what `field` of `record` does to the sheet, without touching it.
    pub fn resolve(&self, field: &str, record: &Record) -> FieldOutcome {
        let rule = self.rule(field).ok_or(Skipped::Unmapped)?;
        let value = record.text(field).ok_or(Skipped::Empty)?;

        match rule {
            Rule::Direct(cell) => Ok(Applied::Written { cell: *cell, value }),
            // Exact match on the string form; no case or whitespace folding.
            Rule::Choice(options) => match options.get(&value) {
                Some(cell) => Ok(Applied::Marked { cell: *cell, option: value }),
                None => Err(Skipped::NoMatchingOption(value)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_layout_is_valid() {
        let mapping = survey_mapping();
        assert_eq!(mapping.len(), SURVEY_LAYOUT.len());
        assert_eq!(mapping.rule("fecha"), Some(&Rule::Direct(CellRef::parse("D3").unwrap())));
    }

    #[test]
    fn test_choice_cells_are_unique_per_field() {
        for (field, rule) in survey_mapping().iter() {
            if let Rule::Choice(options) = rule {
                let mut cells: Vec<_> = options.values().collect();
                cells.sort();
                cells.dedup();
                assert_eq!(cells.len(), options.len(), "duplicate option cell in {}", field);
            }
        }
    }

    #[test]
    fn test_resolve_direct() {
        let record = Record::new().with("pozo_numero", "W1");
        assert_eq!(
            survey_mapping().resolve("pozo_numero", &record),
            Ok(Applied::Written { cell: CellRef::parse("D6").unwrap(), value: "W1".into() })
        );
    }

    #[test]
    fn test_resolve_choice_marks_exact_match_only() {
        let mapping = survey_mapping();
        let hit = Record::new().with("tapa_estado", "Regular");
        assert_eq!(
            mapping.resolve("tapa_estado", &hit),
            Ok(Applied::Marked { cell: CellRef::parse("F21").unwrap(), option: "Regular".into() })
        );

        let lower = Record::new().with("tapa_estado", "regular");
        assert_eq!(
            mapping.resolve("tapa_estado", &lower),
            Err(Skipped::NoMatchingOption("regular".into()))
        );

        let padded = Record::new().with("tapa_estado", "Regular ");
        assert!(matches!(mapping.resolve("tapa_estado", &padded), Err(Skipped::NoMatchingOption(_))));
    }

    #[test]
    fn test_resolve_skips_empty_and_unmapped() {
        let record = Record::new().with("fecha", "").with("color_favorito", "azul");
        assert_eq!(survey_mapping().resolve("fecha", &record), Err(Skipped::Empty));
        assert_eq!(survey_mapping().resolve("direccion", &record), Err(Skipped::Empty));
        assert_eq!(survey_mapping().resolve("color_favorito", &record), Err(Skipped::Unmapped));
    }

    #[test]
    fn test_numeric_values_are_stringified_before_matching() {
        let mapping = FieldMapping::from_rules(vec![(
            "grade".to_string(),
            Rule::Choice(BTreeMap::from([("1".to_string(), CellRef::new(0, 0))])),
        )]);
        let record = Record::new().with("grade", 1);
        assert_eq!(
            mapping.resolve("grade", &record),
            Ok(Applied::Marked { cell: CellRef::new(0, 0), option: "1".into() })
        );
    }
}
