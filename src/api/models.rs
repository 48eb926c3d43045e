use serde::Deserialize;
use std::fmt;

use crate::report::record::Record;

/// Spreadsheet row number of a data row (the header is row 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u32);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Pending,
    Generated,
    /// Anything else, including an empty cell. Never processed.
    Other(String),
}

/// Where the lifecycle status lives and how its values are spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    pub column: String,
    pub pending: String,
    pub generated: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            column: "Estado".to_string(),
            pending: "Pendiente".to_string(),
            generated: "Generado".to_string(),
        }
    }
}

impl StatusLabels {
    pub fn parse(&self, raw: &str) -> RowStatus {
        if raw == self.pending {
            RowStatus::Pending
        } else if raw == self.generated {
            RowStatus::Generated
        } else {
            RowStatus::Other(raw.to_string())
        }
    }

    pub fn label<'a>(&'a self, status: &'a RowStatus) -> &'a str {
        match status {
            RowStatus::Pending => &self.pending,
            RowStatus::Generated => &self.generated,
            RowStatus::Other(raw) => raw,
        }
    }

    pub fn status_of(&self, record: &Record) -> RowStatus {
        self.parse(&record.text(&self.column).unwrap_or_default())
    }
}

/// One row of the row store: its position plus every column as a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub record: Record,
}

/// A stored object as listed by the object store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectRef {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_values() {
        let labels = StatusLabels::default();
        assert_eq!(labels.parse("Pendiente"), RowStatus::Pending);
        assert_eq!(labels.parse("Generado"), RowStatus::Generated);
        assert_eq!(labels.parse("pendiente"), RowStatus::Other("pendiente".into()));
        assert_eq!(labels.label(&RowStatus::Generated), "Generado");
    }

    #[test]
    fn test_status_of_record_without_status_column() {
        let labels = StatusLabels::default();
        assert_eq!(labels.status_of(&Record::new()), RowStatus::Other(String::new()));
        let pending = Record::new().with("Estado", "Pendiente");
        assert_eq!(labels.status_of(&pending), RowStatus::Pending);
    }
}
