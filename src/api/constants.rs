//! Endpoints and wire constants for the Google Sheets and Drive APIs

/// OAuth token endpoint for refresh-token exchange
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested for service-account tokens
pub const AUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// Sheets v4 base
pub const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Drive v3 metadata base
pub const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";

/// Drive v3 content upload base
pub const DRIVE_UPLOAD: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Boundary string for multipart/related uploads
pub const UPLOAD_BOUNDARY: &str = "survey_reports_upload";

pub const USER_AGENT: &str = "survey-reports/0.1";

pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";
}

/// Build a values endpoint for an A1 range
pub fn values_endpoint(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/{}/values/{}",
        SHEETS_BASE,
        spreadsheet_id,
        urlencoding::encode(range)
    )
}

/// Build the append endpoint for a sheet
pub fn append_endpoint(spreadsheet_id: &str, range: &str) -> String {
    format!("{}:append", values_endpoint(spreadsheet_id, range))
}

/// Quote a sheet title for use in an A1 range
pub fn quoted_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Escape a literal for a Drive `q` expression
pub fn drive_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
