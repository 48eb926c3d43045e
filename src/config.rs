//! Environment and settings-file configuration.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::auth::Credentials;
use crate::api::models::StatusLabels;
use crate::error::{Error, Result};
use crate::report::filler::SheetLayout;

pub const DEFAULT_SHEET_NAME: &str = "Tabla_Maestra_Pozos";

/// Where the remote collaborators live and how to reach them.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub credentials: Credentials,
    pub sheet_id: String,
    pub sheet_name: String,
    pub photo_folder_id: Option<String>,
    pub reports_folder_id: Option<String>,
    pub template_object_id: Option<String>,
    pub report_object_id: Option<String>,
}

impl RemoteConfig {
    /// Read the process environment, seeded from `.env` when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (get("GOOGLE_CREDENTIALS_JSON"), get("GOOGLE_ACCESS_TOKEN")) {
            (Some(json), _) => Credentials::from_json(&json)?,
            (None, Some(token)) => Credentials::AccessToken(token),
            (None, None) => {
                return Err(Error::Auth(
                    "neither GOOGLE_CREDENTIALS_JSON nor GOOGLE_ACCESS_TOKEN is set".to_string(),
                ));
            }
        };

        let sheet_id = get("SHEET_ID")
            .ok_or_else(|| Error::Config("SHEET_ID environment variable not set".to_string()))?;

        Ok(Self {
            credentials,
            sheet_id,
            sheet_name: get("SHEET_NAME").unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            photo_folder_id: get("DRIVE_FOLDER_ID"),
            reports_folder_id: get("REPORTS_FOLDER_ID"),
            template_object_id: get("TEMPLATE_OBJECT_ID").or_else(|| get("MASTER_REPORT_ID")),
            report_object_id: get("REPORT_OBJECT_ID"),
        })
    }

    /// Template and output locations for a generation run.
    ///
    /// Without `REPORT_OBJECT_ID` the template object is the master report
    /// and new sheets are appended to it in place.
    pub fn report_targets(&self) -> Result<ReportTargets> {
        let template = self.template_object_id.clone().ok_or_else(|| {
            Error::Config("TEMPLATE_OBJECT_ID (or MASTER_REPORT_ID) not set".to_string())
        })?;
        let output = self.report_object_id.clone().unwrap_or_else(|| template.clone());
        Ok(ReportTargets { template, output })
    }

    pub fn photo_folder(&self) -> Result<&str> {
        self.photo_folder_id
            .as_deref()
            .ok_or_else(|| Error::Config("DRIVE_FOLDER_ID not set".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTargets {
    pub template: String,
    pub output: String,
}

/// Rendering knobs from the optional settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub font_path: Option<PathBuf>,
    pub placeholder_path: Option<PathBuf>,
    pub status_column: String,
    pub pending_label: String,
    pub generated_label: String,
    pub identifier_field: String,
    pub connections_width_px: u32,
    pub observations_width: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let labels = StatusLabels::default();
        let layout = SheetLayout::default();
        Self {
            font_path: None,
            placeholder_path: Some(PathBuf::from("esquema_placeholder.png")),
            status_column: labels.column,
            pending_label: labels.pending,
            generated_label: labels.generated,
            identifier_field: "pozo_numero".to_string(),
            connections_width_px: layout.connections_width_px,
            observations_width: layout.observations_width,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("survey-reports").join("settings.toml"))
    }

    /// Load `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                debug!("No config directory, using default settings");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            info!("Settings file {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {:?}: {}", path, e)))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {:?}: {}", path, e)))?;
        settings.validate()?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.status_column.trim().is_empty() {
            return Err(Error::Config("status_column must not be empty".to_string()));
        }
        if self.pending_label == self.generated_label {
            return Err(Error::Config(
                "pending_label and generated_label must differ".to_string(),
            ));
        }
        if self.connections_width_px == 0 || self.observations_width == 0 {
            return Err(Error::Config("widths must be positive".to_string()));
        }
        Ok(())
    }

    pub fn status_labels(&self) -> StatusLabels {
        StatusLabels {
            column: self.status_column.clone(),
            pending: self.pending_label.clone(),
            generated: self.generated_label.clone(),
        }
    }

    pub fn sheet_layout(&self) -> SheetLayout {
        SheetLayout {
            connections_width_px: self.connections_width_px,
            observations_width: self.observations_width,
            ..SheetLayout::default()
        }
    }
}
