use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tollgate::config::{Format, json, toml};

use crate::error::CliError;

#[derive(ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatType {
    /// TOML format
    #[default]
    Toml,

    /// JSON format
    Json,
}

impl FormatType {
    /// Pick the format from a file's extension
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(FormatType::Toml),
            Some("json") => Ok(FormatType::Json),
            Some(other) => Err(CliError::Generic(format!(
                "Unsupported configuration format `.{other}`, expected `.toml` or `.json`"
            ))),
            None => Ok(FormatType::default()),
        }
    }

    /// Get the associated format for the type
    pub fn format<'a>(&self, input: &'a str) -> Box<dyn Format<'a> + 'a> {
        match self {
            FormatType::Toml => Box::new(toml::Toml::from(input)),
            FormatType::Json => Box::new(json::Json::from(input)),
        }
    }
}
