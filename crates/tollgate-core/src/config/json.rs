use crate::error::ConfigError;

use super::{Config, Format};

#[derive(Default)]
pub struct Json<'a> {
    input: &'a str,
}

impl<'a> Json<'a> {
    pub fn new(input: &'a str) -> Self {
        Json { input }
    }
}

impl<'a> From<&'a str> for Json<'a> {
    fn from(input: &'a str) -> Self {
        Json::new(input)
    }
}

impl<'a> Format<'a> for Json<'a> {
    fn from_str(input: &'a str) -> Self {
        Json::new(input)
    }

    fn to_format_string(&self, config: &Config) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(config).map_err(|e| {
            ConfigError::SerializeError(format!("Failed to convert config to JSON string: {e}"))
        })
    }

    fn set_input(&mut self, input: &'a str) {
        self.input = input
    }

    fn parse(&self) -> Result<Config, ConfigError> {
        serde_json::from_str(self.input).map_err(|e| ConfigError::ParseError {
            field: "root".to_string(),
            message: format!("Failed to parse JSON configuration: {e}"),
        })
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
