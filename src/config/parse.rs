use std::path::Path;

use crate::config::types::Configuration;
use crate::data::{detect_format, DataFormat};
use crate::MailbatchError;

/// Load a configuration file, picking the parser from the file extension.
pub fn load_configuration(path: &Path) -> crate::Result<Configuration> {
    let content = std::fs::read_to_string(path).map_err(|source| MailbatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match detect_format(path)? {
        DataFormat::Yaml => {
            serde_yaml::from_str(&content).map_err(|source| MailbatchError::ConfigYaml {
                path: path.to_path_buf(),
                source,
            })
        }
        DataFormat::Json => {
            serde_json::from_str(&content).map_err(|source| MailbatchError::JsonParse {
                path: path.to_path_buf(),
                source,
            })
        }
        DataFormat::Toml => toml::from_str(&content).map_err(|source| MailbatchError::TomlParse {
            path: path.to_path_buf(),
            source,
        }),
        DataFormat::Csv => Err(MailbatchError::UnsupportedFormat {
            extension: "csv".to_string(),
        }),
    }
}

pub fn parse_configuration_str(content: &str) -> crate::Result<Configuration> {
    serde_yaml::from_str(content).map_err(|source| MailbatchError::ConfigYaml {
        path: std::path::PathBuf::from("<string>"),
        source,
    })
}
