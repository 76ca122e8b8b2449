use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::token::Platform;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

const DEFAULT_SERVER_HEADER_DIR: &str = "../serverHeader";
const DEFAULT_CLIENT_HEADER_DIR: &str = "../clientHeader";
const DEFAULT_SERVER_JSON_DIR: &str = "../serverJson";
const DEFAULT_CLIENT_JSON_DIR: &str = "../clientJson";

/// Output locations and naming for one export run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub server_header_dir: PathBuf,
    pub client_header_dir: PathBuf,
    pub server_json_dir: PathBuf,
    pub client_json_dir: PathBuf,
    pub server_enum_file: String,
    pub server_data_file: String,
    pub client_enum_file: String,
    pub client_data_file: String,
    pub server_namespace: String,
    /// Synthetic leading field carried by every client row.
    pub row_name_field: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            server_header_dir: PathBuf::from(DEFAULT_SERVER_HEADER_DIR),
            client_header_dir: PathBuf::from(DEFAULT_CLIENT_HEADER_DIR),
            server_json_dir: PathBuf::from(DEFAULT_SERVER_JSON_DIR),
            client_json_dir: PathBuf::from(DEFAULT_CLIENT_JSON_DIR),
            server_enum_file: "gamedata_enum.h".to_string(),
            server_data_file: "gamedata_data.h".to_string(),
            client_enum_file: "GameDataEnum.h".to_string(),
            client_data_file: "GameData.h".to_string(),
            server_namespace: "rh::gamedata".to_string(),
            row_name_field: "Name".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Output directories still at their defaults are taken relative to the
    /// input's directory instead of the working directory.
    pub fn resolve_relative_to(&mut self, input_dir: &Path) {
        let fix = |dir: &mut PathBuf, default: &str| {
            if dir.as_path() == Path::new(default) {
                *dir = input_dir.join(default);
            }
        };
        fix(&mut self.server_header_dir, DEFAULT_SERVER_HEADER_DIR);
        fix(&mut self.client_header_dir, DEFAULT_CLIENT_HEADER_DIR);
        fix(&mut self.server_json_dir, DEFAULT_SERVER_JSON_DIR);
        fix(&mut self.client_json_dir, DEFAULT_CLIENT_JSON_DIR);
    }

    pub fn header_dir(&self, platform: Platform) -> &Path {
        match platform {
            Platform::Server => &self.server_header_dir,
            Platform::Client => &self.client_header_dir,
        }
    }

    pub fn json_dir(&self, platform: Platform) -> &Path {
        match platform {
            Platform::Server => &self.server_json_dir,
            Platform::Client => &self.client_json_dir,
        }
    }

    pub fn enum_file(&self, platform: Platform) -> &str {
        match platform {
            Platform::Server => &self.server_enum_file,
            Platform::Client => &self.client_enum_file,
        }
    }

    pub fn data_file(&self, platform: Platform) -> &str {
        match platform {
            Platform::Server => &self.server_data_file,
            Platform::Client => &self.client_data_file,
        }
    }
}
