//! Header renderers. Each target walks the same IR and only decides spelling.

pub mod client;
pub mod server;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::ExportConfig;
use crate::ir::{self, EnumDecl, GenerateError, StructDecl};
use crate::table::Workbook;
use crate::token::Platform;

pub use client::ClientRenderer;
pub use server::ServerRenderer;

pub trait HeaderRenderer {
    fn enum_header(&self, enums: &[EnumDecl], banner: &Banner) -> Result<String, GenerateError>;
    fn data_header(
        &self,
        structs: &[StructDecl],
        banner: &Banner,
    ) -> Result<String, GenerateError>;
}

/// Leading block shared by every generated header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Banner {
    pub exported_at: Option<DateTime<Utc>>,
}

impl Banner {
    pub fn new(exported_at: Option<DateTime<Utc>>) -> Self {
        Self { exported_at }
    }

    pub fn for_workbook(workbook: &Workbook) -> Self {
        Self::new(workbook.exported_at)
    }

    pub fn write(&self, out: &mut String) {
        out.push_str("//////////////////////////////////\n");
        out.push_str("// This file is auto generated. //\n");
        out.push_str("//////////////////////////////////\n");
        if let Some(at) = &self.exported_at {
            out.push_str(&format!(
                "// Exported at {}\n",
                at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        out.push_str("#pragma once\n");
    }
}

pub fn renderer_for(platform: Platform, config: &ExportConfig) -> Box<dyn HeaderRenderer> {
    match platform {
        Platform::Server => Box::new(ServerRenderer::from_config(config)),
        Platform::Client => Box::new(ClientRenderer::from_config(config)),
    }
}

/// Enum declarations for every enum table in `workbook`.
pub fn generate_enum_header(
    workbook: &Workbook,
    platform: Platform,
    config: &ExportConfig,
    banner: &Banner,
) -> Result<String, GenerateError> {
    let enums = ir::build_enums(workbook)?;
    renderer_for(platform, config).enum_header(&enums, banner)
}

/// Row struct declarations for every data table in `workbook`.
pub fn generate_data_header(
    workbook: &Workbook,
    platform: Platform,
    config: &ExportConfig,
    banner: &Banner,
) -> Result<String, GenerateError> {
    let structs = ir::build_structs(workbook, platform, &config.row_name_field)?;
    renderer_for(platform, config).data_header(&structs, banner)
}

/// `GameData.h` -> `GameData.generated.h`
fn generated_include(file: &str) -> String {
    let stem = std::path::Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    format!("{}.generated.h", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_banner_without_clock() {
        let mut out = String::new();
        Banner::default().write(&mut out);
        assert!(out.contains("// This file is auto generated. //"));
        assert!(out.ends_with("#pragma once\n"));
        assert!(!out.contains("Exported at"));
    }

    #[test]
    fn test_banner_with_pinned_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let mut out = String::new();
        Banner::new(Some(at)).write(&mut out);
        assert!(out.contains("// Exported at 2024-03-01T12:30:00Z\n"));
    }

    #[test]
    fn test_generated_include() {
        assert_eq!(generated_include("GameData.h"), "GameData.generated.h");
        assert_eq!(generated_include("GameDataEnum.h"), "GameDataEnum.generated.h");
    }
}
