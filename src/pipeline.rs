//! Merge, refine, export and generate for each requested platform.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ExportConfig};
use crate::export::{ExportError, build_json};
use crate::ir::GenerateError;
use crate::merge::{MergeError, merge};
use crate::observe::{Event, Observer, Stage};
use crate::refine::{RefineError, refine};
use crate::render::{Banner, generate_data_header, generate_enum_header};
use crate::source::SourceError;
use crate::table::{TableKind, Workbook};
use crate::token::Platform;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Refine(#[from] RefineError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformArtifacts {
    pub platform: Platform,
    pub enum_header: String,
    pub data_header: String,
    /// `(table, document)` in table order.
    pub json: Vec<(String, serde_json::Value)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub platforms: Vec<PlatformArtifacts>,
}

impl Artifacts {
    pub fn platform(&self, platform: Platform) -> Option<&PlatformArtifacts> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

pub struct Compiler<'a> {
    config: ExportConfig,
    observer: &'a dyn Observer,
}

impl<'a> Compiler<'a> {
    pub fn new(config: ExportConfig, observer: &'a dyn Observer) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Builds every artifact in memory. Nothing is written on failure.
    pub fn compile(&self, workbook: Workbook, platforms: &[Platform]) -> Result<Artifacts, Error> {
        let merged = merge(workbook, self.observer)?;
        let banner = Banner::for_workbook(&merged);

        for table in &merged.tables {
            if table.kind() == TableKind::Other {
                self.observer.observe(&Event::TableSkipped {
                    stage: Stage::Generate,
                    table: &table.name,
                    reason: "neither a data nor an enum table",
                });
            }
        }

        let mut artifacts = Artifacts::default();
        for &platform in platforms {
            artifacts
                .platforms
                .push(self.compile_platform(&merged, platform, &banner)?);
        }
        Ok(artifacts)
    }

    fn compile_platform(
        &self,
        workbook: &Workbook,
        platform: Platform,
        banner: &Banner,
    ) -> Result<PlatformArtifacts, Error> {
        let refined = refine(workbook, platform, self.observer)?;

        let json = refined
            .iter()
            .map(|t| {
                build_json(t, platform, &self.config.row_name_field).map(|v| (t.name.clone(), v))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let enum_header = generate_enum_header(workbook, platform, &self.config, banner)?;
        self.observer.observe(&Event::HeaderGenerated {
            platform,
            kind: "enum",
            declarations: workbook.enum_tables().count(),
        });

        let data_header = generate_data_header(workbook, platform, &self.config, banner)?;
        self.observer.observe(&Event::HeaderGenerated {
            platform,
            kind: "data",
            declarations: workbook.data_tables().count(),
        });

        Ok(PlatformArtifacts {
            platform,
            enum_header,
            data_header,
            json,
        })
    }

    /// Writes each artifact in full before the next. Existing files are
    /// overwritten; a failure leaves earlier files in place.
    pub fn write(&self, artifacts: &Artifacts) -> Result<Vec<PathBuf>, Error> {
        let mut written = Vec::new();

        for p in &artifacts.platforms {
            let header_dir = self.config.header_dir(p.platform);
            written.push(self.write_file(
                &header_dir.join(self.config.enum_file(p.platform)),
                p.enum_header.as_bytes(),
            )?);
            written.push(self.write_file(
                &header_dir.join(self.config.data_file(p.platform)),
                p.data_header.as_bytes(),
            )?);

            let json_dir = self.config.json_dir(p.platform);
            for (table, doc) in &p.json {
                let path = json_dir.join(format!("{}.json", table));
                let text = serde_json::to_string_pretty(doc).map_err(|source| Error::Json {
                    path: path.clone(),
                    source,
                })?;
                written.push(self.write_file(&path, text.as_bytes())?);
            }
        }

        Ok(written)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<PathBuf, Error> {
        let io = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        std::fs::write(path, bytes).map_err(io)?;

        self.observer.observe(&Event::ArtifactWritten {
            path,
            bytes: bytes.len(),
        });
        Ok(path.to_path_buf())
    }
}
