//! Observer interface threaded through every pipeline stage.
//!
//! Stages never log through a process-wide logger; they report [`Event`]s to
//! the observer they were handed. [`TracingObserver`] forwards to `tracing`.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;

use crate::token::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Refine,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Refine => "refine",
            Stage::Generate => "generate",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    TableMerged {
        logical: &'a str,
        source: &'a str,
        rows: usize,
    },
    TableSkipped {
        stage: Stage,
        table: &'a str,
        reason: &'static str,
    },
    ColumnExcluded {
        table: &'a str,
        column: &'a str,
        platform: Platform,
    },
    /// An enum column references an enum table that is not in the workbook.
    EnumUnchecked {
        table: &'a str,
        column: &'a str,
        enum_name: &'a str,
    },
    TableRefined {
        table: &'a str,
        platform: Platform,
        rows: usize,
        fingerprint: u64,
    },
    HeaderGenerated {
        platform: Platform,
        kind: &'static str,
        declarations: usize,
    },
    ArtifactWritten {
        path: &'a Path,
        bytes: usize,
    },
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TableMerged {
                logical,
                source,
                rows,
            } => write!(f, "merged {} into {} ({} rows)", source, logical, rows),
            Event::TableSkipped {
                stage,
                table,
                reason,
            } => write!(f, "{}: skipped {} ({})", stage, table, reason),
            Event::ColumnExcluded {
                table,
                column,
                platform,
            } => write!(f, "excluded {}.{} on {}", table, column, platform),
            Event::EnumUnchecked {
                table,
                column,
                enum_name,
            } => write!(
                f,
                "{}.{} references unknown enum table {}",
                table, column, enum_name
            ),
            Event::TableRefined {
                table,
                platform,
                rows,
                fingerprint,
            } => write!(
                f,
                "refined {} for {} ({} rows, fingerprint {:016x})",
                table, platform, rows, fingerprint
            ),
            Event::HeaderGenerated {
                platform,
                kind,
                declarations,
            } => write!(
                f,
                "generated {} {} header ({} declarations)",
                platform, kind, declarations
            ),
            Event::ArtifactWritten { path, bytes } => {
                write!(f, "wrote {} ({} bytes)", path.display(), bytes)
            }
        }
    }
}

pub trait Observer {
    fn observe(&self, event: &Event<'_>);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &Event<'_>) {
        match event {
            Event::TableMerged {
                logical,
                source,
                rows,
            } => tracing::debug!(logical, source, rows, "table merged"),
            Event::TableSkipped {
                stage,
                table,
                reason,
            } => tracing::debug!(%stage, table, reason, "table skipped"),
            Event::ColumnExcluded {
                table,
                column,
                platform,
            } => tracing::trace!(table, column, %platform, "column excluded"),
            Event::EnumUnchecked {
                table,
                column,
                enum_name,
            } => tracing::warn!(
                table,
                column,
                enum_name,
                "enum table not found, values are not checked"
            ),
            Event::TableRefined {
                table,
                platform,
                rows,
                fingerprint,
            } => tracing::debug!(table, %platform, rows, fingerprint, "table refined"),
            Event::HeaderGenerated {
                platform,
                kind,
                declarations,
            } => tracing::info!(%platform, kind, declarations, "header generated"),
            Event::ArtifactWritten { path, bytes } => {
                tracing::info!(path = %path.display(), bytes, "artifact written")
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn observe(&self, _event: &Event<'_>) {}
}

/// Keeps the formatted text of every event, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events.borrow().iter().any(|e| e.contains(needle))
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &Event<'_>) {
        self.events.borrow_mut().push(event.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let obs = RecordingObserver::new();
        obs.observe(&Event::TableMerged {
            logical: "Item",
            source: "Item_1",
            rows: 3,
        });
        obs.observe(&Event::TableSkipped {
            stage: Stage::Refine,
            table: "Color",
            reason: "not a data table",
        });

        let events = obs.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "merged Item_1 into Item (3 rows)");
        assert!(obs.contains("refine: skipped Color"));
    }

    #[test]
    fn test_fingerprint_formatting() {
        let e = Event::TableRefined {
            table: "Item",
            platform: Platform::Client,
            rows: 2,
            fingerprint: 0xab,
        };
        assert_eq!(
            e.to_string(),
            "refined Item for client (2 rows, fingerprint 00000000000000ab)"
        );
    }
}
