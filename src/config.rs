use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_DATA_FILE: &str = "smart_attendance.json";
pub const DEFAULT_LOG_FILTER: &str = "smart_attendance=info";

#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Postgres { url: String, max_connections: u32 },
    Snapshot { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: Backend,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. `DATABASE_URL` selects
    /// Postgres; otherwise records live in a JSON snapshot file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match non_empty("DATABASE_URL") {
            Some(url) => {
                let max_connections = match non_empty("SMART_ATTENDANCE_MAX_CONNECTIONS") {
                    Some(raw) => raw.trim().parse::<u32>().with_context(|| {
                        format!("SMART_ATTENDANCE_MAX_CONNECTIONS must be a positive integer, got {raw:?}")
                    })?,
                    None => 5,
                };
                anyhow::ensure!(
                    max_connections > 0,
                    "SMART_ATTENDANCE_MAX_CONNECTIONS must be at least 1"
                );
                Backend::Postgres {
                    url,
                    max_connections,
                }
            }
            None => Backend::Snapshot {
                path: non_empty("SMART_ATTENDANCE_DATA")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            },
        };

        Ok(Self {
            backend,
            log_filter: non_empty("SMART_ATTENDANCE_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}
