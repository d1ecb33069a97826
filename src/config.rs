use std::path::Path;

use serde::Deserialize;

use crate::error::SchedulerError;

pub const NODE_HOSTNAME_KEY: &str = "kubernetes.io/hostname";
pub const SCHEDULER_NAME_ENV: &str = "SNAME";
pub const CONFIG_DIR: &str = "/init";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[serde(other)]
    Info,
}

/// The scheduler's static configuration, read once from
/// `/init/<schedulerName>.yaml` at startup and threaded explicitly through
/// every function that needs it, rather than read from process-wide
/// globals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub namespace: String,
    pub log_level: LogLevel,
    pub data_centres_label: String,
    pub primary_data_centres: Vec<String>,
    pub no_primary_data_centres: Vec<String>,
}

impl Config {
    /// Loads the config for a scheduler registered under `scheduler_name`
    /// from `/init/<scheduler_name>.yaml`.
    pub fn load(scheduler_name: &str) -> Result<Config, SchedulerError> {
        let path = Path::new(CONFIG_DIR).join(format!("{scheduler_name}.yaml"));

        let raw = std::fs::read_to_string(&path).map_err(|e| {
            SchedulerError::Startup(format!("could not read {}: {e}", path.display()))
        })?;

        serde_yaml::from_str(&raw)
            .map_err(|e| SchedulerError::Startup(format!("could not parse {}: {e}", path.display())))
    }
}
