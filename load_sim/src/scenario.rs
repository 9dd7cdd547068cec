//! # Scenario files
//!
//! A scenario is a TOML file listing load attempts in order. Each attempt
//! names the image it loads and, optionally, the status the simulated host
//! returns for a step instead of success.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! file  = "loadsim.log"
//!
//! [[load]]
//! identity = "mic0"
//! bind_status = 0xC0000001
//! ```

use serde::Deserialize;
use shared::NtStatus;
use shared::sim::FaultPlan;
use std::{fs, io, path::Path, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{identity}: {value:#X} is not a 32-bit status")]
    Status { identity: String, value: i64 },

    #[error("scenario has no [[load]] entries")]
    Empty,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), file: None }
    }
}

fn default_level() -> String {
    "info".into()
}

fn yes() -> bool {
    true
}

/// One `[[load]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadSpec {
    pub identity: String,
    pub callback_status: Option<i64>,
    pub bind_status: Option<i64>,
    pub register_status: Option<i64>,
    /// Unload the image once `DriverEntry` returned.
    #[serde(default = "yes")]
    pub unload: bool,
}

impl LoadSpec {
    /// Injected statuses for this attempt. Success codes inject nothing.
    pub fn fault_plan(&self) -> Result<FaultPlan, ScenarioError> {
        Ok(FaultPlan {
            callback: self.injected(self.callback_status)?,
            bind: self.injected(self.bind_status)?,
            register: self.injected(self.register_status)?,
        })
    }

    fn injected(&self, value: Option<i64>) -> Result<Option<NtStatus>, ScenarioError> {
        let Some(value) = value else { return Ok(None) };
        let status = to_status(value).ok_or_else(|| ScenarioError::Status {
            identity: self.identity.clone(),
            value,
        })?;
        Ok((!status.is_success()).then_some(status))
    }
}

/// Accept both spellings: `-1073741823` and `0xC0000001`.
fn to_status(value: i64) -> Option<NtStatus> {
    if let Ok(raw) = i32::try_from(value) {
        Some(NtStatus::from_raw(raw))
    } else {
        u32::try_from(value).ok().map(NtStatus::from_bits)
    }
}

/// Top-level scenario as deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "load")]
    pub loads: Vec<LoadSpec>,
}

impl Scenario {
    pub fn parse(txt: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(txt)?;
        if scenario.loads.is_empty() {
            return Err(ScenarioError::Empty);
        }
        for spec in &scenario.loads {
            spec.fault_plan()?;
        }
        Ok(scenario)
    }
}

/// Read and validate the scenario at `path`.
pub fn load(path: &Path) -> Result<Scenario, ScenarioError> {
    let txt = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Scenario::parse(&txt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(txt: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(txt.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_file_with_defaults() {
        let file = write(
            r#"
            [[load]]
            identity = "mic0"
            "#,
        );

        let scenario = load(file.path()).unwrap();

        assert_eq!(scenario.logging.level, "info");
        assert!(scenario.logging.file.is_none());
        assert_eq!(scenario.loads.len(), 1);
        assert!(scenario.loads[0].unload);
        assert_eq!(scenario.loads[0].fault_plan().unwrap(), FaultPlan::default());
    }

    #[test]
    fn hex_and_signed_statuses_are_the_same_code() {
        let scenario = Scenario::parse(
            r#"
            [[load]]
            identity = "hex"
            bind_status = 0xC0000001

            [[load]]
            identity = "signed"
            bind_status = -1073741823
            unload = false
            "#,
        )
        .unwrap();

        let hex = scenario.loads[0].fault_plan().unwrap();
        let signed = scenario.loads[1].fault_plan().unwrap();
        assert_eq!(hex.bind, Some(NtStatus::UNSUCCESSFUL));
        assert_eq!(hex, signed);
        assert!(!scenario.loads[1].unload);
    }

    #[test]
    fn success_codes_inject_nothing() {
        let scenario = Scenario::parse(
            r#"
            [[load]]
            identity = "mic0"
            register_status = 0
            callback_status = 0x103
            "#,
        )
        .unwrap();

        assert_eq!(scenario.loads[0].fault_plan().unwrap(), FaultPlan::default());
    }

    #[test]
    fn rejects_out_of_range_status() {
        let err = Scenario::parse(
            r#"
            [[load]]
            identity = "mic0"
            register_status = 0x1_0000_0000
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ScenarioError::Status { ref identity, .. } if identity == "mic0"));
    }

    #[test]
    fn rejects_empty_scenario() {
        let err = Scenario::parse("[logging]\nlevel = \"warn\"\n").unwrap_err();
        assert!(matches!(err, ScenarioError::Empty));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(err.to_string().contains("scenario.toml"));
    }
}
