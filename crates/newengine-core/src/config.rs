use crate::error::{EngineError, EngineResult};
use crate::sched::DEFAULT_CAPACITY;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "NEWENGINE_CONFIG";

const FIXED_DT_ENV: &str = "NEWENGINE_FIXED_DT_MS";
const MAX_FRAME_DT_ENV: &str = "NEWENGINE_MAX_FRAME_DT_MS";
const LOG_LEVEL_ENV: &str = "NEWENGINE_LOG";

/// Engine configuration.
///
/// Layering: defaults -> JSON file -> environment. Every field has a default, so
/// an empty object (or no file at all) is a bootable config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed timestep for `fixed_update`, in milliseconds.
    pub fixed_dt_ms: u32,
    /// Upper bound for a variable frame's `dt`, in milliseconds.
    pub max_frame_dt_ms: u32,
    /// Fixed steps allowed per variable frame before the accumulator is capped.
    pub max_fixed_steps: u32,
    pub log: LogConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_dt_ms: 16,
            max_frame_dt_ms: 250,
            max_fixed_steps: 8,
            log: LogConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    pub colors: bool,
    pub include_module: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            colors: true,
            include_module: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub initial_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Loads defaults -> `path` (if given and present) -> process environment.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut cfg = match path {
            Some(path) => Self::load_json(path)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load_json(path: &Path) -> EngineResult<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            // Missing file is not an error.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EngineError::Other(format!(
                    "engine config read failed: path={:?} err={}",
                    path, e
                )))
            }
        };

        serde_json::from_str(&data).map_err(|e| {
            EngineError::Other(format!(
                "engine config parse failed (json): path={:?} err={}",
                path, e
            ))
        })
    }

    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::Other(format!("engine config parse failed (json): {e}")))
    }

    /// Applies overrides from `lookup` (the environment, in production).
    /// Unparsable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, FIXED_DT_ENV) {
            self.fixed_dt_ms = v;
        }
        if let Some(v) = parse_override(&lookup, MAX_FRAME_DT_ENV) {
            self.max_frame_dt_ms = v;
        }
        if let Some(v) = lookup(LOG_LEVEL_ENV) {
            let v = v.trim();
            if !v.is_empty() {
                self.log.level = v.to_ascii_lowercase();
            }
        }
    }

    /// Fixed timestep in seconds, never below 1ms.
    #[inline]
    pub fn fixed_dt_sec(&self) -> f32 {
        (self.fixed_dt_ms as f32 / 1000.0).max(0.001)
    }

    /// Variable-frame clamp in seconds, never below 1ms.
    #[inline]
    pub fn max_frame_dt_sec(&self) -> f32 {
        (self.max_frame_dt_ms as f32 / 1000.0).max(0.001)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
