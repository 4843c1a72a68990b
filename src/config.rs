//! Collector configuration
//!
//! [`RunOptions`] is what the workload engine hands over; [`CollectorConfig`]
//! is the resolved, immutable view the collector is built from.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::threshold::ThresholdTracker;

/// Environment variable holding the access token, read once per collector.
pub const TOKEN_ENV_VAR: &str = "SKYRELAY_TOKEN";
/// Key under [`RunOptions::external`] holding [`ExternalConfig`].
pub const EXTERNAL_KEY: &str = "skyrelay";
/// How often buffered samples are shipped.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(1);
/// Base URL of the web app that displays registered runs.
pub const DEFAULT_WEB_APP_URL: &str = "https://app.skyrelay.io";

/// One ramping segment of a staged load profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub duration: Duration,
    pub target: Option<u64>,
}

impl Stage {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            target: None,
        }
    }

    pub fn with_target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }
}

/// Run options relevant to the collector.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub stages: Vec<Stage>,
    pub duration: Option<Duration>,
    pub thresholds: ThresholdTracker,
    /// Free-form per-output settings, keyed by output name.
    pub external: HashMap<String, serde_json::Value>,
}

/// Settings users can place under `external.skyrelay` in their options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub name: Option<String>,
    pub project_id: Option<i64>,
    pub host: Option<String>,
    pub web_app_url: Option<String>,
}

impl ExternalConfig {
    /// Decodes the collector's block from `external`, falling back to
    /// defaults when it is missing or malformed.
    pub fn from_external(external: &HashMap<String, serde_json::Value>) -> Self {
        let Some(value) = external.get(EXTERNAL_KEY) else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Malformed {} settings in script options: {}", EXTERNAL_KEY, e);
                Self::default()
            }
        }
    }

    /// Configured name, else the script's file name, else empty.
    pub fn name_or_script(&self, script_path: &str) -> String {
        if let Some(name) = self.name.as_ref().filter(|n| !n.is_empty()) {
            return name.clone();
        }
        Path::new(script_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn project_id_or_default(&self) -> i64 {
        self.project_id.unwrap_or(0)
    }
}

/// Planned run length in whole seconds, `-1` when unknown.
///
/// Staged profiles win over a fixed duration. Totals too large to
/// represent saturate at `i64::MAX` rather than colliding with `-1`.
pub fn derive_duration(stages: &[Stage], duration: Option<Duration>) -> i64 {
    if !stages.is_empty() {
        let total = stages.iter().fold(Duration::ZERO, |acc, s| {
            acc.checked_add(s.duration).unwrap_or(Duration::MAX)
        });
        return whole_seconds(total);
    }
    duration.map_or(-1, whole_seconds)
}

fn whole_seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Resolved collector settings.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub name: String,
    pub project_id: i64,
    /// Seconds, `-1` when unknown.
    pub duration: i64,
    pub thresholds: ThresholdTracker,
    pub push_interval: Duration,
    pub web_app_url: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            project_id: 0,
            duration: -1,
            thresholds: ThresholdTracker::default(),
            push_interval: DEFAULT_PUSH_INTERVAL,
            web_app_url: DEFAULT_WEB_APP_URL.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Resolves settings from run options and the script path.
    pub fn from_options(script_path: &str, options: &RunOptions) -> Self {
        let external = ExternalConfig::from_external(&options.external);
        Self::resolve(script_path, options, &external)
    }

    pub(crate) fn resolve(
        script_path: &str,
        options: &RunOptions,
        external: &ExternalConfig,
    ) -> Self {
        Self {
            name: external.name_or_script(script_path),
            project_id: external.project_id_or_default(),
            duration: derive_duration(&options.stages, options.duration),
            thresholds: options.thresholds.clone(),
            web_app_url: external
                .web_app_url
                .clone()
                .unwrap_or_else(|| DEFAULT_WEB_APP_URL.to_string()),
            ..Default::default()
        }
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }
}
