// Configuration loading - app settings, store backend and InfluxQL templates
use crate::domain::metric::MetricKind;
use crate::domain::time_range::TimeRange;
use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

const ENV_PREFIX: &str = "SMOOTHWALKER";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_range")]
    pub initial_range: TimeRange,
    #[serde(default = "default_anchor_path")]
    pub anchor_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timezone: default_timezone(),
            metrics: default_metrics(),
            initial_range: default_range(),
            anchor_path: default_anchor_path(),
        }
    }
}

impl AppSettings {
    pub fn time_zone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {}", self.timezone, e))
    }

    /// Tracked metrics in configured order; unknown identifiers are skipped.
    pub fn metric_kinds(&self) -> Vec<MetricKind> {
        self.metrics
            .iter()
            .filter_map(|id| {
                let metric = MetricKind::from_identifier(id);
                if metric.is_none() {
                    tracing::warn!("Ignoring unknown metric identifier {}", id);
                }
                metric
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Influx,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncSettings {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_statistics_query")]
    pub statistics_query: String,
    #[serde(default = "default_samples_query")]
    pub samples_query: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_metrics() -> Vec<String> {
    [
        MetricKind::WalkingSpeed,
        MetricKind::StepCount,
        MetricKind::DistanceWalkingRunning,
    ]
    .iter()
    .map(|m| m.identifier().to_string())
    .collect()
}

fn default_range() -> TimeRange {
    TimeRange::Week
}

fn default_anchor_path() -> PathBuf {
    PathBuf::from("state/anchors.json")
}

fn default_poll_interval() -> u64 {
    30
}

fn default_statistics_query() -> String {
    "SELECT ${function}(\"value\") AS \"value\" FROM \"${measurement}\" \
     WHERE time >= '${start}' AND time <= '${end}' \
     GROUP BY time(${interval}) fill(none) tz('${tz}')"
        .to_string()
}

fn default_samples_query() -> String {
    "SELECT \"value\", \"sample_id\" FROM \"${measurement}\" \
     WHERE time >= '${start}' AND time <= '${end}' AND time > ${after} \
     ORDER BY time ASC"
        .to_string()
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/app").required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings
        .try_deserialize()
        .context("Failed to parse application config")
}

pub fn load_influx_config() -> anyhow::Result<InfluxConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/influx"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
