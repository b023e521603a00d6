// InfluxDB health store - InfluxQL windowed statistics and polled anchored queries
use crate::application::health_store::{AnchoredQuery, BatchReceiver, HealthStore, StoreError};
use crate::domain::metric::{MetricKind, Quantity, StatisticsOption};
use crate::domain::sample::{Anchor, AnchoredBatch, Sample, SamplePredicate};
use crate::domain::statistics::{Statistics, StatisticsCollection, StatisticsRequest};
use crate::infrastructure::config::{prepare_query, InfluxSettings};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct InfluxHealthStore {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    poll_interval: Duration,
    statistics_query: String,
    samples_query: String,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxQLSeries {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

impl InfluxHealthStore {
    pub fn new(settings: InfluxSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            statistics_query: settings.statistics_query,
            samples_query: settings.samples_query,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse, StoreError> {
        let url = self.build_query_url(query);
        tracing::debug!("Executing InfluxQL: {}", query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Unauthorized(self.database.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Query(format!("status {}: {}", status, body)));
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;

        if let Some(error) = data.results.first().and_then(|r| r.error.as_ref()) {
            return Err(StoreError::Query(error.clone()));
        }

        Ok(data)
    }

    fn statistics_query_for(&self, request: &StatisticsRequest) -> String {
        let mut vars = window_vars(request.metric, &request.predicate);
        vars.insert("function".to_string(), request.option.influx_function().to_string());
        vars.insert("interval".to_string(), request.interval.influx_duration().to_string());
        vars.insert("tz".to_string(), request.anchor_date.timezone().name().to_string());
        prepare_query(&self.statistics_query, &vars)
    }

    fn samples_query_for(&self, metric: MetricKind, predicate: &SamplePredicate, after: Anchor) -> String {
        let mut vars = window_vars(metric, predicate);
        vars.insert("after".to_string(), after.0.to_string());
        prepare_query(&self.samples_query, &vars)
    }

    /// Samples newer than `after`, plus the anchor of the newest one.
    async fn samples_since(
        &self,
        metric: MetricKind,
        predicate: &SamplePredicate,
        after: Anchor,
    ) -> Result<AnchoredBatch, StoreError> {
        let query = self.samples_query_for(metric, predicate, after);
        let response = self.execute_query(&query).await?;
        let (added, newest) = parse_samples(&response, metric);

        Ok(AnchoredBatch {
            metric,
            added,
            deleted: Vec::new(),
            anchor: newest.map_or(after, |n| n.max(after)),
        })
    }
}

fn window_vars(metric: MetricKind, predicate: &SamplePredicate) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("measurement".to_string(), metric.measurement().to_string());
    vars.insert("start".to_string(), rfc3339(&predicate.start));
    vars.insert("end".to_string(), rfc3339(&predicate.end));
    vars
}

fn rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn parse_statistics(response: &InfluxQLResponse, request: &StatisticsRequest) -> StatisticsCollection {
    let unit = request.metric.preferred_unit();
    let mut buckets = Vec::new();

    let series = response
        .results
        .first()
        .and_then(|r| r.series.as_ref())
        .into_iter()
        .flatten();

    for s in series {
        let time_idx = s.column("time").unwrap_or(0);
        let value_idx = s.column("value").unwrap_or(1);

        for row in &s.values {
            let (Some(start), Some(value)) = (
                row.get(time_idx).and_then(parse_time),
                row.get(value_idx).and_then(|v| v.as_f64()),
            ) else {
                continue;
            };

            let local_start = start.with_timezone(&request.anchor_date.timezone());
            let end = request.interval.advance(&local_start).with_timezone(&Utc);
            let mut stats = Statistics::empty(start, end);
            let quantity = Some(Quantity::new(value, unit));
            match request.option {
                StatisticsOption::CumulativeSum => stats.sum = quantity,
                StatisticsOption::DiscreteAverage => stats.average = quantity,
            }
            buckets.push(stats);
        }
    }

    StatisticsCollection::new(buckets)
}

fn parse_samples(response: &InfluxQLResponse, metric: MetricKind) -> (Vec<Sample>, Option<Anchor>) {
    let unit = metric.preferred_unit();
    let mut samples = Vec::new();
    let mut newest: Option<Anchor> = None;

    let series = response
        .results
        .first()
        .and_then(|r| r.series.as_ref())
        .into_iter()
        .flatten();

    for s in series {
        let time_idx = s.column("time").unwrap_or(0);
        let value_idx = s.column("value").unwrap_or(1);
        let id_idx = s.column("sample_id");

        for row in &s.values {
            let (Some(time), Some(value)) = (
                row.get(time_idx).and_then(parse_time),
                row.get(value_idx).and_then(|v| v.as_f64()),
            ) else {
                continue;
            };
            // Anchors are unsigned; rows before the epoch cannot be ordered
            let Some(nanos) = time.timestamp_nanos_opt().and_then(|n| u64::try_from(n).ok()) else {
                tracing::warn!("Skipping {} row at {} with no valid anchor", metric, time);
                continue;
            };

            let id = id_idx
                .and_then(|i| row.get(i))
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(|| Uuid::from_u64_pair(nanos, 0));

            samples.push(Sample {
                id,
                metric,
                start: time,
                end: time,
                quantity: Quantity::new(value, unit),
            });

            let anchor = Anchor(nanos);
            newest = Some(newest.map_or(anchor, |n| n.max(anchor)));
        }
    }

    (samples, newest)
}

#[async_trait]
impl HealthStore for InfluxHealthStore {
    async fn request_authorization(&self, _metrics: &[MetricKind]) -> Result<bool, StoreError> {
        match self.execute_query("SHOW MEASUREMENTS LIMIT 1").await {
            Ok(_) => Ok(true),
            Err(StoreError::Unauthorized(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn statistics_collection(
        &self,
        request: &StatisticsRequest,
    ) -> Result<StatisticsCollection, StoreError> {
        let query = self.statistics_query_for(request);
        let response = self.execute_query(&query).await?;
        let collection = parse_statistics(&response, request);
        tracing::debug!("Got {} buckets for {}", collection.len(), request.metric);
        Ok(collection)
    }

    async fn subscribe(&self, query: AnchoredQuery) -> Result<BatchReceiver, StoreError> {
        let AnchoredQuery {
            metric,
            predicate,
            anchor,
        } = query;

        // The initial batch must succeed for the subscription to start
        let initial = self
            .samples_since(metric, &predicate, anchor.unwrap_or(Anchor(0)))
            .await?;
        let mut cursor = initial.anchor;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        tx.send(Ok(initial))
            .await
            .map_err(|e| StoreError::Query(format!("initial batch not delivered: {}", e)))?;

        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let next = store.samples_since(metric, &predicate, cursor).await;
                let delivery = match next {
                    Ok(batch) if batch.is_empty() => continue,
                    Ok(batch) => {
                        cursor = batch.anchor;
                        Ok(batch)
                    }
                    Err(e) => Err(e),
                };

                if tx.send(delivery).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Stopped polling {}", metric);
        });

        Ok(rx)
    }
}
