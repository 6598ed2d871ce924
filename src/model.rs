use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::pipeline::metrics::Metrics;
use crate::pipeline::normalize::round2;

/// One scraped posting as it appears in the raw jobs file. The scraper emits
/// every field as a string, but older dumps carry numeric ids/counts, so the
/// numeric-ish fields accept either.
#[derive(Debug, Clone, Deserialize)]
pub struct Posting {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub level: String,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub apps: i64,
    #[serde(default = "one", deserialize_with = "count_or_one")]
    pub openings: i64,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub application_info: String,
}

impl Posting {
    /// Description and application info concatenated, the haystack for both
    /// salary and skill extraction.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.full_description, self.application_info)
    }
}

/// A normalized hourly compensation range. `unit` is always "hourly" once a
/// range has passed through the normalizer; `provenance` records which
/// cascade rule (or fallback period) produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    #[serde(rename = "type")]
    pub unit: String,
    pub currency: String,
    pub provenance: String,
}

impl SalaryRange {
    /// Build a range from unrounded hourly endpoints. `avg` is derived from
    /// the stored (rounded) endpoints so `avg == round((min+max)/2)` holds on
    /// the serialized values.
    pub fn hourly(min: f64, max: f64, provenance: &str) -> Self {
        let min = round2(min);
        let max = round2(max);
        SalaryRange {
            min,
            max,
            avg: round2((min + max) / 2.0),
            unit: "hourly".to_string(),
            currency: "CAD".to_string(),
            provenance: provenance.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// One fully resolved output record, shaped for the dashboard feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedJob {
    pub id: String,
    pub title: String,
    pub organization: String,
    pub city: String,
    pub country: String,
    pub location: Location,
    pub level: Vec<String>,
    pub salary: Option<SalaryRange>,
    pub skills: Vec<String>,
    pub deadline: Option<String>,
    pub apps: i64,
    pub openings: i64,
    pub apps_per_opening: f64,
    pub duration: String,
}

/// The persisted output document: normalized jobs plus run-level aggregates.
#[derive(Debug, Serialize, Deserialize)]
pub struct OutputDoc {
    pub jobs: Vec<ProcessedJob>,
    pub metrics: Metrics,
}

fn one() -> i64 {
    1
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn lenient_count<'de, D>(de: D, fallback: i64) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    let parsed = match &value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or(fallback))
}

fn count_or_zero<'de, D>(de: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_count(de, 0)
}

fn count_or_one<'de, D>(de: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_count(de, 1)
}

// ── Tests ──
