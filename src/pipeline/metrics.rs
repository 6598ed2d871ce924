use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::normalize::round2;
use crate::model::ProcessedJob;

/// Run-level aggregates, recomputed from scratch every run and persisted
/// only as part of the output document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub skill_frequency: BTreeMap<String, u64>,
    pub salary_stats: SalaryStats,
    pub location_distribution: BTreeMap<String, u64>,
    pub job_level_distribution: BTreeMap<String, u64>,
    pub total_jobs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SalaryStats {
    /// Null when no posting in the batch resolved to a salary.
    pub hourly: Option<HourlyStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HourlyStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
    pub avg: f64,
}

pub fn compute(jobs: &[ProcessedJob]) -> Metrics {
    let mut skill_frequency: BTreeMap<String, u64> = BTreeMap::new();
    let mut location_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut job_level_distribution: BTreeMap<String, u64> = BTreeMap::new();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0u64;

    for job in jobs {
        for skill in &job.skills {
            *skill_frequency.entry(skill.clone()).or_insert(0) += 1;
        }

        if let Some(salary) = &job.salary {
            min = min.min(salary.min);
            max = max.max(salary.max);
            sum += salary.avg;
            count += 1;
        }

        *location_distribution.entry(job.city.clone()).or_insert(0) += 1;

        for level in &job.level {
            *job_level_distribution.entry(level.clone()).or_insert(0) += 1;
        }
    }

    let hourly = if count > 0 {
        Some(HourlyStats {
            min,
            max,
            sum,
            count,
            avg: round2(sum / count as f64),
        })
    } else {
        None
    };

    Metrics {
        skill_frequency,
        salary_stats: SalaryStats { hourly },
        location_distribution,
        job_level_distribution,
        total_jobs: jobs.len() as u64,
    }
}

// ── Tests ──
