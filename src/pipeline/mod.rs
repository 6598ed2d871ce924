//! Batch orchestration: one cheap synchronous pass over every posting
//! (cache, cascade, skills, derived fields), then a strictly sequential
//! second pass over the fallback queue so the cheap path never waits on the
//! generative service.

pub mod cascade;
pub mod metrics;
pub mod normalize;
pub mod section;
pub mod skills;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::{info, warn};

use crate::db;
use crate::geo;
use crate::llm::{GroqClient, MAX_INPUT_CHARS};
use crate::model::{OutputDoc, Posting, ProcessedJob, SalaryRange};
use crate::pipeline::normalize::round2;
use crate::pipeline::section::CompText;
use crate::pipeline::skills::SkillMatcher;

/// A posting held back for the generative fallback pass.
pub struct FallbackItem {
    /// Index into the output rows, for patching the result back in.
    pub index: usize,
    pub id: String,
    /// Truncated compensation-section text to send.
    pub section: String,
}

/// Delay between consecutive fallback calls, for the service's rate limits.
const FALLBACK_DELAY_MS: u64 = 200;

pub struct BatchOptions {
    pub input: String,
    pub output: String,
    pub db: String,
    pub limit: Option<usize>,
    pub skip_llm: bool,
}

pub struct BatchSummary {
    pub total: usize,
    pub with_salary: usize,
    pub cache_hits: usize,
    pub queued: usize,
    pub resolved_by_fallback: usize,
    pub new_cache_entries: usize,
}

/// Run the full batch: read postings, resolve salaries and skills, drain the
/// fallback queue, write the output document, then grow the cache. The cache
/// write happens only after a successful output write, so an aborted run
/// leaves the previous generation untouched.
pub async fn run_batch(opts: &BatchOptions) -> Result<BatchSummary> {
    let raw = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading input file {}", opts.input))?;
    let mut postings: Vec<Posting> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", opts.input))?;
    if let Some(n) = opts.limit {
        postings.truncate(n);
    }

    let conn = db::connect(&opts.db)?;
    db::init_schema(&conn)?;
    let cache = db::load_cache(&conn)?;
    let cache_hits = postings
        .iter()
        .filter(|p| cache.contains_key(&p.id))
        .count();

    let taxonomy = skills::default_taxonomy();
    let matcher = SkillMatcher::new(&taxonomy);

    let (mut jobs, queue) = resolve_postings(&postings, &cache, &matcher);
    let queued = queue.len();

    let mut resolved_by_fallback = 0;
    if !queue.is_empty() {
        if opts.skip_llm {
            info!(
                "fallback disabled; {} eligible postings left unresolved",
                queued
            );
        } else if let Some(client) = GroqClient::from_env() {
            resolved_by_fallback = run_fallbacks(&client, &queue, &mut jobs).await;
        } else {
            warn!(
                "GROQ_API_KEY not set; {} eligible postings left unresolved",
                queued
            );
        }
    }

    let metrics = metrics::compute(&jobs);
    let with_salary = metrics
        .salary_stats
        .hourly
        .as_ref()
        .map(|h| h.count as usize)
        .unwrap_or(0);
    let doc = OutputDoc { jobs, metrics };

    let file = File::create(&opts.output)
        .with_context(|| format!("creating output file {}", opts.output))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer.flush()?;

    // The finished output is the cache's next generation; existing entries
    // are never replaced.
    let entries: Vec<(String, SalaryRange)> = doc
        .jobs
        .iter()
        .filter_map(|j| j.salary.as_ref().map(|s| (j.id.clone(), s.clone())))
        .collect();
    let new_cache_entries = db::save_cache(&conn, &entries)?;

    Ok(BatchSummary {
        total: doc.jobs.len(),
        with_salary,
        cache_hits,
        queued,
        resolved_by_fallback,
        new_cache_entries,
    })
}

/// First pass: resolve every posting synchronously. Salary comes from the
/// cache when present, else the cascade; postings the cascade misses that
/// qualify for the fallback are queued for the second pass.
pub fn resolve_postings(
    postings: &[Posting],
    cache: &HashMap<String, SalaryRange>,
    matcher: &SkillMatcher,
) -> (Vec<ProcessedJob>, Vec<FallbackItem>) {
    let pb = ProgressBar::new(postings.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut jobs = Vec::with_capacity(postings.len());
    let mut queue = Vec::new();

    for (index, posting) in postings.iter().enumerate() {
        let combined = posting.combined_text();
        let comp = section::split(&combined);

        let salary = cache
            .get(&posting.id)
            .cloned()
            .or_else(|| cascade::extract_salary(&comp));

        if salary.is_none() && fallback_eligible(&comp) {
            queue.push(FallbackItem {
                index,
                id: posting.id.clone(),
                section: comp.primary().chars().take(MAX_INPUT_CHARS).collect(),
            });
        }

        let skills = matcher.tag(&combined);
        jobs.push(build_job(posting, salary, skills.into_iter().collect()));
        pb.inc(1);
    }

    pb.finish_and_clear();
    (jobs, queue)
}

/// The triple gate on fallback spend: the cascade already failed (callers
/// check that), a real compensation section exists, and it contains at least
/// one digit a model could read as a figure.
pub fn fallback_eligible(comp: &CompText) -> bool {
    comp.has_section() && comp.primary().chars().any(|c| c.is_ascii_digit())
}

/// Second pass: drain the fallback queue strictly sequentially, one request
/// at a time with a fixed inter-call delay. Returns how many resolved.
pub async fn run_fallbacks(
    client: &GroqClient,
    queue: &[FallbackItem],
    jobs: &mut [ProcessedJob],
) -> usize {
    let pb = ProgressBar::new(queue.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (fallback)")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut resolved = 0;
    for (n, item) in queue.iter().enumerate() {
        if n > 0 {
            tokio::time::sleep(Duration::from_millis(FALLBACK_DELAY_MS)).await;
        }
        if let Some(salary) = client.extract(&item.section).await {
            jobs[item.index].salary = Some(salary);
            resolved += 1;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("fallback resolved {}/{} queued postings", resolved, queue.len());
    resolved
}

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d)\s*month").unwrap());

fn build_job(posting: &Posting, salary: Option<SalaryRange>, skills: Vec<String>) -> ProcessedJob {
    let levels: Vec<String> = posting
        .level
        .split(',')
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let city = if posting.city.is_empty() {
        "Unknown".to_string()
    } else {
        posting.city.clone()
    };

    let apps_per_opening = if posting.openings > 0 {
        round2(posting.apps as f64 / posting.openings as f64)
    } else {
        posting.apps as f64
    };

    let duration = DURATION_RE
        .captures(&posting.full_description)
        .map(|c| format!("{} months", &c[1]))
        .unwrap_or_else(|| "4 months".to_string());

    ProcessedJob {
        id: posting.id.clone(),
        title: posting.title.clone(),
        organization: posting.organization.clone(),
        location: geo::lookup(&posting.city),
        city,
        country: "Canada".to_string(),
        level: levels,
        salary,
        skills,
        deadline: normalize_deadline(&posting.deadline),
        apps: posting.apps,
        openings: posting.openings,
        apps_per_opening,
        duration,
    }
}

/// Normalize the scraper's deadline strings to RFC 3339; unparseable input
/// becomes null rather than a guess.
fn normalize_deadline(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%b %d, %Y %I:%M %p",
        "%B %d, %Y %I:%M %p",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(
                Utc.from_utc_datetime(&naive)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(
                    Utc.from_utc_datetime(&naive)
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                );
            }
        }
    }

    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: &str, description: &str) -> Posting {
        Posting {
            id: id.to_string(),
            title: "Software Developer".to_string(),
            organization: "Acme".to_string(),
            city: "Waterloo".to_string(),
            level: "Junior, Intermediate".to_string(),
            apps: 25,
            openings: 2,
            deadline: "Feb 12, 2025 11:59 PM".to_string(),
            full_description: description.to_string(),
            application_info: String::new(),
        }
    }

    fn matcher() -> SkillMatcher {
        SkillMatcher::new(&skills::default_taxonomy())
    }

    #[test]
    fn digitless_section_never_queued_for_fallback() {
        let p = posting(
            "1",
            "Compensation and Benefits:\nNegotiable, to be discussed\n\nTargeted Degrees: CS",
        );
        let (jobs, queue) = resolve_postings(&[p], &HashMap::new(), &matcher());
        assert_eq!(queue.len(), 0); // zero fallback calls would be made
        assert!(jobs[0].salary.is_none());
    }

    #[test]
    fn unparsed_section_with_digits_is_queued() {
        let p = posting(
            "1",
            "Compensation and Benefits:\nCompetitive stipend, see posting 12345 for details\n\nEnd",
        );
        let (jobs, queue) = resolve_postings(&[p], &HashMap::new(), &matcher());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].index, 0);
        assert!(queue[0].section.contains("12345"));
        assert!(jobs[0].salary.is_none());
    }

    #[test]
    fn no_section_means_no_fallback_even_with_digits() {
        let p = posting("1", "Hiring 12 interns across 3 teams.");
        let (_, queue) = resolve_postings(&[p], &HashMap::new(), &matcher());
        assert!(queue.is_empty());
    }

    #[test]
    fn cascade_hit_is_not_queued() {
        let p = posting("1", "Compensation and Benefits:\n$25/hour\n\nEnd");
        let (jobs, queue) = resolve_postings(&[p], &HashMap::new(), &matcher());
        assert!(queue.is_empty());
        assert_eq!(jobs[0].salary.as_ref().unwrap().min, 25.0);
    }

    #[test]
    fn cache_wins_over_cascade() {
        // Cached value differs from what the text would parse to; the cache
        // is reused unconditionally so repeated runs never drift.
        let p = posting("1", "Pay: $20/hour");
        let mut cache = HashMap::new();
        cache.insert("1".to_string(), SalaryRange::hourly(50.0, 50.0, "llm:monthly"));

        let (jobs, queue) = resolve_postings(&[p], &cache, &matcher());
        assert!(queue.is_empty());
        let salary = jobs[0].salary.as_ref().unwrap();
        assert_eq!(salary.min, 50.0);
        assert_eq!(salary.provenance, "llm:monthly");
    }

    #[test]
    fn skills_are_always_freshly_computed() {
        let p = posting("1", "Node.js and reactjs required; pay $30/hour");
        let (jobs, _) = resolve_postings(&[p], &HashMap::new(), &matcher());
        assert!(jobs[0].skills.contains(&"Node.js".to_string()));
        assert!(jobs[0].skills.contains(&"React".to_string()));
    }

    #[test]
    fn derived_fields() {
        let p = posting("1", "This is an 8 month work term.");
        let job = build_job(&p, None, vec![]);

        assert_eq!(job.level, vec!["Junior", "Intermediate"]);
        assert_eq!(job.apps_per_opening, 12.5);
        assert_eq!(job.duration, "8 months");
        assert_eq!(job.city, "Waterloo");
        assert_eq!(job.location.lat, Some(43.4643));
        assert_eq!(job.country, "Canada");
        let deadline = job.deadline.unwrap();
        assert!(deadline.starts_with("2025-02-12T23:59:00"));
    }

    #[test]
    fn derived_field_defaults() {
        let mut p = posting("1", "No duration mentioned.");
        p.city = String::new();
        p.deadline = "whenever".to_string();
        let job = build_job(&p, None, vec![]);

        assert_eq!(job.duration, "4 months");
        assert_eq!(job.city, "Unknown");
        assert_eq!(job.location.lat, None);
        assert_eq!(job.deadline, None);
    }

    #[test]
    fn end_to_end_resolve_and_metrics() {
        let postings = vec![
            posting("1", "Compensation and Benefits:\n$4000/month\n\nEnd"),
            posting("2", "Compensation and Benefits:\nNegotiable\n\nEnd"),
        ];
        let (jobs, queue) = resolve_postings(&postings, &HashMap::new(), &matcher());
        assert!(queue.is_empty());

        let m = metrics::compute(&jobs);
        assert_eq!(m.total_jobs, 2);
        let hourly = m.salary_stats.hourly.unwrap();
        assert_eq!(hourly.count, 1);
        assert_eq!(hourly.min, 23.12);
        assert_eq!(m.location_distribution["Waterloo"], 2);
    }
}
