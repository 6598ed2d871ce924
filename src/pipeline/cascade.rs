//! The salary pattern cascade: an ordered list of extraction rules run until
//! one produces a range. Order is load-bearing — several patterns overlap on
//! plausible input (a "$30-40k" can satisfy both the term-total and bare-K
//! rules) and the earlier, more specific rule must win. Do not reorder or
//! merge rules.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{plausible_hourly, to_hourly, Period};
use super::section::CompText;
use crate::model::SalaryRange;

type Rule = fn(&CompText) -> Option<SalaryRange>;

const RULES: &[Rule] = &[
    term_total,
    monthly_prefix,
    hourly,
    hourly_fallback,
    hourly_rate,
    aggressive,
    yearly,
    annual_equiv,
    weekly,
    monthly,
    monthly_bare,
    hourly_bare,
    weekly_bare,
    salary_of,
    currency_first,
    k_range,
];

/// Run the cascade over a posting's text. First rule to fire wins; no rule
/// firing is the normal outcome for postings without a stated salary. A
/// match whose normalized minimum falls outside the plausible hourly band
/// is discarded, not stored.
pub fn extract_salary(text: &CompText) -> Option<SalaryRange> {
    RULES
        .iter()
        .find_map(|rule| rule(text))
        .filter(|s| plausible_hourly(s.min))
}

fn parse_num(s: &str) -> Option<f64> {
    s.replace(',', "").parse().ok()
}

// "$30-40k for the term" / "$30k to $40k": a lump sum for an assumed
// 4-month work term.
static TERM_K_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$(\d{2,3})k?\s*(?:[-–]|to)\s*\$(\d{2,3})k").unwrap());

fn term_total(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&TERM_K_RE)?;
    let min_k = parse_num(&caps[1])?;
    let max_k = parse_num(&caps[2])?;
    Some(SalaryRange::hourly(
        to_hourly(min_k * 1000.0, Period::Term),
        to_hourly(max_k * 1000.0, Period::Term),
        "term_total",
    ))
}

// "Monthly range of $3060-$4540" / "Monthly salary of $X" (prefix style).
static MONTHLY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Monthly\s+(?:range|salary|rate|compensation|pay)(?:.*?)\$([\d,]+(?:\.\d{2})?)(?:\s*(?:[-–]|to)\s*\$?([\d,]+(?:\.\d{2})?))?",
    )
    .unwrap()
});

fn monthly_prefix(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&MONTHLY_PREFIX_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Monthly),
        to_hourly(max, Period::Monthly),
        "monthly_prefix",
    ))
}

// "$24.20-$30.00/hr", "$24 to $30 per hour", "$25-40/hourly".
static HOURLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$(\d{1,3}(?:\.\d{1,2})?)(?:(?:\s*[-–]\s*|\s*to\s*)\$?(\d{1,3}(?:\.\d{1,2})?))?\s*(?:/|per\s)\s*(?:h(?:ou)?r|hourly)",
    )
    .unwrap()
});

fn hourly(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&HOURLY_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(min, max, "hourly"))
}

// Looser hourly phrasing: "$XX - $XX an hour".
static HOURLY_FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$(\d{1,3}(?:\.\d{1,2})?)\s*(?:[-–]|to)\s*\$?(\d{1,3}(?:\.\d{1,2})?)\s*(?:per|an|/)\s*(?:h(?:ou)?r|hourly)",
    )
    .unwrap()
});

fn hourly_fallback(text: &CompText) -> Option<SalaryRange> {
    let caps = HOURLY_FALLBACK_RE.captures(text.primary())?;
    let min = parse_num(&caps[1])?;
    let max = parse_num(&caps[2])?;
    Some(SalaryRange::hourly(min, max, "hourly_fallback"))
}

// "$XX hourly rate" / "$XX USD hourly" single-value form.
static HOURLY_RATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(\d{1,3}(?:\.\d{1,2})?)\s*(?:USD|CAD)?\s*(?:hourly\s*rate|hourly)").unwrap()
});

fn hourly_rate(text: &CompText) -> Option<SalaryRange> {
    let caps = HOURLY_RATE_RE.captures(text.primary())?;
    let rate = parse_num(&caps[1])?;
    Some(SalaryRange::hourly(rate, rate, "hourly_rate"))
}

// Rescue: any $X-$Y adjacent to a compensation keyword, accepted only when
// both values sit in the plausible hourly band.
static AGGRESSIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:salary|compensation|pay|rate|paid|earning)[^$]*\$(\d{1,3}(?:\.\d{1,2})?)\s*(?:[-–]|to)\s*\$?(\d{1,3}(?:\.\d{1,2})?)",
    )
    .unwrap()
});

fn aggressive(text: &CompText) -> Option<SalaryRange> {
    let caps = AGGRESSIVE_RE.captures(text.primary())?;
    let min = parse_num(&caps[1])?;
    let max = parse_num(&caps[2])?;
    if (10.0..=200.0).contains(&min) && (10.0..=200.0).contains(&max) {
        Some(SalaryRange::hourly(min, max, "aggressive"))
    } else {
        None
    }
}

// "$65,000/year", "$65,000 per annum".
static YEARLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$(\d{1,3}(?:,\d{3})*)(?:(?:\s*-\s*|\s*to\s*)\$(\d{1,3}(?:,\d{3})*))?\s*(?:/|per\s)?\s*(?:year|annum)",
    )
    .unwrap()
});

fn yearly(text: &CompText) -> Option<SalaryRange> {
    let caps = YEARLY_RE.captures(text.primary())?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Yearly),
        to_hourly(max, Period::Yearly),
        "yearly",
    ))
}

// "annual equivalent of $XX,XXX" — may occur several times (e.g. per work
// term); min/max taken across all occurrences.
static ANNUAL_EQUIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)annual\s+equivalent\s+of\s+\$(\d{2,3}(?:,\d{3})*)").unwrap());

fn annual_equiv(text: &CompText) -> Option<SalaryRange> {
    let values: Vec<f64> = ANNUAL_EQUIV_RE
        .captures_iter(text.primary())
        .filter_map(|c| parse_num(&c[1]))
        .collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Yearly),
        to_hourly(max, Period::Yearly),
        "annual_equiv",
    ))
}

// "$1400-1550 per week", "$1,400 / week" (1-4 digits so a leading digit
// before a thousands separator still matches).
static WEEKLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$(\d{1,4}(?:,\d{3})?)(?:(?:\s*[-–]\s*|\s*to\s*)\$?(\d{1,4}(?:,\d{3})?))?\s*(?:/|per\s)\s*week",
    )
    .unwrap()
});

fn weekly(text: &CompText) -> Option<SalaryRange> {
    let caps = WEEKLY_RE.captures(text.primary())?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Weekly),
        to_hourly(max, Period::Weekly),
        "weekly",
    ))
}

// "$5000-6000 per month", "$10,400/month", "$9000 USD/mo", "$8000 monthly".
static MONTHLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$([\d,]+(?:\.\d{2})?)(?:(?:\s*[-–]\s*|\s*to\s*)\$?([\d,]+(?:\.\d{2})?))?(?:\s*(?:USD|CAD))?\s*(?:/\s*(?:month|mo)|per\s*month|monthly)",
    )
    .unwrap()
});

fn monthly(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&MONTHLY_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Monthly),
        to_hourly(max, Period::Monthly),
        "monthly",
    ))
}

// Bare-number variants (no "$"), common in some postings.

// "10,500 USD/month", "5000 CAD per month".
static MONTHLY_BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,3}(?:,\d{3})?|\d{4,6})(?:\s*[-–]\s*(\d{1,3}(?:,\d{3})?|\d{4,6}))?\s*(?:USD|CAD)?\s*(?:/|per\s)\s*month",
    )
    .unwrap()
});

fn monthly_bare(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&MONTHLY_BARE_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Monthly),
        to_hourly(max, Period::Monthly),
        "monthly_bare",
    ))
}

// "25 USD/hour", "30-40 CAD per hour" — the currency token is required here,
// a bare "25/hour" with no anchor is too noisy to accept.
static HOURLY_BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,3}(?:\.\d{1,2})?)(?:\s*[-–]\s*(\d{1,3}(?:\.\d{1,2})?))?\s*(?:USD|CAD)\s*(?:/|per\s)\s*(?:h(?:ou)?r|hourly)",
    )
    .unwrap()
});

fn hourly_bare(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&HOURLY_BARE_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(min, max, "hourly_bare"))
}

// "1500 USD/week".
static WEEKLY_BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{3,4}(?:,\d{3})?)(?:\s*[-–]\s*(\d{3,4}(?:,\d{3})?))?\s*(?:USD|CAD)?\s*(?:/|per\s)\s*week",
    )
    .unwrap()
});

fn weekly_bare(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&WEEKLY_BARE_RE)?;
    let min = parse_num(&caps[1])?;
    let max = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(min);
    Some(SalaryRange::hourly(
        to_hourly(min, Period::Weekly),
        to_hourly(max, Period::Weekly),
        "weekly_bare",
    ))
}

// "Base salary of USD 9,000" (currency before the number, no period stated).
// The magnitude decides the bucket; out-of-bucket values fall through to the
// remaining rules.
static SALARY_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:base\s+)?salary\s+(?:of\s+)?(?:USD|CAD)\s*\$?\s*(\d{1,3}(?:,\d{3})?|\d{4,6})")
        .unwrap()
});

fn salary_of(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&SALARY_OF_RE)?;
    let amount = parse_num(&caps[1])?;
    if (3_000.0..=20_000.0).contains(&amount) {
        let rate = to_hourly(amount, Period::Monthly);
        return Some(SalaryRange::hourly(rate, rate, "salary_of_monthly"));
    }
    if (15.0..=200.0).contains(&amount) {
        return Some(SalaryRange::hourly(amount, amount, "salary_of_hourly"));
    }
    None
}

// Bare "USD X,XXX" / "CAD X,XXX" — only trusted inside an isolated
// compensation section, and only in the typical monthly range.
static CURRENCY_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:USD|CAD)\s*\$?\s*(\d{1,3}(?:,\d{3})?|\d{4,6})(?:\s*[-–]\s*(?:USD|CAD)?\s*\$?\s*(\d{1,3}(?:,\d{3})?|\d{4,6}))?",
    )
    .unwrap()
});

fn currency_first(text: &CompText) -> Option<SalaryRange> {
    if !text.has_section() {
        return None;
    }
    let caps = CURRENCY_FIRST_RE.captures(text.primary())?;
    let a = parse_num(&caps[1])?;
    let b = caps.get(2).and_then(|m| parse_num(m.as_str())).unwrap_or(a);
    let (min, max) = (a.min(b), a.max(b));
    if min >= 3_000.0 && max <= 25_000.0 {
        return Some(SalaryRange::hourly(
            to_hourly(min, Period::Monthly),
            to_hourly(max, Period::Monthly),
            "currency_first",
        ));
    }
    None
}

// Bare "48K-68K" interpreted as annual salary in thousands. The 20..300
// guard keeps unrelated small-number ranges from being read as salaries.
static K_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$?(\d{2,3})k?\s*(?:[-–]|to)\s*\$?(\d{2,3})k").unwrap());

fn k_range(text: &CompText) -> Option<SalaryRange> {
    let caps = text.try_captures(&K_RANGE_RE)?;
    let min_k = parse_num(&caps[1])?;
    let max_k = parse_num(&caps[2])?;
    if min_k >= 20.0 && max_k <= 300.0 {
        return Some(SalaryRange::hourly(
            to_hourly(min_k * 1000.0, Period::Yearly),
            to_hourly(max_k * 1000.0, Period::Yearly),
            "k_range",
        ));
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::section::split;

    fn run(text: &str) -> Option<SalaryRange> {
        extract_salary(&split(text))
    }

    #[test]
    fn hourly_range_with_symbol() {
        let s = run("Rate: $24.20-$30.00/hr depending on experience").unwrap();
        assert_eq!(s.provenance, "hourly");
        assert_eq!(s.min, 24.2);
        assert_eq!(s.max, 30.0);
        assert_eq!(s.avg, 27.1);
    }

    #[test]
    fn hourly_single_value() {
        let s = run("We pay $25 per hour.").unwrap();
        assert_eq!((s.min, s.max, s.avg), (25.0, 25.0, 25.0));
        assert_eq!(s.provenance, "hourly");
    }

    #[test]
    fn monthly_converts_by_173() {
        let s = run("Compensation and Benefits:\n$4000/month\n\nOther").unwrap();
        assert_eq!(s.provenance, "monthly");
        assert_eq!(s.min, 23.12);
        assert_eq!(s.max, 23.12);
    }

    #[test]
    fn term_total_beats_hourly() {
        // Both phrases present; the term-lump-sum rule is earlier and wins.
        let s = run("Total of $30k to $40k for the term, roughly $25/hour.").unwrap();
        assert_eq!(s.provenance, "term_total");
        assert_eq!(s.min, 43.35); // 30000 / 692
        assert_eq!(s.max, 57.8); // 40000 / 692
    }

    #[test]
    fn monthly_prefix_style() {
        let s = run("Monthly range of $3,060 - $4,540 based on year of study").unwrap();
        assert_eq!(s.provenance, "monthly_prefix");
        assert_eq!(s.min, 17.69);
        assert_eq!(s.max, 26.24);
    }

    #[test]
    fn weekly_beats_yearly() {
        let s = run("Negotiable, typically $1,400 / week or $72,800 annualized.").unwrap();
        assert_eq!(s.provenance, "weekly");
        assert_eq!((s.min, s.max, s.avg), (35.0, 35.0, 35.0));
    }

    #[test]
    fn yearly_with_thousands_separator() {
        let s = run("$65,000 - $75,000 per annum").unwrap();
        assert_eq!(s.provenance, "yearly");
        assert_eq!(s.min, 32.5);
        assert_eq!(s.max, 37.5);
    }

    #[test]
    fn annual_equiv_takes_min_max_across_matches() {
        let s = run(
            "First work term: annual equivalent of $52,000. Later terms: annual equivalent of $60,000.",
        )
        .unwrap();
        assert_eq!(s.provenance, "annual_equiv");
        assert_eq!(s.min, 26.0);
        assert_eq!(s.max, 30.0);
    }

    #[test]
    fn aggressive_rescue_within_band() {
        let s = run("The salary for this role is $28 to $34 commensurate").unwrap();
        assert_eq!(s.provenance, "aggressive");
        assert_eq!(s.min, 28.0);
        assert_eq!(s.max, 34.0);
    }

    #[test]
    fn aggressive_rejects_out_of_band() {
        // $300-$400 near a keyword is not a plausible hourly range, and
        // nothing later in the cascade claims it either.
        assert!(run("A monthly transit pay allowance of $300 to $400").is_none());
    }

    #[test]
    fn bare_hourly_needs_currency_token() {
        let s = run("30 - 40 CAD per hour").unwrap();
        assert_eq!(s.provenance, "hourly_bare");
        assert_eq!(s.min, 30.0);
        assert!(run("limited to 30 - 40 per department").is_none());
    }

    #[test]
    fn bare_monthly_with_currency() {
        let s = run("10,500 USD/month for senior students").unwrap();
        assert_eq!(s.provenance, "monthly_bare");
        assert_eq!(s.min, 60.69);
    }

    #[test]
    fn salary_of_buckets_by_magnitude() {
        let s = run("Base salary of USD 9,000").unwrap();
        assert_eq!(s.provenance, "salary_of_monthly");
        assert_eq!(s.min, 52.02);

        let s = run("salary of CAD 32").unwrap();
        assert_eq!(s.provenance, "salary_of_hourly");
        assert_eq!(s.min, 32.0);
    }

    #[test]
    fn currency_first_needs_isolated_section() {
        let text = "Compensation and Benefits:\nCAD 6,500 - CAD 7,500\n\nTravel";
        let s = run(text).unwrap();
        assert_eq!(s.provenance, "currency_first");
        assert_eq!(s.min, 37.57);
        assert_eq!(s.max, 43.35);

        // Same figure without a compensation section is ignored.
        assert!(run("Budget code CAD 6,500 for supplies").is_none());
    }

    #[test]
    fn k_range_annual_in_thousands() {
        let s = run("the range is 48K-68K for Wealth Co-ops.").unwrap();
        assert_eq!(s.provenance, "k_range");
        assert_eq!(s.min, 24.0);
        assert_eq!(s.max, 34.0);
    }

    #[test]
    fn k_range_guard_rejects_small_numbers() {
        assert!(run("teams of 10 to 15k users").is_none());
    }

    #[test]
    fn out_of_band_match_is_discarded_not_stored() {
        // A rule fires on both of these, but the normalized minimum is far
        // outside the plausible hourly band, so nothing is stored.
        assert!(run("We pay $500 per hour.").is_none());
        // $100,000/month normalizes to 578.03/hour.
        assert!(run("Compensation and Benefits:\n$100,000/month\n\nEnd").is_none());
    }

    #[test]
    fn no_salary_is_none_not_error() {
        assert!(run("Competitive compensation, to be discussed.").is_none());
        assert!(run("").is_none());
    }

    #[test]
    fn range_found_outside_section_via_retry() {
        // Cascade rules with full-text retry still catch a range stated
        // before the compensation heading.
        let text = "Pays $22/hour.\nCompensation and Benefits:\nSee above\n\nEnd";
        let s = run(text).unwrap();
        assert_eq!(s.provenance, "hourly");
        assert_eq!(s.min, 22.0);
    }
}
