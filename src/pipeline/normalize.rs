/// Pay periods a posting (or the fallback model) can quote a figure in,
/// with the fixed hour counts used to bring everything down to hourly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// A co-op work term, assumed to be 4 months.
    Term,
}

impl Period {
    pub fn hours(self) -> f64 {
        match self {
            Period::Hourly => 1.0,
            Period::Daily => 8.0,
            Period::Weekly => 40.0,
            Period::Monthly => 173.0, // 40h * 52wk / 12mo
            Period::Yearly => 2000.0, // 40h * 50wk
            Period::Term => 4.0 * 173.0,
        }
    }

    pub fn parse(s: &str) -> Option<Period> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Some(Period::Hourly),
            "daily" => Some(Period::Daily),
            "weekly" => Some(Period::Weekly),
            "monthly" => Some(Period::Monthly),
            "yearly" | "annually" => Some(Period::Yearly),
            "term" => Some(Period::Term),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
            Period::Term => "term",
        }
    }
}

pub fn to_hourly(amount: f64, period: Period) -> f64 {
    amount / period.hours()
}

/// Guess the period of an unlabeled amount by magnitude. The thresholds are
/// strict bounds; an amount of exactly 2000 guesses Weekly.
pub fn guess_period(amount: f64) -> Period {
    if amount > 10_000.0 {
        Period::Yearly
    } else if amount > 2_000.0 {
        Period::Monthly
    } else if amount > 500.0 {
        Period::Weekly
    } else {
        Period::Hourly
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Plausible hourly band. A normalized minimum outside it is a misread
/// magnitude and the range is discarded rather than stored. Callers check
/// the 2-decimal-rounded value so boundary amounts land inclusively.
pub fn plausible_hourly(min: f64) -> bool {
    (5.0..=200.0).contains(&min)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_round_trip() {
        assert_eq!(round2(to_hourly(4000.0, Period::Monthly)), 23.12);
    }

    #[test]
    fn term_is_four_months() {
        assert_eq!(Period::Term.hours(), 692.0);
        assert_eq!(round2(to_hourly(30_000.0, Period::Term)), 43.35);
    }

    #[test]
    fn parse_accepts_annually() {
        assert_eq!(Period::parse("Annually"), Some(Period::Yearly));
        assert_eq!(Period::parse("fortnightly"), None);
    }

    #[test]
    fn band_is_inclusive_at_both_ends() {
        assert!(plausible_hourly(5.0));
        assert!(plausible_hourly(200.0));
        assert!(!plausible_hourly(4.99));
        assert!(!plausible_hourly(200.01));
    }

    #[test]
    fn magnitude_guess_boundaries() {
        assert_eq!(guess_period(72_800.0), Period::Yearly);
        assert_eq!(guess_period(4_000.0), Period::Monthly);
        assert_eq!(guess_period(800.0), Period::Weekly);
        assert_eq!(guess_period(25.0), Period::Hourly);
        // Strict bounds: exact threshold values fall into the smaller bucket.
        assert_eq!(guess_period(2_000.0), Period::Weekly);
        assert_eq!(guess_period(500.0), Period::Hourly);
    }
}
