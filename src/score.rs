//! Three-low scoring.
//!
//! A bond's score is `price + premium + scale * 10`: lower is better on all
//! three axes. Bonds that fail any disqualification rule get the sentinel
//! score [`SENTINEL`] instead and sink to the bottom of an ascending sort.

use crate::columns::FieldIndexMap;
use regex::Regex;
use std::fmt;

/// Score value marking a disqualified bond.
pub const SENTINEL: f64 = 9999.0;

/// Marker for a remaining term rendered in days (under one year).
const DAYS_MARKER: &str = "天";

/// Redemption status phrases that disqualify outright: final trading days,
/// redemption announced, redemption condition met.
const REDEEM_BLOCKERS: [&str; 3] = ["最后交易", "已公告强赎", "已满足强赎条件"];

lazy_static::lazy_static! {
    // Leading numeric prefix, the way a lenient float parse reads "3.2亿" or "35.5%".
    static ref NUMERIC_PREFIX: Regex = Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap();
    // "at least N more days" until the redemption condition is met
    static ref REDEEM_COUNTDOWN: Regex = Regex::new(r"至少还需(\d+)天").unwrap();
}

/// Tunable thresholds for scoring and disqualification.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreConfig {
    /// Bonds priced above this are disqualified (user-adjustable)
    pub price_threshold: f64,
    /// Underlying stock price floor
    pub min_stock_price: f64,
    /// Underlying price-to-book floor
    pub min_book_ratio: f64,
    /// Remaining term floor, in years
    pub min_remaining_years: f64,
    /// Redemption countdowns at or below this many days disqualify
    pub redeem_countdown_days: u32,
    /// Multiplier applied to outstanding scale
    pub scale_weight: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            price_threshold: 150.0,
            min_stock_price: 2.0,
            min_book_ratio: 1.0,
            min_remaining_years: 1.5,
            redeem_countdown_days: 8,
            scale_weight: 10.0,
        }
    }
}

impl ScoreConfig {
    /// Set the price threshold
    pub fn with_price_threshold(mut self, threshold: f64) -> Self {
        self.price_threshold = threshold;
        self
    }

    /// Set the remaining-term floor in years
    pub fn with_min_remaining_years(mut self, years: f64) -> Self {
        self.min_remaining_years = years;
        self
    }

    /// Set the redemption countdown cutoff in days
    pub fn with_redeem_countdown_days(mut self, days: u32) -> Self {
        self.redeem_countdown_days = days;
        self
    }
}

/// Why a bond was excluded from ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum Disqualification {
    PriceAboveThreshold { price: f64, threshold: f64 },
    StockPriceTooLow(f64),
    BookRatioTooLow(f64),
    TermInDays(String),
    TermTooShort(f64),
    RedemptionBlocked(&'static str),
    RedemptionImminent(u32),
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::PriceAboveThreshold { price, threshold } => {
                write!(f, "price {} above threshold {}", price, threshold)
            }
            Disqualification::StockPriceTooLow(p) => write!(f, "stock price {} too low", p),
            Disqualification::BookRatioTooLow(pb) => write!(f, "book ratio {} too low", pb),
            Disqualification::TermInDays(raw) => write!(f, "remaining term '{}' under a year", raw),
            Disqualification::TermTooShort(years) => {
                write!(f, "remaining term {} years too short", years)
            }
            Disqualification::RedemptionBlocked(phrase) => write!(f, "redemption status '{}'", phrase),
            Disqualification::RedemptionImminent(days) => {
                write!(f, "redemption condition met in {} days", days)
            }
        }
    }
}

/// A computed three-low score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Finite score, unrounded; rendered with two decimals
    Value(f64),
    /// Excluded from ranking
    Disqualified,
}

impl Score {
    /// Numeric key for sorting: the displayed two-decimal value, with
    /// disqualified bonds sorting as [`SENTINEL`].
    pub fn sort_key(&self) -> f64 {
        match self {
            Score::Value(v) => to_fixed2(*v).parse().unwrap_or(SENTINEL),
            Score::Disqualified => SENTINEL,
        }
    }

    pub fn is_disqualified(&self) -> bool {
        matches!(self, Score::Disqualified)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Value(v) => f.write_str(&to_fixed2(*v)),
            Score::Disqualified => write!(f, "{}", SENTINEL as u32),
        }
    }
}

/// Render `v` with two decimals, rounding exact ties away from zero.
///
/// `{:.2}` rounds the exact binary value, so only true ties (odd multiples
/// of 1/8 at this precision) need adjusting from half-to-even.
pub fn to_fixed2(v: f64) -> String {
    let eighths = v * 8.0;
    let tie = eighths.fract() == 0.0 && eighths.abs() % 2.0 == 1.0;
    if !tie {
        return format!("{:.2}", v);
    }
    let cents = (v.abs() * 100.0).ceil() as u64;
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

/// Parse the leading decimal of `text`, ignoring any unit suffix.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let m = NUMERIC_PREFIX.find(text.trim())?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Field values pulled from one row, with fallbacks applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BondFields {
    pub price: f64,
    pub stock_price: f64,
    pub book_ratio: f64,
    pub remaining_term_raw: String,
    pub remaining_term: f64,
    pub redeem_status: String,
    pub premium: f64,
    pub scale: f64,
}

impl BondFields {
    /// Read the scored fields out of `row` using `fields` for positions.
    ///
    /// Missing or unparsable cells fall back to defaults that lean toward
    /// disqualification (stock price, book ratio, term) or neutrality.
    pub fn extract<S: AsRef<str>>(row: &[S], fields: &FieldIndexMap) -> Self {
        let cell = |idx: usize| row.get(idx).map(|s| s.as_ref().trim()).unwrap_or("");
        let decimal_or = |idx: usize, fallback: f64| parse_decimal(cell(idx)).unwrap_or(fallback);

        let remaining_term_raw = cell(fields.remaining_term).to_string();
        // A term of exactly 0 counts as unparsable, same as a blank cell.
        let remaining_term = parse_decimal(&remaining_term_raw)
            .filter(|years| *years != 0.0)
            .unwrap_or(999.0);

        Self {
            price: decimal_or(fields.price, 0.0),
            stock_price: decimal_or(fields.stock_price, 999.0),
            book_ratio: decimal_or(fields.book_ratio, 999.0),
            remaining_term_raw,
            remaining_term,
            redeem_status: cell(fields.redeem_status).to_string(),
            premium: parse_decimal(cell(fields.premium).trim_end_matches('%')).unwrap_or(0.0),
            scale: decimal_or(fields.scale, 0.0),
        }
    }

    /// First disqualification rule these values trip, if any.
    pub fn disqualification(&self, config: &ScoreConfig) -> Option<Disqualification> {
        if self.price > config.price_threshold {
            return Some(Disqualification::PriceAboveThreshold {
                price: self.price,
                threshold: config.price_threshold,
            });
        }
        if self.stock_price < config.min_stock_price {
            return Some(Disqualification::StockPriceTooLow(self.stock_price));
        }
        if self.book_ratio < config.min_book_ratio {
            return Some(Disqualification::BookRatioTooLow(self.book_ratio));
        }
        if self.remaining_term_raw.contains(DAYS_MARKER) {
            return Some(Disqualification::TermInDays(self.remaining_term_raw.clone()));
        }
        if self.remaining_term < config.min_remaining_years {
            return Some(Disqualification::TermTooShort(self.remaining_term));
        }
        if let Some(phrase) = REDEEM_BLOCKERS
            .iter()
            .copied()
            .find(|phrase| self.redeem_status.contains(*phrase))
        {
            return Some(Disqualification::RedemptionBlocked(phrase));
        }
        if let Some(days) = REDEEM_COUNTDOWN
            .captures(&self.redeem_status)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        {
            if days <= config.redeem_countdown_days {
                return Some(Disqualification::RedemptionImminent(days));
            }
        }
        None
    }

    /// Unrounded three-low sum.
    pub fn raw_score(&self, config: &ScoreConfig) -> f64 {
        self.price + self.premium + self.scale * config.scale_weight
    }
}

/// Score a row and report the rule that disqualified it, if one did.
pub fn evaluate<S: AsRef<str>>(
    row: &[S],
    fields: &FieldIndexMap,
    config: &ScoreConfig,
) -> (Score, Option<Disqualification>) {
    let bond = BondFields::extract(row, fields);
    match bond.disqualification(config) {
        Some(reason) => (Score::Disqualified, Some(reason)),
        None => (Score::Value(bond.raw_score(config)), None),
    }
}

/// Score a row. Never fails: malformed cells use their fallbacks.
pub fn calculate_score<S: AsRef<str>>(
    row: &[S],
    fields: &FieldIndexMap,
    config: &ScoreConfig,
) -> Score {
    evaluate(row, fields, config).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> FieldIndexMap {
        FieldIndexMap {
            price: 0,
            stock_price: 1,
            book_ratio: 2,
            premium: 3,
            redeem_status: 4,
            remaining_term: 5,
            scale: 6,
        }
    }

    fn row(price: &str, premium: &str, scale: &str) -> Vec<String> {
        [price, "10.50", "1.80", premium, "", "3.210", scale]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn with(mut row: Vec<String>, idx: usize, value: &str) -> Vec<String> {
        row[idx] = value.to_string();
        row
    }

    #[test]
    fn test_three_low_formula() {
        let score = calculate_score(&row("120", "35.5%", "3.2"), &fields(), &ScoreConfig::default());
        assert_eq!(score, Score::Value(187.5));
        assert_eq!(score.to_string(), "187.50");
    }

    #[test]
    fn test_rounding_to_two_places() {
        let score = calculate_score(&row("101.236", "1.111%", "0.1"), &fields(), &ScoreConfig::default());
        assert_eq!(score.to_string(), "103.35");
    }

    #[test]
    fn test_two_decimal_boundaries() {
        let config = ScoreConfig::default();
        // 100.005 is stored just below the halfway point
        let below = calculate_score(&row("100.005", "0%", "0"), &fields(), &config);
        assert_eq!(below.to_string(), "100.00");
        // 100.125 is an exact tie and rounds up
        let tie = calculate_score(&row("100.125", "0%", "0"), &fields(), &config);
        assert_eq!(tie.to_string(), "100.13");
        assert_eq!(tie.sort_key(), 100.13);

        assert_eq!(to_fixed2(100.035), "100.03");
        assert_eq!(to_fixed2(0.375), "0.38");
        assert_eq!(to_fixed2(-0.125), "-0.13");
        assert_eq!(to_fixed2(2.5), "2.50");
    }

    #[test]
    fn test_countdown_and_term_thresholds_independent() {
        let countdown_9 = with(row("100", "5%", "0.5"), 4, "至少还需9天");
        let term_1_6 = with(row("100", "5%", "0.5"), 5, "1.6");
        let term_1_8 = with(row("100", "5%", "0.5"), 5, "1.8");

        let longer_countdown = ScoreConfig::default().with_redeem_countdown_days(10);
        assert_eq!(
            calculate_score(&countdown_9, &fields(), &longer_countdown),
            Score::Disqualified
        );
        assert_eq!(
            calculate_score(&term_1_6, &fields(), &longer_countdown),
            Score::Value(110.0)
        );

        let longer_term = ScoreConfig::default().with_min_remaining_years(2.0);
        assert_eq!(
            calculate_score(&term_1_8, &fields(), &longer_term),
            Score::Disqualified
        );
        assert_eq!(
            calculate_score(&countdown_9, &fields(), &longer_term),
            Score::Value(110.0)
        );
    }

    #[test]
    fn test_zero_term_uses_fallback() {
        let zero = with(row("100", "5%", "0.5"), 5, "0");
        let bond = BondFields::extract(&zero, &fields());
        assert_eq!(bond.remaining_term, 999.0);
        assert_eq!(
            calculate_score(&zero, &fields(), &ScoreConfig::default()),
            Score::Value(110.0)
        );
    }

    #[test]
    fn test_deterministic() {
        let r = row("118.8", "22.1%", "1.9");
        let config = ScoreConfig::default();
        assert_eq!(
            calculate_score(&r, &fields(), &config),
            calculate_score(&r, &fields(), &config)
        );
    }

    #[test]
    fn test_price_threshold() {
        let r = row("160", "10%", "1");
        assert_eq!(
            calculate_score(&r, &fields(), &ScoreConfig::default()),
            Score::Disqualified
        );
        let relaxed = ScoreConfig::default().with_price_threshold(9999.0);
        assert_eq!(calculate_score(&r, &fields(), &relaxed), Score::Value(180.0));
    }

    #[test]
    fn test_price_at_threshold_is_kept() {
        let r = row("150", "0%", "0");
        assert_eq!(
            calculate_score(&r, &fields(), &ScoreConfig::default()),
            Score::Value(150.0)
        );
    }

    #[test]
    fn test_disqualifiers_override_other_fields() {
        let config = ScoreConfig::default();
        let base = row("100", "5%", "0.5");
        let cases = vec![
            with(base.clone(), 1, "1.99"),
            with(base.clone(), 2, "0.85"),
            with(base.clone(), 5, "1.2"),
            with(base.clone(), 5, "203天"),
            with(base.clone(), 4, "已公告强赎"),
            with(base.clone(), 4, "最后交易日：2026-11-02"),
            with(base.clone(), 4, "已满足强赎条件"),
        ];
        for case in cases {
            assert_eq!(calculate_score(&case, &fields(), &config), Score::Disqualified, "{:?}", case);
        }
    }

    #[test]
    fn test_redemption_countdown() {
        let config = ScoreConfig::default();
        let soon = with(row("100", "5%", "0.5"), 4, "至少还需5天");
        let (score, reason) = evaluate(&soon, &fields(), &config);
        assert_eq!(score, Score::Disqualified);
        assert_eq!(reason, Some(Disqualification::RedemptionImminent(5)));

        let edge = with(row("100", "5%", "0.5"), 4, "至少还需8天");
        assert!(calculate_score(&edge, &fields(), &config).is_disqualified());

        let later = with(row("100", "5%", "0.5"), 4, "至少还需9天");
        assert_eq!(calculate_score(&later, &fields(), &config), Score::Value(110.0));
    }

    #[test]
    fn test_rule_order_short_circuits() {
        let r = with(with(row("200", "5%", "0.5"), 1, "1.0"), 4, "已公告强赎");
        let (_, reason) = evaluate(&r, &fields(), &ScoreConfig::default());
        assert!(matches!(
            reason,
            Some(Disqualification::PriceAboveThreshold { .. })
        ));
    }

    #[test]
    fn test_fallbacks() {
        // Missing stock price, book ratio and term fall back to 999 and pass.
        let short: Vec<&str> = vec!["101", "", "-", "12%"];
        let score = calculate_score(&short, &fields(), &ScoreConfig::default());
        assert_eq!(score, Score::Value(113.0));

        // Unparsable price, premium and scale fall back to 0.
        let junk = with(with(row("--", "n/a", "?"), 5, "2.5"), 4, "");
        assert_eq!(
            calculate_score(&junk, &fields(), &ScoreConfig::default()),
            Score::Value(0.0)
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 3.2亿 "), Some(3.2));
        assert_eq!(parse_decimal("35.5%"), Some(35.5));
        assert_eq!(parse_decimal("-4.1"), Some(-4.1));
        assert_eq!(parse_decimal(".5"), Some(0.5));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Score::Disqualified.to_string(), "9999");
        assert_eq!(Score::Disqualified.sort_key(), SENTINEL);
        assert_eq!(Score::Value(99.0).to_string(), "99.00");
    }
}
