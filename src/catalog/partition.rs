//! CAS partition strings such as `1 [12/345]`: a zone (quartile) followed by
//! the journal's rank within its category and the category size.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*\[(\d+)/(\d+)\]").expect("valid partition regex")
});
static RANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)/").expect("valid rank regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    /// Zone 1..=4; `None` when the string does not start with a zone digit.
    pub zone: Option<u8>,
    pub rank: Option<u32>,
    pub of: Option<u32>,
    pub raw: String,
}

impl Partition {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let zone = zone_of(raw);
        let (rank, of) = match FULL.captures(raw) {
            Some(caps) => (
                caps.get(2).and_then(|m| m.as_str().parse().ok()),
                caps.get(3).and_then(|m| m.as_str().parse().ok()),
            ),
            None => (rank_of(raw), None),
        };
        Self {
            zone,
            rank,
            of,
            raw: raw.to_string(),
        }
    }

    pub fn zone_label(&self) -> Option<&'static str> {
        self.zone.and_then(zone_label)
    }
}

/// Zone from the leading character, only 1..=4 count.
pub fn zone_of(raw: &str) -> Option<u8> {
    raw.trim()
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| (1..=4).contains(d))
}

/// Rank within the category, the number before the first `/`.
pub fn rank_of(raw: &str) -> Option<u32> {
    RANK.captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn zone_label(zone: u8) -> Option<&'static str> {
    match zone {
        1 => Some("一区"),
        2 => Some("二区"),
        3 => Some("三区"),
        4 => Some("四区"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_form() {
        let p = Partition::parse("1 [12/345]");
        assert_eq!(p.zone, Some(1));
        assert_eq!(p.rank, Some(12));
        assert_eq!(p.of, Some(345));
        assert_eq!(p.zone_label(), Some("一区"));
    }

    #[test]
    fn tolerates_missing_brackets() {
        let p = Partition::parse("3 7/80");
        assert_eq!(p.zone, Some(3));
        assert_eq!(p.rank, Some(7));
        assert_eq!(p.of, None);
    }

    #[test]
    fn unknown_strings_keep_raw() {
        let p = Partition::parse("n/a");
        assert_eq!(p.zone, None);
        assert_eq!(p.rank, None);
        assert_eq!(p.raw, "n/a");
        assert_eq!(zone_of("9 [1/2]"), None);
    }
}
