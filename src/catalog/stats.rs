//! Category breakdowns shown next to search results and favorite lists.
use serde::Serialize;

use super::partition::{zone_label, zone_of};
use super::{AuthorityLevel, Journal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub total: usize,
    pub partitions: Vec<Bucket>,
    pub authority: Vec<Bucket>,
    pub open_access: Vec<Bucket>,
}

impl CategoryStats {
    /// Empty buckets are omitted.
    pub fn compute<'a, I>(journals: I) -> Self
    where
        I: IntoIterator<Item = &'a Journal>,
    {
        let mut total = 0;
        let mut zones = [0usize; 4];
        let mut levels = [0usize; 3];
        let mut open = [0usize; 2];

        for j in journals {
            total += 1;
            if let Some(zone) = zone_of(&j.major_category_partition) {
                zones[usize::from(zone - 1)] += 1;
            }
            match j.authority {
                AuthorityLevel::Level1 => levels[0] += 1,
                AuthorityLevel::Level2 => levels[1] += 1,
                AuthorityLevel::Level3 => levels[2] += 1,
                AuthorityLevel::None => {}
            }
            if j.open_access {
                open[0] += 1;
            } else {
                open[1] += 1;
            }
        }

        let partitions = (1u8..=4)
            .zip(zones)
            .filter_map(|(zone, count)| {
                zone_label(zone).map(|name| Bucket { name, count })
            })
            .filter(|b| b.count > 0)
            .collect();
        let authority = [
            AuthorityLevel::Level1,
            AuthorityLevel::Level2,
            AuthorityLevel::Level3,
        ]
        .into_iter()
        .zip(levels)
        .filter_map(|(level, count)| level.label().map(|name| Bucket { name, count }))
        .filter(|b| b.count > 0)
        .collect();
        let open_access = ["Open Access", "Closed Access"]
            .into_iter()
            .zip(open)
            .map(|(name, count)| Bucket { name, count })
            .filter(|b| b.count > 0)
            .collect();

        Self {
            total,
            partitions,
            authority,
            open_access,
        }
    }
}

/// Percentage of `total`, 0 when the total is 0.
pub fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}
