//! Journal catalog: CSV extract parsed into immutable [`Journal`] records.
//!
//! Parsing never fails on row content. Rows without a journal name are
//! dropped, rows the CSV reader rejects are skipped, and unparseable numeric
//! fields fall back to defaults. Only I/O on the source file is an error.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::model::{IdError, JournalId};

pub mod partition;
pub mod stats;

/// Searches shorter than this return nothing.
pub const MIN_SEARCH_LEN: usize = 3;
/// Cap on `find_journals` results.
pub const FIND_LIMIT: usize = 10;
pub const MAX_MINOR_CATEGORIES: usize = 6;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog has no readable header row: {0}")]
    Header(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImpactFactor {
    Value(f64),
    /// Sentinels like `<0.1` are kept verbatim.
    Raw(String),
}

impl ImpactFactor {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => ImpactFactor::Value(v),
            _ if raw.is_empty() => ImpactFactor::Value(0.0),
            _ => ImpactFactor::Raw(raw.to_string()),
        }
    }

    /// Numeric value for ordering; sentinels sort as zero.
    pub fn sort_value(&self) -> f64 {
        match self {
            ImpactFactor::Value(v) => *v,
            ImpactFactor::Raw(_) => 0.0,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ImpactFactor::Value(v) => format!("{:.1}", v),
            ImpactFactor::Raw(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthorityLevel {
    None,
    Level1,
    Level2,
    Level3,
}

impl AuthorityLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "一级" | "level-1" | "1" => AuthorityLevel::Level1,
            "二级" | "level-2" | "2" => AuthorityLevel::Level2,
            "三级" | "level-3" | "3" => AuthorityLevel::Level3,
            _ => AuthorityLevel::None,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            AuthorityLevel::None => None,
            AuthorityLevel::Level1 => Some("一级"),
            AuthorityLevel::Level2 => Some("二级"),
            AuthorityLevel::Level3 => Some("三级"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinorCategory {
    pub name: String,
    pub partition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub name: String,
    pub year: i32,
    pub issn: String,
    pub review: bool,
    pub oaj: bool,
    pub open_access: bool,
    pub web_of_science: String,
    pub impact_factor: ImpactFactor,
    pub annotation: String,
    pub major_category: String,
    pub major_category_partition: String,
    pub top: bool,
    pub authority: AuthorityLevel,
    pub minor_categories: Vec<MinorCategory>,
}

impl Journal {
    pub fn journal_id(&self) -> Result<JournalId, IdError> {
        JournalId::normalize(&self.issn)
    }

    pub fn issn_codes(&self) -> impl Iterator<Item = &str> {
        self.issn.split('/').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn partition_rank(&self) -> Option<u32> {
        partition::rank_of(&self.major_category_partition)
    }
}

fn yes(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "是" | "yes" | "y" | "true"
    )
}

/// Fixed column names. The first name listed is the browser export's, the
/// rest are accepted aliases from the server-side extract.
mod columns {
    pub const NAME: &[&str] = &["Journal name", "Journal"];
    pub const YEAR: &[&str] = &["Year", "年份"];
    pub const ISSN: &[&str] = &["ISSN/EISSN"];
    pub const REVIEW: &[&str] = &["Review"];
    pub const OAJ: &[&str] = &["OAJ", "OA Journal Index（OAJ）"];
    pub const OPEN_ACCESS: &[&str] = &["Open Access"];
    pub const WEB_OF_SCIENCE: &[&str] = &["Web of Science"];
    pub const IMPACT_FACTOR: &[&str] = &["Impact Factor", "影响因子"];
    pub const ANNOTATION: &[&str] = &["Annotation", "标注"];
    pub const MAJOR_CATEGORY: &[&str] = &["大类"];
    pub const MAJOR_PARTITION: &[&str] = &["大类分区"];
    pub const TOP: &[&str] = &["Top"];
    pub const AUTHORITY: &[&str] = &["权威期刊"];

    pub fn minor_name(i: usize) -> [String; 2] {
        [format!("小类{}名称", i), format!("小类{}", i)]
    }

    pub fn minor_partition(i: usize) -> String {
        format!("小类{}分区", i)
    }
}

/// Header name → column index for one CSV file.
#[derive(Debug, Default)]
pub struct HeaderMap {
    index: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn find<S: AsRef<str>>(&self, names: &[S]) -> Option<usize> {
        names
            .iter()
            .find_map(|n| self.index.get(n.as_ref()).copied())
    }

    /// Column names this file provides for each journal field, for diagnostics.
    pub fn resolved(&self) -> Vec<(&'static str, Option<usize>)> {
        vec![
            ("name", self.find(columns::NAME)),
            ("year", self.find(columns::YEAR)),
            ("issn", self.find(columns::ISSN)),
            ("impact_factor", self.find(columns::IMPACT_FACTOR)),
            ("major_category", self.find(columns::MAJOR_CATEGORY)),
            ("major_category_partition", self.find(columns::MAJOR_PARTITION)),
            ("authority", self.find(columns::AUTHORITY)),
        ]
    }

    fn parse_row(&self, row: &csv::StringRecord) -> Option<Journal> {
        let get = |names: &[&str]| -> String {
            self.find(names)
                .and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let name = get(columns::NAME);
        if name.is_empty() {
            return None;
        }

        let mut minor_categories = Vec::new();
        for i in 1..=MAX_MINOR_CATEGORIES {
            let cat_name = self
                .find(&columns::minor_name(i))
                .and_then(|idx| row.get(idx))
                .map(str::trim)
                .unwrap_or_default();
            let cat_partition = self
                .find(&[columns::minor_partition(i)])
                .and_then(|idx| row.get(idx))
                .map(str::trim)
                .unwrap_or_default();
            if !cat_name.is_empty() && !cat_partition.is_empty() {
                minor_categories.push(MinorCategory {
                    name: cat_name.to_string(),
                    partition: cat_partition.to_string(),
                });
            }
        }

        Some(Journal {
            name,
            year: get(columns::YEAR).parse().unwrap_or(0),
            issn: get(columns::ISSN),
            review: yes(&get(columns::REVIEW)),
            oaj: yes(&get(columns::OAJ)),
            open_access: yes(&get(columns::OPEN_ACCESS)),
            web_of_science: get(columns::WEB_OF_SCIENCE),
            impact_factor: ImpactFactor::parse(&get(columns::IMPACT_FACTOR)),
            annotation: get(columns::ANNOTATION),
            major_category: get(columns::MAJOR_CATEGORY),
            major_category_partition: get(columns::MAJOR_PARTITION),
            top: yes(&get(columns::TOP)),
            authority: AuthorityLevel::parse(&get(columns::AUTHORITY)),
            minor_categories,
        })
    }
}

/// Immutable, in-memory journal catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    journals: Vec<Journal>,
}

impl Catalog {
    pub fn new(journals: Vec<Journal>) -> Self {
        Self { journals }
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_reader(BufReader::new(file))?;
        info!(journals = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_csv_str(text: &str) -> Result<Self, CatalogError> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = HeaderMap::new(reader.headers()?);

        let mut journals = Vec::new();
        let mut skipped = 0usize;
        for (line, result) in reader.records().enumerate() {
            match result {
                Ok(row) => match headers.parse_row(&row) {
                    Some(journal) => journals.push(journal),
                    None => skipped += 1,
                },
                Err(err) => {
                    debug!(line = line + 2, %err, "skipping malformed catalog row");
                    skipped += 1;
                }
            }
        }
        debug!(kept = journals.len(), skipped, "catalog parsed");
        Ok(Self { journals })
    }

    pub fn len(&self) -> usize {
        self.journals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journals.is_empty()
    }

    pub fn journals(&self) -> &[Journal] {
        &self.journals
    }

    pub fn by_name(&self, name: &str) -> Option<&Journal> {
        let name = name.trim();
        self.journals
            .iter()
            .find(|j| j.name.eq_ignore_ascii_case(name))
    }

    /// Matches any of the slash-separated codes.
    pub fn by_issn(&self, issn: &str) -> Option<&Journal> {
        let issn = issn.trim();
        if issn.is_empty() {
            return None;
        }
        self.journals
            .iter()
            .find(|j| j.issn_codes().any(|code| code.eq_ignore_ascii_case(issn)))
    }

    pub fn by_journal_id(&self, id: &JournalId) -> Option<&Journal> {
        self.journals
            .iter()
            .find(|j| j.journal_id().map(|jid| &jid == id).unwrap_or(false))
    }

    /// Name first, then ISSN.
    pub fn find(&self, name_or_issn: &str) -> Option<&Journal> {
        self.by_name(name_or_issn)
            .or_else(|| self.by_issn(name_or_issn))
    }

    /// Case-insensitive name search ordered by impact factor, highest first.
    pub fn search(&self, term: &str) -> Vec<&Journal> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let needle = term.to_lowercase();
        let mut hits: Vec<&Journal> = self
            .journals
            .iter()
            .filter(|j| j.name.to_lowercase().contains(&needle))
            .collect();
        sort_by_impact(&mut hits);
        hits
    }

    /// Topic lookup over name, major and minor categories, capped at [`FIND_LIMIT`].
    pub fn find_journals(&self, query: &str) -> Vec<&Journal> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.journals
            .iter()
            .filter(|j| {
                j.name.to_lowercase().contains(&needle)
                    || j.major_category.to_lowercase().contains(&needle)
                    || j
                        .minor_categories
                        .iter()
                        .any(|c| c.name.to_lowercase().contains(&needle))
            })
            .take(FIND_LIMIT)
            .collect()
    }

    /// Journals of one major category ordered by partition rank; unranked last.
    pub fn in_category(&self, category: &str) -> Vec<&Journal> {
        let mut hits: Vec<&Journal> = self
            .journals
            .iter()
            .filter(|j| j.major_category == category)
            .collect();
        hits.sort_by_key(|j| j.partition_rank().unwrap_or(u32::MAX));
        hits
    }

    /// Major categories with journal counts, most populated first.
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for j in &self.journals {
            if !j.major_category.is_empty() {
                *counts.entry(j.major_category.as_str()).or_default() += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

pub fn sort_by_impact(journals: &mut [&Journal]) {
    journals.sort_by(|a, b| {
        b.impact_factor
            .sort_value()
            .total_cmp(&a.impact_factor.sort_value())
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = "\
Journal name,Year,ISSN/EISSN,Review,OAJ,Open Access,Web of Science,Impact Factor,Annotation,大类,大类分区,Top,权威期刊,小类1名称,小类1分区,小类2名称,小类2分区
Nature Reviews Chemistry,2025,2397-3358/2397-3358,否,否,否,SCIE,51.7,,化学,1 [3/250],是,一级,化学综合,1 [2/180],,
Chemical Letters,2025,0366-7022/1348-0715,是,否,否,SCIE,<0.1,,化学,4 [240/250],否,,化学综合,4 [170/180],有机化学,4 [60/70]
Open Chemistry Journal,2025,1874-8422,否,是,是,ESCI,1.2,,化学,3 [150/250],否,三级,,,,
,2025,0000-0000,否,否,否,,3.0,,化学,2 [50/250],否,,,,,
Materials Today,2025,1369-7021/1873-4103,否,否,否,SCIE,not-a-number-but-long,,材料科学,1 [1/400],是,一级,材料综合,1 [1/300],,
Applied Chem Notes,2025,1111-2222,否,否,否,SCIE,,,化学,unranked,否,二级,,,,
";

    pub(crate) fn sample() -> Catalog {
        Catalog::from_csv_str(SAMPLE).unwrap()
    }

    #[test]
    fn drops_rows_without_name() {
        let c = sample();
        assert_eq!(c.len(), 5);
        assert!(c.by_issn("0000-0000").is_none());
    }

    #[test]
    fn parses_fields_and_defaults() {
        let c = sample();
        let nrc = c.by_name("nature reviews chemistry").unwrap();
        assert_eq!(nrc.year, 2025);
        assert_eq!(nrc.impact_factor, ImpactFactor::Value(51.7));
        assert_eq!(nrc.authority, AuthorityLevel::Level1);
        assert!(nrc.top);
        assert!(!nrc.open_access);
        assert_eq!(nrc.minor_categories.len(), 1);

        let cl = c.by_name("Chemical Letters").unwrap();
        assert_eq!(cl.impact_factor, ImpactFactor::Raw("<0.1".into()));
        assert!(cl.review);
        assert_eq!(cl.authority, AuthorityLevel::None);
        assert_eq!(cl.minor_categories.len(), 2);

        let notes = c.by_name("Applied Chem Notes").unwrap();
        assert_eq!(notes.impact_factor, ImpactFactor::Value(0.0));
    }

    #[test]
    fn accepts_server_column_names() {
        let csv = "Journal,年份,ISSN/EISSN,影响因子,大类,大类分区,小类1,小类1分区,OA Journal Index（OAJ）\n\
                   Alpha,2024,1234-5678,2.5,数学,2 [10/100],应用数学,2 [5/50],是\n";
        let c = Catalog::from_csv_str(csv).unwrap();
        let j = c.by_name("Alpha").unwrap();
        assert_eq!(j.year, 2024);
        assert_eq!(j.impact_factor, ImpactFactor::Value(2.5));
        assert!(j.oaj);
        assert_eq!(j.minor_categories[0].name, "应用数学");
    }

    #[test]
    fn short_rows_are_defaulted_not_fatal() {
        let csv = "Journal name,Year,ISSN/EISSN\nBeta,notayear\nGamma,2020,1111-1111\n";
        let c = Catalog::from_csv_str(csv).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.by_name("Beta").unwrap().year, 0);
        assert_eq!(c.by_name("Beta").unwrap().issn, "");
    }

    #[test]
    fn lookup_by_any_issn_code() {
        let c = sample();
        assert_eq!(c.by_issn("1348-0715").unwrap().name, "Chemical Letters");
        assert_eq!(c.find("0366-7022").unwrap().name, "Chemical Letters");
        let id = JournalId::normalize("1369-7021/1873-4103").unwrap();
        assert_eq!(c.by_journal_id(&id).unwrap().name, "Materials Today");
    }

    #[test]
    fn search_requires_three_chars_and_sorts_by_impact() {
        let c = sample();
        assert!(c.search("ch").is_empty());
        let names: Vec<_> = c.search("chem").iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Nature Reviews Chemistry",
                "Open Chemistry Journal",
                "Chemical Letters",
                "Applied Chem Notes",
            ]
        );
    }

    #[test]
    fn category_browse_orders_by_rank() {
        let c = sample();
        let names: Vec<_> = c
            .in_category("化学")
            .iter()
            .map(|j| j.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Nature Reviews Chemistry",
                "Open Chemistry Journal",
                "Chemical Letters",
                "Applied Chem Notes",
            ]
        );
        assert_eq!(
            c.categories(),
            vec![("化学".to_string(), 4), ("材料科学".to_string(), 1)]
        );
    }

    #[test]
    fn find_journals_matches_minor_categories() {
        let c = sample();
        let hits = c.find_journals("有机");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Chemical Letters");
        assert!(c.find_journals("  ").is_empty());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Catalog::load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
