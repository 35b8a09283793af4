use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use journal_shelf::catalog::{Catalog, Journal};
use journal_shelf::summary::{
    resolve_related, summarize_with_apc, ApcInfo, JournalSummary, Locale, RelatedJournal,
    SummaryError, SummaryService,
};
use tokio::sync::Mutex;

const CATALOG: &str = "\
Journal,年份,ISSN/EISSN,Review,OA Journal Index（OAJ）,Open Access,Web of Science,影响因子,标注,大类,大类分区,Top,权威期刊,小类1,小类1分区
Open Physics,2024,2391-5471,否,是,是,SCIE,1.8,,物理与天体物理,4 [300/350],否,,物理综合,4 [80/90]
Physical Review Letters,2024,0031-9007/1079-7114,否,否,否,SCIE,8.1,,物理与天体物理,1 [10/350],是,一级,物理综合,1 [3/90]
";

#[derive(Debug, Clone)]
struct Call {
    kind: &'static str,
    journal: String,
    locale: Option<Locale>,
}

#[derive(Clone, Default)]
struct RecordingSummary {
    summaries: Arc<Mutex<VecDeque<Result<JournalSummary, SummaryError>>>>,
    apcs: Arc<Mutex<VecDeque<Result<ApcInfo, SummaryError>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingSummary {
    fn with_responses(
        summaries: Vec<Result<JournalSummary, SummaryError>>,
        apcs: Vec<Result<ApcInfo, SummaryError>>,
    ) -> Self {
        Self {
            summaries: Arc::new(Mutex::new(VecDeque::from(summaries))),
            apcs: Arc::new(Mutex::new(VecDeque::from(apcs))),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl SummaryService for RecordingSummary {
    async fn summarize(&self, journal: &Journal, locale: Locale) -> Result<JournalSummary, SummaryError> {
        self.calls.lock().await.push(Call {
            kind: "summary",
            journal: journal.name.clone(),
            locale: Some(locale),
        });
        self.summaries
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(SummaryError::Response("no canned summary".into())))
    }

    async fn find_apc(&self, journal: &Journal) -> Result<ApcInfo, SummaryError> {
        self.calls.lock().await.push(Call {
            kind: "apc",
            journal: journal.name.clone(),
            locale: None,
        });
        self.apcs
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(SummaryError::Response("no canned apc".into())))
    }
}

fn summary(related: &[(&str, &str)]) -> JournalSummary {
    JournalSummary {
        text: "A respected physics venue.".into(),
        related: related
            .iter()
            .map(|(name, issn)| RelatedJournal {
                name: name.to_string(),
                issn: issn.to_string(),
            })
            .collect(),
        apc: None,
    }
}

#[tokio::test]
async fn open_access_journal_gets_summary_and_apc() {
    let catalog = Catalog::from_csv_str(CATALOG).unwrap();
    let journal = catalog.by_name("Open Physics").unwrap();
    let service = RecordingSummary::with_responses(
        vec![Ok(summary(&[("Physical Review Letters", "0031-9007")]))],
        vec![Ok(ApcInfo {
            apc: "$1200".into(),
            apc_url: "https://www.google.com/search?q=Open+Physics+article+processing+charge".into(),
        })],
    );

    let result = summarize_with_apc(&service, journal, Locale::Zh).await.unwrap();
    assert_eq!(result.text, "A respected physics venue.");
    assert_eq!(result.apc.as_ref().unwrap().apc, "$1200");

    let calls = service.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .any(|c| c.kind == "summary" && c.locale == Some(Locale::Zh)));
    assert!(calls
        .iter()
        .all(|c| c.journal == "Open Physics"));

    let resolved = resolve_related(&catalog, &result.related);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].1.unwrap().name, "Physical Review Letters");
}

#[tokio::test]
async fn closed_journal_skips_apc_lookup() {
    let catalog = Catalog::from_csv_str(CATALOG).unwrap();
    let journal = catalog.by_name("Physical Review Letters").unwrap();
    let service = RecordingSummary::with_responses(vec![Ok(summary(&[]))], vec![]);

    let result = summarize_with_apc(&service, journal, Locale::En).await.unwrap();
    assert!(result.apc.is_none());
    let calls = service.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, "summary");
}

#[tokio::test]
async fn summary_failure_is_returned_without_retry() {
    let catalog = Catalog::from_csv_str(CATALOG).unwrap();
    let journal = catalog.by_name("Open Physics").unwrap();
    let service = RecordingSummary::with_responses(
        vec![Err(SummaryError::RateLimited("quota".into()))],
        vec![Ok(ApcInfo {
            apc: "Not found".into(),
            apc_url: String::new(),
        })],
    );

    let err = summarize_with_apc(&service, journal, Locale::En)
        .await
        .unwrap_err();
    assert!(matches!(err, SummaryError::RateLimited(_)));
    let summaries = service
        .calls()
        .await
        .into_iter()
        .filter(|c| c.kind == "summary")
        .count();
    assert_eq!(summaries, 1);
}

#[test]
fn server_column_naming_is_understood() {
    let catalog = Catalog::from_csv_str(CATALOG).unwrap();
    let journal = catalog.by_issn("1079-7114").unwrap();
    assert_eq!(journal.year, 2024);
    assert_eq!(journal.minor_categories.len(), 1);
    assert!(catalog.by_name("Open Physics").unwrap().oaj);
}
