use std::io::Write;

use journal_shelf::catalog::{AuthorityLevel, Catalog, CatalogError, ImpactFactor};

#[test]
fn load_strips_byte_order_mark() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "\u{feff}Journal name,Year,ISSN/EISSN,Impact Factor,大类,大类分区,权威期刊\n\
         Acta Testica,2025,1234-5678,2.5,数学,2 [20/100],二级\n"
    )
    .unwrap();

    let catalog = Catalog::load(file.path()).unwrap();
    let acta = catalog.by_name("acta testica").unwrap();
    assert_eq!(acta.impact_factor, ImpactFactor::Value(2.5));
    assert_eq!(acta.authority, AuthorityLevel::Level2);
    assert_eq!(acta.partition_rank(), Some(20));
    assert!(!acta.open_access);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalog::load(dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
}

#[test]
fn short_rows_fall_back_to_defaults() {
    let catalog = Catalog::from_csv_str(
        "Journal name,Year,ISSN/EISSN,Impact Factor,大类\n\
         Short Row Journal,notayear\n",
    )
    .unwrap();
    let j = catalog.by_name("Short Row Journal").unwrap();
    assert_eq!(j.year, 0);
    assert_eq!(j.impact_factor, ImpactFactor::Value(0.0));
    assert!(j.journal_id().is_err());
    assert!(catalog.categories().is_empty());
}
