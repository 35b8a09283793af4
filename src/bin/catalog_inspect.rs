use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use journal_shelf::catalog::stats::{share, CategoryStats};
use journal_shelf::catalog::{Catalog, HeaderMap};
use journal_shelf::config;

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config; its catalog_path is used when --csv is absent
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// CSV file to inspect
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Number of categories to print
    #[arg(long, default_value_t = 20)]
    top: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let path = match args.csv {
        Some(p) => p,
        None => PathBuf::from(config::load(Some(&args.config))?.app.catalog_path),
    };

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = HeaderMap::new(reader.headers()?);
    println!("Columns:");
    for (field, index) in headers.resolved() {
        match index {
            Some(i) => println!("  {:<26} -> column {}", field, i),
            None => println!("  {:<26} -> missing", field),
        }
    }

    let catalog = Catalog::load(&path)?;
    let stats = CategoryStats::compute(catalog.journals());
    println!("\nJournals: {}", stats.total);
    for b in stats.partitions.iter().chain(&stats.authority).chain(&stats.open_access) {
        println!("  {:<8} {:>6} ({:.1}%)", b.name, b.count, share(b.count, stats.total));
    }

    println!("\nCategories:");
    for (name, count) in catalog.categories().into_iter().take(args.top) {
        println!("  {:>6}  {}", count, name);
    }
    Ok(())
}
