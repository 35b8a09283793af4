use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use journal_shelf::browse::{page_window, paginate};
use journal_shelf::catalog::partition::Partition;
use journal_shelf::catalog::stats::{share, CategoryStats};
use journal_shelf::catalog::{Catalog, Journal};
use journal_shelf::config::{self, Config};
use journal_shelf::favorites::{FavoriteRecord, Favorites};
use journal_shelf::model::{ListId, Membership, OwnerId};
use journal_shelf::store::SqliteStore;
use journal_shelf::summary::{self, GenAiClient, Locale};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Owner whose lists and favorites are used (defaults to store.owner)
    #[arg(long)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search journals by name
    Search {
        term: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// List major categories with journal counts
    Categories,
    /// Journals of one major category, best ranked first
    Browse {
        category: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show one journal by name or ISSN
    Show { journal: String },
    /// Partition, authority and open-access breakdown
    Stats {
        /// Restrict to one major category
        #[arg(long)]
        category: Option<String>,
    },
    /// Ask the AI service for a summary and related journals
    Summarize {
        journal: String,
        #[arg(long)]
        locale: Option<String>,
    },
    /// Show lists with their journal counts
    Lists,
    /// Create a list, optionally filing a journal into it
    ListCreate {
        name: String,
        #[arg(long)]
        journal: Option<String>,
    },
    ListRename { id: String, name: String },
    /// Delete a list; journals left in no list become uncategorized
    ListDelete { id: String },
    /// Set the lists a journal is filed under. No --list favorites it
    /// uncategorized, or removes it if it is already a favorite.
    Favorite {
        journal: String,
        #[arg(long = "list")]
        lists: Vec<String>,
    },
    /// Remove a journal from favorites entirely
    Unfavorite { journal: String },
    /// Favorites in one list, or uncategorized ones when no list is given
    Favorites {
        #[arg(long)]
        list: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Delete every list and favorite of the owner
    DeleteAccount {
        #[arg(long)]
        yes: bool,
    },
}

struct App {
    cfg: Config,
    owner: Option<String>,
}

impl App {
    fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.cfg.app.catalog_path)
            .with_context(|| format!("failed to load catalog {}", self.cfg.app.catalog_path))
    }

    async fn favorites(&self) -> Result<Favorites> {
        let owner = self.owner.as_deref().unwrap_or(&self.cfg.store.owner);
        let owner = OwnerId::new(owner)?;
        let store = SqliteStore::connect(&self.cfg.database_url())
            .await
            .context("failed to open document store")?;
        Ok(Favorites::new(Arc::new(store), owner))
    }

    fn page_size(&self) -> usize {
        self.cfg.app.page_size
    }
}

fn find<'a>(catalog: &'a Catalog, query: &str) -> Result<&'a Journal> {
    catalog
        .find(query)
        .ok_or_else(|| anyhow!("no journal named or with ISSN '{}'", query))
}

fn print_journal_row(j: &Journal) {
    println!(
        "{:<50} {:<20} IF {:>6}  {:<6} {}",
        j.name,
        j.issn,
        j.impact_factor.display(),
        Partition::parse(&j.major_category_partition)
            .zone_label()
            .unwrap_or("-"),
        j.authority.label().unwrap_or("")
    );
}

fn print_record_row(r: &FavoriteRecord) {
    match &r.snapshot {
        Some(s) => println!(
            "{:<50} {:<20} IF {:>6}  {}",
            s.journal_name,
            s.issn,
            s.impact_factor.display(),
            s.major_category_partition
        ),
        None => println!("{:<50}", r.journal_id),
    }
}

fn print_pager(page: usize, total: usize) {
    if total <= 1 {
        return;
    }
    let parts: Vec<String> = page_window(page, total)
        .into_iter()
        .map(|p| match p {
            Some(p) if p == page => format!("[{}]", p),
            Some(p) => p.to_string(),
            None => "...".to_string(),
        })
        .collect();
    println!("\npage {}", parts.join(" "));
}

fn print_stats(stats: &CategoryStats) {
    println!("total: {}", stats.total);
    for (title, buckets) in [
        ("partition", &stats.partitions),
        ("authority", &stats.authority),
        ("access", &stats.open_access),
    ] {
        for b in buckets {
            println!(
                "  {:<10} {:<8} {:>5} ({:.1}%)",
                title,
                b.name,
                b.count,
                share(b.count, stats.total)
            );
        }
    }
}

fn show(j: &Journal) {
    println!("{}", j.name);
    println!("  ISSN/EISSN      {}", j.issn);
    println!("  Year            {}", j.year);
    println!("  Impact Factor   {}", j.impact_factor.display());
    println!("  Web of Science  {}", j.web_of_science);
    let partition = Partition::parse(&j.major_category_partition);
    println!(
        "  Major category  {} {} {}",
        j.major_category,
        partition.zone_label().unwrap_or(""),
        partition.raw
    );
    for c in &j.minor_categories {
        println!("  Minor category  {} {}", c.name, c.partition);
    }
    println!(
        "  Top {}  Review {}  OAJ {}  Open access {}",
        j.top, j.review, j.oaj, j.open_access
    );
    if let Some(level) = j.authority.label() {
        println!("  Authority       {}", level);
    }
    if !j.annotation.is_empty() {
        println!("  Annotation      {}", j.annotation);
    }
}

async fn run(app: App, command: Command) -> Result<()> {
    match command {
        Command::Search { term, page } => {
            let catalog = app.catalog()?;
            let hits = catalog.search(&term);
            let page = paginate(&hits, page, app.page_size());
            for j in &page.items {
                print_journal_row(j);
            }
            println!("\n{} journals", page.total_items);
            print_pager(page.page, page.total_pages);
        }
        Command::Categories => {
            for (name, count) in app.catalog()?.categories() {
                println!("{:>6}  {}", count, name);
            }
        }
        Command::Browse { category, page } => {
            let catalog = app.catalog()?;
            let journals = catalog.in_category(&category);
            if journals.is_empty() {
                bail!("no journals in category '{}'", category);
            }
            let page = paginate(&journals, page, app.page_size());
            for j in &page.items {
                print_journal_row(j);
            }
            print_pager(page.page, page.total_pages);
        }
        Command::Show { journal } => {
            let catalog = app.catalog()?;
            show(find(&catalog, &journal)?);
        }
        Command::Stats { category } => {
            let catalog = app.catalog()?;
            let stats = match category {
                Some(c) => CategoryStats::compute(catalog.in_category(&c)),
                None => CategoryStats::compute(catalog.journals()),
            };
            print_stats(&stats);
        }
        Command::Summarize { journal, locale } => {
            let catalog = app.catalog()?;
            let journal = find(&catalog, &journal)?;
            let locale: Locale = locale
                .as_deref()
                .unwrap_or(&app.cfg.app.locale)
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let client = GenAiClient::from_config(&app.cfg.ai, app.cfg.ai_api_key())?;
            let result = summary::summarize_with_apc(&client, journal, locale).await?;
            println!("{}\n", result.text);
            if let Some(apc) = &result.apc {
                println!("APC: {} ({})\n", apc.apc, apc.apc_url);
            }
            for (related, hit) in summary::resolve_related(&catalog, &result.related) {
                match hit {
                    Some(j) => print_journal_row(j),
                    None => println!("{:<50} {:<20} (not in catalog)", related.name, related.issn),
                }
            }
        }
        Command::Lists => {
            let overview = app.favorites().await?.overview().await?;
            for (list, count) in &overview.lists {
                println!("{:<34} {:>5}  {}", list.id, count, list.name);
            }
            println!("{:<34} {:>5}", "uncategorized", overview.uncategorized);
            println!("\n{} favorite journals", overview.journals);
        }
        Command::ListCreate { name, journal } => {
            let favorites = app.favorites().await?;
            let list = match journal {
                Some(query) => {
                    let catalog = app.catalog()?;
                    favorites
                        .create_list_and_add(find(&catalog, &query)?, &name)
                        .await?
                }
                None => favorites.create_list(&name).await?,
            };
            println!("{}", list.id);
        }
        Command::ListRename { id, name } => {
            app.favorites()
                .await?
                .rename_list(&ListId::new(&id)?, &name)
                .await?;
        }
        Command::ListDelete { id } => {
            let outcome = app
                .favorites()
                .await?
                .delete_list(&ListId::new(&id)?)
                .await?;
            info!(
                removed = outcome.removed,
                recategorized = outcome.recategorized,
                "list deleted"
            );
        }
        Command::Favorite { journal, lists } => {
            let catalog = app.catalog()?;
            let journal = find(&catalog, &journal)?;
            let target = lists
                .iter()
                .map(|l| ListId::new(l))
                .collect::<Result<BTreeSet<_>, _>>()?;
            let outcome = app.favorites().await?.reconcile(journal, &target).await?;
            if outcome.after().is_empty() {
                println!("{} removed from favorites", journal.name);
            } else {
                let names: Vec<String> = outcome.after().iter().map(Membership::to_string).collect();
                println!("{}: {}", journal.name, names.join(", "));
            }
        }
        Command::Unfavorite { journal } => {
            let catalog = app.catalog()?;
            let id = find(&catalog, &journal)?.journal_id()?;
            let removed = app.favorites().await?.unfavorite(&id).await?;
            println!("{} records removed", removed);
        }
        Command::Favorites { list, page } => {
            let membership = match list {
                Some(id) => Membership::InList(ListId::new(&id)?),
                None => Membership::Uncategorized,
            };
            let records = app.favorites().await?.favorites_in(&membership).await?;
            let page = paginate(&records, page, app.page_size());
            for r in &page.items {
                print_record_row(r);
            }
            print_pager(page.page, page.total_pages);
        }
        Command::DeleteAccount { yes } => {
            if !yes {
                bail!("refusing to delete all lists and favorites without --yes");
            }
            let deleted = app.favorites().await?.delete_all().await?;
            println!("{} documents deleted", deleted);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    run(
        App {
            cfg,
            owner: args.owner,
        },
        args.command,
    )
    .await
}
