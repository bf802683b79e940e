mod db;
mod fetch;
mod pipeline;
mod project;
mod xml;

use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

const DEFAULT_BASE_URL: &str = "https://courses.illinois.edu/cisapp/explorer";
const DEFAULT_FETCH_CONCURRENCY: usize = 10;

#[derive(Parser)]
#[command(name = "catalog_scraper", about = "Course catalog harvester (Course Explorer XML)")]
struct Cli {
    /// Catalog API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the years root and populate the Terms table
    Init,
    /// Harvest terms: fetch, project, and bulk-load all six entity levels
    Run {
        /// Term ids to harvest (default: every public term)
        #[arg(short, long)]
        term: Vec<i64>,
        /// Max terms to harvest
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Terms processed at once
        #[arg(short, long, default_value = "2")]
        concurrency: usize,
        /// Max in-flight HTTP requests across all terms
        #[arg(long, default_value_t = DEFAULT_FETCH_CONCURRENCY)]
        fetch_concurrency: usize,
    },
    /// Per-term record counts
    Terms {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Table totals
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let fetcher = fetch::Fetcher::new(DEFAULT_FETCH_CONCURRENCY);
            let url = format!("{}/schedule.xml?mode=summary", cli.base_url);
            let years_root = match fetcher.fetch_tree(&url).await {
                Some(tree) => tree,
                None => anyhow::bail!("could not fetch years root from {}", url),
            };
            let terms = project::terms::project(&years_root)?;
            let count = db::upsert_terms(&conn, &terms)?;
            println!("Loaded {} terms from the years root.", count);
            Ok(())
        }
        Commands::Run { term, limit, concurrency, fetch_concurrency } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let targets = db::fetch_harvest_targets(&conn, &term, limit)?;
            if targets.is_empty() {
                println!("No matching terms. Run 'init' first, or check the term ids.");
                return Ok(());
            }
            println!("Harvesting {} terms...", targets.len());
            let fetcher = fetch::Fetcher::new(fetch_concurrency);
            let outcome = pipeline::harvest_terms(&conn, &fetcher, targets, concurrency).await?;
            println!(
                "Done: {} terms committed, {} failed, {} records written.",
                outcome.ok, outcome.failed, outcome.records
            );
            Ok(())
        }
        Commands::Terms { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_term_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No terms. Run 'init' first.");
                return Ok(());
            }
            println!(
                "{:>8} | {:<14} | {:>8} | {:>7} | {:>8}",
                "TermID", "Term", "Subjects", "Courses", "Sections"
            );
            println!("{}", "-".repeat(58));
            for r in rows {
                println!(
                    "{:>8} | {:<14} | {:>8} | {:>7} | {:>8}",
                    r.term_id, r.term_name, r.subjects, r.courses, r.sections
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Terms:       {}", s.terms);
            println!("Subjects:    {}", s.subjects);
            println!("Departments: {}", s.departments);
            println!("Courses:     {}", s.courses);
            println!("Sections:    {}", s.sections);
            println!("Meetings:    {}", s.meetings);
            println!("Instructors: {}", s.instructors);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
