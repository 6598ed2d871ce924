mod db;
mod geo;
mod llm;
mod model;
mod pipeline;

use std::time::Instant;

use clap::{Parser, Subcommand};

use pipeline::BatchOptions;

#[derive(Parser)]
#[command(name = "coop_pipeline", about = "Co-op job posting salary + skill pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a raw jobs file into the dashboard document
    Process {
        /// Raw scraped postings (JSON array)
        #[arg(short, long, default_value = "jobs.json")]
        input: String,
        /// Output document path
        #[arg(short, long, default_value = "processed_jobs.json")]
        output: String,
        /// Salary cache database
        #[arg(long, default_value = "data/salary_cache.sqlite")]
        db: String,
        /// Max postings to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip the generative fallback even when an API key is set
        #[arg(long)]
        no_llm: bool,
    },
    /// Run the salary cascade over a single text snippet
    Check {
        /// Posting text (or just the compensation section)
        text: String,
    },
    /// Show salary cache statistics
    Stats {
        /// Salary cache database
        #[arg(long, default_value = "data/salary_cache.sqlite")]
        db: String,
        /// Output document to cross-check coverage against
        #[arg(short, long, default_value = "processed_jobs.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            input,
            output,
            db,
            limit,
            no_llm,
        } => {
            let opts = BatchOptions {
                input,
                output: output.clone(),
                db,
                limit,
                skip_llm: no_llm,
            };
            let summary = pipeline::run_batch(&opts).await?;
            println!(
                "Processed {} postings: {} with salary ({} cache hits, {} queued for fallback, {} resolved there).",
                summary.total,
                summary.with_salary,
                summary.cache_hits,
                summary.queued,
                summary.resolved_by_fallback
            );
            println!(
                "Cache grew by {} entries. Output written to {}.",
                summary.new_cache_entries, output
            );
            Ok(())
        }
        Commands::Check { text } => {
            let comp = pipeline::section::split(&text);
            match pipeline::cascade::extract_salary(&comp) {
                Some(salary) => println!("{}", serde_json::to_string_pretty(&salary)?),
                None => {
                    if pipeline::fallback_eligible(&comp) {
                        println!("No cascade match; would be queued for the generative fallback.");
                    } else {
                        println!("No salary found.");
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { db, output } => {
            let conn = db::connect(&db)?;
            db::init_schema(&conn)?;
            let s = db::cache_stats(&conn)?;
            println!("Cached salaries: {}", s.total);
            println!("From fallback:   {}", s.from_fallback);

            if let Ok(raw) = std::fs::read_to_string(&output) {
                if let Ok(doc) = serde_json::from_str::<model::OutputDoc>(&raw) {
                    let with_salary = doc
                        .metrics
                        .salary_stats
                        .hourly
                        .as_ref()
                        .map(|h| h.count)
                        .unwrap_or(0);
                    println!(
                        "Last output:     {}/{} jobs with salary",
                        with_salary, doc.metrics.total_jobs
                    );
                }
            }
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
