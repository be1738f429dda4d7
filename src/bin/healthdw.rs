use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use healthdw::{tools, HealthDW, Metric, MetricFamily};

#[derive(Parser)]
#[command(name = "healthdw", about = "Personal health data cache CLI")]
struct Cli {
    /// Database path (default: ~/.healthdw/health_cache.db)
    #[arg(long, env = "HEALTHDW_DB")]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output as JSON where a structured form exists
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cached record counts and sync state
    Status,
    /// List dates missing from the cache
    Missing {
        /// Start date (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        start: NaiveDate,
        /// End date (YYYY-MM-DD, default: today)
        #[arg(value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Family: daily, sleep, advanced, cardio_fitness, activities (default: all)
        #[arg(long)]
        family: Option<String>,
    },
    /// Daily snapshot and readiness breakdown
    Readiness {
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Bedtime and wake-time regularity
    Consistency {
        #[arg(long, default_value = "14")]
        days: u32,
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
    },
    /// Compare a metric's recent average with the preceding baseline
    Trend {
        /// Metric name (e.g. steps, resting_heart_rate, hrv)
        metric: String,
        #[arg(long, default_value = "7")]
        recent: u32,
        #[arg(long, default_value = "30")]
        baseline: u32,
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
    },
    /// Pearson correlation between two metrics
    Correlate {
        metric_a: String,
        metric_b: String,
        #[arg(long, default_value = "60")]
        days: u32,
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
    },
    /// Workouts with intensity over a date range
    Workouts {
        #[arg(value_parser = parse_date)]
        start: NaiveDate,
        #[arg(value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    /// Heart-rate zone minutes over a date range
    Zones {
        #[arg(value_parser = parse_date)]
        start: NaiveDate,
        #[arg(value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    /// Lifetime totals across all cached days
    Lifetime,
    /// Show tables and columns
    Schema,
    /// Run a read-only SQL query
    Query { sql: String },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show last sync date and credential state
    SyncState,
    /// Delete cached metrics
    Flush {
        /// Also delete sync date, credentials and config
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    healthdw::date_util::parse_date(s).map_err(|e| e.to_string())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => healthdw::Database::open_at(path).await?,
        None => healthdw::Database::open().await?,
    };
    let hdw = HealthDW::new(db);
    let json = cli.json;

    match cli.command {
        Commands::Status => print_status(&hdw, json).await?,
        Commands::Missing { start, end, family } => {
            let families = match family {
                Some(name) => vec![MetricFamily::parse(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown family: {name}"))?],
                None => MetricFamily::ALL.to_vec(),
            };
            let plans = hdw.plan_sync(start, end.unwrap_or_else(today), &families).await?;
            if json {
                print_json(&plans)?;
            } else {
                for plan in &plans {
                    if plan.is_complete() {
                        println!("{}: complete", plan.family);
                        continue;
                    }
                    println!("{}: {} missing dates", plan.family, plan.missing_dates.len());
                    for r in &plan.ranges {
                        println!("  {} .. {} ({} days)", r.start, r.end, r.days());
                    }
                }
            }
        }
        Commands::Readiness { date } => {
            let date = date.unwrap_or_else(today);
            if json {
                print_json(&hdw.readiness(date).await?)?;
            } else {
                println!("{}\n", tools::daily_snapshot(&hdw, date).await);
                println!("{}", tools::readiness_breakdown(&hdw, date).await);
            }
        }
        Commands::Consistency { days, as_of } => {
            let as_of = as_of.unwrap_or_else(today);
            if json {
                print_json(&hdw.sleep_consistency(as_of, days).await?)?;
            } else {
                println!("{}", tools::sleep_consistency_report(&hdw, as_of, days).await);
            }
        }
        Commands::Trend {
            metric,
            recent,
            baseline,
            as_of,
        } => {
            let as_of = as_of.unwrap_or_else(today);
            if json {
                let metric: Metric = metric.parse()?;
                print_json(&hdw.trend(metric, recent, baseline, as_of).await?)?;
            } else {
                println!(
                    "{}",
                    tools::comparative_trend(&hdw, &metric, recent, baseline, as_of).await
                );
            }
        }
        Commands::Correlate {
            metric_a,
            metric_b,
            days,
            as_of,
        } => {
            let as_of = as_of.unwrap_or_else(today);
            if json {
                let (a, b): (Metric, Metric) = (metric_a.parse()?, metric_b.parse()?);
                print_json(&hdw.correlation(a, b, days, as_of).await?)?;
            } else {
                println!(
                    "{}",
                    tools::correlation(&hdw, &metric_a, &metric_b, days, as_of).await
                );
            }
        }
        Commands::Workouts { start, end } => {
            let end = end.unwrap_or_else(today);
            if json {
                print_json(&hdw.activities_in_range(start, end).await?)?;
            } else {
                println!("{}", tools::workout_history(&hdw, start, end).await);
            }
        }
        Commands::Zones { start, end } => {
            let end = end.unwrap_or_else(today);
            if json {
                print_json(&hdw.zone_summary(start, end).await?)?;
            } else {
                println!("{}", tools::zone_analysis(&hdw, start, end).await);
            }
        }
        Commands::Lifetime => {
            if json {
                print_json(&hdw.lifetime_stats().await?)?;
            } else {
                println!("{}", tools::lifetime_stats(&hdw).await);
            }
        }
        Commands::Schema => {
            if json {
                print_json(&hdw.inspect_schema().await?)?;
            } else {
                println!("{}", tools::schema(&hdw).await);
            }
        }
        Commands::Query { sql } => {
            if json {
                print_json(&hdw.run_read_query(&sql).await?)?;
            } else {
                println!("{}", tools::sql_query(&hdw, &sql).await);
            }
        }
        Commands::Config { action } => handle_config(&hdw, action).await?,
        Commands::SyncState => print_sync_state(&hdw).await?,
        Commands::Flush { all } => {
            if all {
                hdw.flush_all().await?;
                println!("Cache, sync state and config cleared.");
            } else {
                hdw.flush_metrics().await?;
                println!("Cached metrics cleared.");
            }
        }
    }

    Ok(())
}

async fn print_status(hdw: &HealthDW, json: bool) -> anyhow::Result<()> {
    let stats = hdw.cache_stats().await?;
    if json {
        return print_json(&stats);
    }
    let last_sync = hdw.last_sync_date().await?;

    println!("Cache Status");
    for s in &stats {
        let count = if s.records == s.days {
            format!("{:>6} days", s.days)
        } else {
            format!("{:>6} records over {} days", s.records, s.days)
        };
        match (&s.first_date, &s.last_date) {
            (Some(first), Some(last)) => {
                println!("  {:<15} {count}  ({first} .. {last})", s.family.to_string())
            }
            _ => println!("  {:<15} {count}", s.family.to_string()),
        }
    }
    println!(
        "  Last sync: {}",
        last_sync
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}

async fn print_sync_state(hdw: &HealthDW) -> anyhow::Result<()> {
    let last_sync = hdw.last_sync_date().await?;
    let needs_sync = hdw.needs_sync(today()).await?;
    let has_credential = hdw.get_credential().await?.is_some();
    let expiry = hdw.credential_expiry().await?;
    let expired = hdw.credential_expired(chrono::Utc::now()).await?;

    println!(
        "Last sync:  {}",
        last_sync
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("Needs sync: {}", if needs_sync { "yes" } else { "no" });
    if !has_credential {
        println!("Credential: none stored");
        return Ok(());
    }
    match expiry {
        Some(at) => println!(
            "Credential: stored, {} {}",
            if expired { "expired" } else { "expires" },
            at.to_rfc3339()
        ),
        None => println!("Credential: stored, no expiry recorded"),
    }
    Ok(())
}

async fn handle_config(hdw: &HealthDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match hdw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            hdw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = hdw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
