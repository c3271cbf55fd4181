//! Logscope CLI
//!
//! Command-line front-end over the logscope library:
//! - Show the histogram interval for a time range
//! - Build a search request without sending it
//! - Run a log search, plain or streamed
//! - Run a PromQL range query and merge its chunks
//! - Generate a default config file

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use logscope::{
    select_interval, ClientError, Config, LoggingConfig, OrgCache, QueryBuilder,
    RangeQueryRequest, ResultBuffer, SearchClient, SearchMeta, SearchSession, SearchState,
    StreamEvent, StreamSchema, TimeBound, Timestamps, TraceRegistry,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "logscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and run log searches and PromQL range queries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./logscope.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Organization (overrides config)
    #[arg(long, global = true)]
    pub org: Option<String>,

    /// Backend URL (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

/// Time range shared by the subcommands
#[derive(clap::Args)]
pub struct RangeArgs {
    /// Relative range ending now (e.g. 15m, 6h, 7d, 2w)
    #[arg(short, long, default_value = "15m")]
    pub last: String,
    /// Start time, microseconds or RFC 3339 (overrides --last)
    #[arg(long, requires = "end")]
    pub start: Option<String>,
    /// End time, microseconds or RFC 3339
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

/// Search inputs shared by `build` and `search`
#[derive(clap::Args)]
pub struct SearchArgs {
    /// Query text: `functions | filter`, or SQL with --sql
    pub query: String,
    /// Streams to search
    #[arg(short = 's', long = "stream")]
    pub streams: Vec<String>,
    /// Treat the query as SQL
    #[arg(long)]
    pub sql: bool,
    /// 1-based page number
    #[arg(short, long, default_value = "1")]
    pub page: u32,
    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the histogram interval for a time range
    Interval {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Print the search request for a query without sending it
    Build {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Run a log search
    Search {
        #[command(flatten)]
        search: SearchArgs,
        /// Use the streaming endpoint and print chunks as they arrive
        #[arg(long)]
        streamed: bool,
    },

    /// Run a PromQL range query
    Promql {
        /// PromQL expression
        query: String,
        /// Resolution step (e.g. 15s)
        #[arg(long)]
        step: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(org) = &cli.org {
        config.api.org = org.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }

    init_logging(&config.logging);

    match cli.command {
        Commands::Interval { range } => {
            let (start, end) = resolve_range(&range)?;
            let interval = select_interval(start, end);

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&interval)?);
            } else {
                println!("Interval:   {}", interval.interval);
                println!("Key format: {}", interval.key_format);
            }
        }

        Commands::Build { search } => {
            let builder = QueryBuilder::new(config.search.clone());
            let mut state = search_state(&search, &config)?;
            let envelope = builder.build(&mut state, &mut SearchMeta::default(), &mut ResultBuffer::new())?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }

        Commands::Search { search, streamed } => {
            let client = SearchClient::new(config.api.clone())?;
            let builder = QueryBuilder::new(config.search.clone());
            let org = config.api.org.clone();

            let mut state = search_state(&search, &config)?;
            if !state.sql_mode && state.selected_streams.len() > 1 {
                let mut schemas: OrgCache<StreamSchema> = OrgCache::new(org.clone());
                state.stream_schemas = fetch_schemas(&client, &mut schemas, &state.selected_streams).await?;
            }

            let mut meta = SearchMeta::default();
            let mut buffer = ResultBuffer::new();
            let envelope = builder.build(&mut state, &mut meta, &mut buffer)?;

            if streamed {
                run_streamed(&client, &org, &envelope, &cli.format).await?;
            } else {
                let response = client.search(&org, &envelope).await?;
                buffer.extend(&response);
                print_hits(&buffer, &cli.format)?;
                if let Some(interval) = &meta.histogram_interval {
                    print_histogram(&buffer, &interval.interval);
                }
            }
        }

        Commands::Promql { query, step, range } => {
            let client = SearchClient::new(config.api.clone())?;
            let (start_time, end_time) = resolve_range(&range)?;

            let request = RangeQueryRequest {
                org_identifier: config.api.org.clone(),
                query,
                start_time,
                end_time,
                step,
            };
            let result = client
                .collect_range_query(&config.api.org, &request, config.search.max_series)
                .await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for series in &result.result {
                    println!("{{{}}}  {} points", series.signature(), series.values.len());
                }
                println!("\n{} series, {} points", result.result.len(), result.point_count());
            }
        }

        Commands::Config { output } => {
            let content = logscope::config::generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine readable
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("logscope={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn search_state(args: &SearchArgs, config: &Config) -> anyhow::Result<SearchState> {
    let streams: Vec<&str> = args.streams.iter().map(String::as_str).collect();
    let timestamps = match (&args.range.start, &args.range.end) {
        (Some(start), Some(end)) => Timestamps::new(TimeBound::from(start.as_str()), TimeBound::from(end.as_str())),
        _ => {
            let (start, end) = last_range(&args.range.last)?;
            Timestamps::new(start, end)
        }
    };

    Ok(SearchState::new(&streams, args.query.clone(), timestamps)
        .sql_mode(args.sql)
        .page(args.page, config.search.rows_per_page))
}

async fn fetch_schemas(
    client: &SearchClient,
    cache: &mut OrgCache<StreamSchema>,
    streams: &[String],
) -> Result<Vec<StreamSchema>, ClientError> {
    let org = cache.org().to_string();
    let mut schemas = Vec::with_capacity(streams.len());

    for stream in streams {
        let schema = match cache.get(stream) {
            Some(schema) => schema.clone(),
            None => {
                let schema = client.stream_schema(&org, stream).await?;
                cache.insert(stream.clone(), schema.clone());
                schema
            }
        };
        schemas.push(schema);
    }
    Ok(schemas)
}

async fn run_streamed(
    client: &SearchClient,
    org: &str,
    envelope: &logscope::SearchEnvelope,
    format: &str,
) -> anyhow::Result<()> {
    let mut session = SearchSession::new(TraceRegistry::new());
    let (trace_id, mut subscription) = session.start_subscribed();

    let request = client.search_stream(org, envelope, &trace_id, session.registry());
    let printer = async {
        let mut chunks = 0usize;
        let mut failure = None;
        while let Some(event) = subscription.recv().await {
            match event {
                StreamEvent::Data(value) => {
                    chunks += 1;
                    if format == "json" {
                        println!("{}", value);
                    } else {
                        let hits = value.get("hits").and_then(|h| h.as_array()).map_or(0, Vec::len);
                        println!("chunk {}: {} hits", chunks, hits);
                    }
                }
                StreamEvent::Error { code, message } => failure = Some((code, message)),
                StreamEvent::Reset => println!("-- results reset --"),
                StreamEvent::Complete | StreamEvent::Cancelled => break,
            }
        }
        failure
    };

    let (outcome, failure) = tokio::join!(request, printer);
    if let Some((code, message)) = failure {
        bail!("Search failed ({}): {}", code, message);
    }
    outcome?;
    Ok(())
}

fn print_hits(buffer: &ResultBuffer, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&buffer.hits)?);
        return Ok(());
    }

    if buffer.hits.is_empty() {
        println!("No hits for the selected time range");
        return Ok(());
    }

    for hit in &buffer.hits {
        println!("{}", hit);
    }
    println!("\n{} of {} hits", buffer.hits.len(), buffer.total);
    Ok(())
}

fn print_histogram(buffer: &ResultBuffer, interval: &str) {
    if buffer.histogram.is_empty() {
        return;
    }

    println!("\nHistogram ({}):", interval);
    for bucket in buffer.histogram.buckets() {
        println!("  {}  {}", bucket.zo_sql_key, bucket.zo_sql_num);
    }
}

/// Both ends in microseconds
fn resolve_range(range: &RangeArgs) -> anyhow::Result<(i64, i64)> {
    match (&range.start, &range.end) {
        (Some(start), Some(end)) => {
            let start = TimeBound::from(start.as_str())
                .to_micros()
                .with_context(|| format!("Invalid start time: {}", start))?;
            let end = TimeBound::from(end.as_str())
                .to_micros()
                .with_context(|| format!("Invalid end time: {}", end))?;
            Ok((start, end))
        }
        _ => last_range(&range.last),
    }
}

fn last_range(last: &str) -> anyhow::Result<(i64, i64)> {
    let duration = parse_duration(last)?;
    let end = Utc::now().timestamp_micros();
    let start = duration
        .num_microseconds()
        .and_then(|span| end.checked_sub(span))
        .with_context(|| format!("Range too large: {}", last))?;
    Ok((start, end))
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim().to_lowercase();

    let duration = if let Some(secs) = s.strip_suffix('s') {
        Duration::try_seconds(secs.parse()?)
    } else if let Some(minutes) = s.strip_suffix('m') {
        Duration::try_minutes(minutes.parse()?)
    } else if let Some(hours) = s.strip_suffix('h') {
        Duration::try_hours(hours.parse()?)
    } else if let Some(days) = s.strip_suffix('d') {
        Duration::try_days(days.parse()?)
    } else if let Some(weeks) = s.strip_suffix('w') {
        Duration::try_weeks(weeks.parse()?)
    } else {
        bail!("Invalid duration format: {}. Use: 30s, 15m, 6h, 7d, 2w", s);
    };

    duration.with_context(|| format!("Duration out of range: {}", s))
}
