//! Keen Query CLI
//!
//! Command-line interface for running analyses against a project:
//! - Counts and numeric aggregates
//! - Select-unique and extractions
//! - Funnels and multi-analyses
//! - Config file generation

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use keen_query::config::{generate_default_config, Config};
use keen_query::query::{Analysis, Filter, FunnelStep, QueryKind, QueryParams, Timeframe};
use keen_query::{logging, KeenQueryClient, QueryParamsBuilder};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keen-query")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run analyses against the Keen query API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project id (overrides config)
    #[arg(long, global = true)]
    pub project_id: Option<String>,

    /// Read key (overrides config)
    #[arg(long, global = true)]
    pub read_key: Option<String>,

    /// API address (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log outgoing request bodies and URLs
    #[arg(long, global = true)]
    pub log_requests: bool,
}

/// Options shared by every query
#[derive(Args, Debug, Default)]
pub struct QueryOpts {
    /// Relative timeframe, e.g. this_14_days
    #[arg(short, long)]
    pub timeframe: Option<String>,

    /// Absolute timeframe start (ISO 8601)
    #[arg(long, requires = "end", conflicts_with = "timeframe")]
    pub start: Option<String>,

    /// Absolute timeframe end (ISO 8601)
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Group by a property (repeatable)
    #[arg(short, long)]
    pub group_by: Vec<String>,

    /// Bucket results by interval, e.g. daily
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Timezone for interval buckets
    #[arg(long)]
    pub timezone: Option<String>,

    /// Filter as name:operator:value, value parsed as JSON when possible (repeatable)
    #[arg(short, long)]
    pub filter: Vec<String>,

    /// Maximum acceptable cached result age, in seconds
    #[arg(long)]
    pub max_age: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count events
    Count {
        collection: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Count distinct values of a property
    CountUnique {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Smallest value of a property
    Minimum {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Largest value of a property
    Maximum {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Mean of a property
    Average {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Median of a property
    Median {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Sum of a property
    Sum {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Value at a percentile of a property
    Percentile {
        collection: String,
        target_property: String,
        /// Percentile between 0 and 100
        percentile: f64,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Distinct values of a property
    SelectUnique {
        collection: String,
        target_property: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Extract raw events
    Extraction {
        collection: String,
        /// Only the N most recent events
        #[arg(long)]
        latest: Option<u64>,
        /// Mail the extraction instead of returning it
        #[arg(long)]
        email: Option<String>,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Funnel over JSON-encoded steps
    Funnel {
        /// JSON array of steps ({"event_collection", "actor_property", ...})
        #[arg(long)]
        steps: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Several analyses over one collection
    MultiAnalysis {
        collection: String,
        /// JSON object of label to {"analysis_type", "target_property"}
        #[arg(long)]
        analyses: String,
        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote default config to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(id) = cli.project_id.clone() {
        config.project.id = id;
    }
    if let Some(read_key) = cli.read_key.clone() {
        config.project.read_key = read_key;
    }
    if let Some(base_url) = cli.base_url.clone() {
        config.client.base_url = base_url;
    }
    if cli.log_requests {
        config.logging.log_requests = true;
    }

    logging::init(&config.logging)?;
    config.project.require()?;

    let client = KeenQueryClient::builder_from_config(&config).build()?;
    let (kind, params) = build_query(cli.command)?;

    tracing::debug!(kind = %kind, url = %client.query_url(kind), "Running query");
    let result = client.execute(kind, &params, None)?;

    println!("{}", serde_json::to_string_pretty(&result.to_value())?);
    Ok(())
}

/// Translate a subcommand into a query kind and its parameters
fn build_query(command: Commands) -> anyhow::Result<(QueryKind, QueryParams)> {
    let (kind, builder, opts) = match command {
        Commands::Count { collection, opts } => (
            QueryKind::CountResource,
            QueryParams::builder().event_collection(collection),
            opts,
        ),
        Commands::CountUnique {
            collection,
            target_property,
            opts,
        } => (
            QueryKind::CountUnique,
            target(collection, target_property),
            opts,
        ),
        Commands::Minimum {
            collection,
            target_property,
            opts,
        } => (QueryKind::Minimum, target(collection, target_property), opts),
        Commands::Maximum {
            collection,
            target_property,
            opts,
        } => (QueryKind::Maximum, target(collection, target_property), opts),
        Commands::Average {
            collection,
            target_property,
            opts,
        } => (QueryKind::Average, target(collection, target_property), opts),
        Commands::Median {
            collection,
            target_property,
            opts,
        } => (QueryKind::Median, target(collection, target_property), opts),
        Commands::Sum {
            collection,
            target_property,
            opts,
        } => (
            QueryKind::SumResource,
            target(collection, target_property),
            opts,
        ),
        Commands::Percentile {
            collection,
            target_property,
            percentile,
            opts,
        } => (
            QueryKind::Percentile,
            target(collection, target_property).percentile(percentile),
            opts,
        ),
        Commands::SelectUnique {
            collection,
            target_property,
            opts,
        } => (
            QueryKind::SelectUniqueResource,
            target(collection, target_property),
            opts,
        ),
        Commands::Extraction {
            collection,
            latest,
            email,
            opts,
        } => {
            let mut builder = QueryParams::builder().event_collection(collection);
            if let Some(latest) = latest {
                builder = builder.latest(latest);
            }
            if let Some(email) = email {
                builder = builder.email(email);
            }
            (QueryKind::ExtractionResource, builder, opts)
        }
        Commands::Funnel { steps, opts } => {
            let steps: Vec<FunnelStep> =
                serde_json::from_str(&steps).context("parsing --steps")?;
            (
                QueryKind::Funnel,
                QueryParams::builder().funnel_steps(steps),
                opts,
            )
        }
        Commands::MultiAnalysis {
            collection,
            analyses,
            opts,
        } => {
            let analyses: BTreeMap<String, Analysis> =
                serde_json::from_str(&analyses).context("parsing --analyses")?;
            (
                QueryKind::MultiAnalysis,
                QueryParams::builder()
                    .event_collection(collection)
                    .analyses(analyses),
                opts,
            )
        }
        Commands::Config { .. } => bail!("config does not run a query"),
    };

    let params = apply_opts(builder, opts)?.build();
    Ok((kind, params))
}

fn target(collection: String, target_property: String) -> QueryParamsBuilder {
    QueryParams::builder()
        .event_collection(collection)
        .target_property(target_property)
}

fn apply_opts(mut builder: QueryParamsBuilder, opts: QueryOpts) -> anyhow::Result<QueryParamsBuilder> {
    match (opts.start, opts.end, opts.timeframe) {
        (Some(start), Some(end), _) => builder = builder.timeframe(Timeframe::absolute(start, end)),
        (_, _, Some(token)) => builder = builder.timeframe(Timeframe::relative(token)),
        _ => {}
    }

    if !opts.group_by.is_empty() {
        builder = builder.group_by_all(opts.group_by);
    }
    if let Some(interval) = opts.interval {
        builder = builder.interval(interval);
    }
    if let Some(timezone) = opts.timezone {
        builder = builder.timezone(timezone);
    }
    if let Some(max_age) = opts.max_age {
        builder = builder.max_age(max_age);
    }

    let filters = opts
        .filter
        .iter()
        .map(|s| parse_filter(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if !filters.is_empty() {
        builder = builder.filters(filters);
    }

    Ok(builder)
}

/// Parse `name:operator:value`; the value is JSON when it parses, else a string
fn parse_filter(raw: &str) -> anyhow::Result<Filter> {
    let mut parts = raw.splitn(3, ':');
    let (Some(name), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next())
    else {
        bail!("invalid filter '{}': expected name:operator:value", raw);
    };

    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(Filter::new(name, operator, value))
}
