//! Domain Lookup CLI Application
//!
//! Looks up domain registration data using RDAP with WHOIS fallback.
//! A single domain is resolved directly; several domains (or a file) go
//! through the bulk processor and end with a summary.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use domain_lookup_lib::{
    load_env_config, BulkOptions, BulkProcessor, BulkSummary, ConfigManager, DomainLookup,
    FileConfig, LookupConfig, MemoryCache, MemoryTldStore, Resolver,
};
use serde_json::json;
use std::error::Error;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-lookup
#[derive(Parser, Debug)]
#[command(name = "domain-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Look up domain registration data using RDAP with WHOIS fallback")]
#[command(
    long_about = "Look up domain registration data using RDAP with automatic WHOIS fallback.\n\nOne domain is resolved directly. Several domains, or a file, are processed in bounded-concurrency batches (max 100 domains)."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Fully qualified domain names to look up
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Show detailed registration information
    #[arg(short = 'i', long = "info", help_heading = "Output Format")]
    pub info: bool,

    /// Domains resolved at once in bulk mode (default: 5, max: 10)
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// Accepted for API compatibility; there is no separate availability pre-check
    #[arg(long = "skip-availability-check", help_heading = "Performance")]
    pub skip_availability_check: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Debug logging to stderr (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);

    if let Err(e) = run_lookup(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.domains.is_empty() && args.file.is_none() {
        return Err("You must specify domain names or a file with --file".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if !(1..=10).contains(&concurrency) {
            return Err("Concurrency must be between 1 and 10".to_string());
        }
    }

    Ok(())
}

async fn run_lookup(args: Args) -> Result<(), Box<dyn Error>> {
    let (config, file_config) = build_config(&args)?;

    let store = if file_config.use_builtin_tlds() {
        MemoryTldStore::with_builtin()
    } else {
        MemoryTldStore::new()
    };
    store.extend(file_config.tld_mappings()).await;

    let resolver = Resolver::from_store(Arc::new(store), MemoryCache::shared(), &config)?;
    let domains = get_domains_to_lookup(&args)?;
    tracing::debug!(
        count = domains.len(),
        concurrency = config.default_max_concurrent,
        "Starting lookup"
    );

    if domains.len() == 1 && args.file.is_none() {
        run_single_lookup(&resolver, &domains[0], &args).await
    } else {
        run_bulk_lookup(resolver, &domains, &config, &args).await
    }
}

async fn run_single_lookup(
    resolver: &Resolver,
    domain: &str,
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    let record = resolver
        .get_whois_data(domain, args.skip_availability_check)
        .await?;

    if args.json {
        let output = json!({
            "domain": domain,
            "available": record.is_none(),
            "cache_hit": record.as_ref().map(|r| r.is_cached).unwrap_or(false),
            "record": record.as_ref().map(|r| &r.value),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        ui::print_lookup_result(domain, record.as_ref(), args.info);
    }

    Ok(())
}

async fn run_bulk_lookup(
    resolver: Resolver,
    domains: &[String],
    config: &LookupConfig,
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    let extractor = resolver.extractor().clone();
    let bulk = BulkProcessor::new(extractor, Arc::new(resolver), config);
    let options = BulkOptions {
        skip_availability_check: args.skip_availability_check,
        max_concurrent: args.concurrency,
    };

    let spinner = (!args.json && !args.verbose && Term::stderr().is_term())
        .then(|| ui::Spinner::start(format!("Looking up {} domains...", domains.len())));

    let started = Instant::now();
    let outcome = bulk.process_bulk(domains, options).await;
    let elapsed = started.elapsed();

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    let results = outcome?;
    let summary = BulkSummary::from_results(&results, elapsed);

    if args.json {
        let output = json!({ "results": results, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for result in &results {
            ui::print_bulk_result(result, args.info);
        }
        println!();
        ui::print_summary(&summary);
    }

    Ok(())
}

/// Layer configuration: file (explicit, `DL_CONFIG` or discovered), then
/// `DL_*` variables, then CLI flags.
fn build_config(args: &Args) -> Result<(LookupConfig, FileConfig), Box<dyn Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config();

    let explicit_path = args.config.as_ref().or(env_config.config.as_ref());
    let file_config = match explicit_path {
        Some(path) => config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?,
        None => config_manager.discover_and_load()?,
    };

    let mut config = file_config.apply_to(LookupConfig::default())?;
    config = env_config.apply_to(config);

    if let Some(concurrency) = args.concurrency {
        config = config.with_default_max_concurrent(concurrency);
    }

    Ok((config, file_config))
}

fn get_domains_to_lookup(args: &Args) -> Result<Vec<String>, Box<dyn Error>> {
    let mut domains: Vec<String> = args
        .domains
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    if let Some(file_path) = &args.file {
        domains.extend(read_domains_from_file(file_path)?);
    }

    if domains.is_empty() {
        return Err("No domains to look up".into());
    }

    Ok(domains)
}

fn read_domains_from_file(file_path: &str) -> Result<Vec<String>, Box<dyn Error>> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};
    use std::path::Path;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {}", file_path).into());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut domains = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Line {}: Error reading line - {}", index + 1, e))?;

        // Handle full-line and inline comments
        let domain = line.split('#').next().unwrap_or("").trim();
        if !domain.is_empty() {
            domains.push(domain.to_string());
        }
    }

    if domains.is_empty() {
        return Err("No valid domains found in the file.".into());
    }

    Ok(domains)
}
