//! Fallback binary entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use shared::ExecutionRequest;
use shared::logging::{init_tracing, log_startup};

use fallback::core::summarize;
use fallback::services::{EnvCredentialSource, FileResultCache, JsonlMetricsSink, RealHttpTransport, SystemClock};
use fallback::{FallbackConfig, FallbackEngine, ProviderRegistry};

#[derive(Parser)]
#[command(name = "fallback")]
#[command(about = "Run text generation through an ordered chain of LLM providers")]
struct Args {
    /// Log level for fallback components (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// JSON provider catalog replacing the built-in one
    #[arg(long, global = true)]
    providers_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate text for one request
    Generate {
        /// Free-form category, used for metrics only
        #[arg(long, default_value = "general")]
        task_type: String,

        #[arg(long, default_value = "")]
        system: String,

        #[arg(long)]
        prompt: String,

        #[arg(long, default_value_t = 1000)]
        max_tokens: u32,

        #[arg(long, default_value_t = 0.7)]
        temperature: f32,

        /// Skip cache lookup and cache write
        #[arg(long)]
        no_cache: bool,

        /// Abandon the execution after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered providers and whether they are configured
    Providers,
    /// Summarize recorded executions for a month
    Summary {
        /// Period in YYYY-MM form, defaults to the current month
        #[arg(long)]
        period: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    EnvCredentialSource::load_dotenv();
    init_tracing(args.log_level.as_deref());

    let mut config = FallbackConfig::from_env().context("invalid FALLBACK_* configuration")?;
    if let Some(path) = args.providers_file {
        config.providers_file = Some(path);
    }

    let registry = match &config.providers_file {
        Some(path) => ProviderRegistry::from_file(path).await?,
        None => ProviderRegistry::with_default_catalog()?,
    };

    match args.command {
        Command::Generate {
            task_type,
            system,
            prompt,
            max_tokens,
            temperature,
            no_cache,
            deadline_secs,
            json,
        } => {
            log_startup(&format!(
                "fallback generate ({} providers, max_retries={}, failure_threshold={})",
                registry.len(),
                config.max_retries,
                config.failure_threshold
            ));

            let clock = Arc::new(SystemClock);
            let cache = FileResultCache::new(&config.cache_dir, config.cache_freshness, clock);
            let metrics = JsonlMetricsSink::new(&config.metrics_dir);
            let engine = FallbackEngine::new(
                &config,
                registry,
                RealHttpTransport::new(),
                EnvCredentialSource::new(),
                cache,
                metrics,
            );

            let request = ExecutionRequest::new(task_type, system, prompt)
                .with_max_tokens(max_tokens)
                .with_temperature(temperature)
                .with_cache(!no_cache);

            let result = match deadline_secs {
                Some(secs) => engine.execute_with_deadline(&request, Duration::from_secs(secs)).await,
                None => engine.execute(&request).await,
            };

            engine.metrics_sink().flush().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.succeeded {
                println!("{}", result.response_text);
            } else {
                eprintln!("{}", result.response_text);
            }

            if !result.succeeded {
                std::process::exit(1);
            }
        }
        Command::Providers => {
            let credentials = EnvCredentialSource::new();
            println!("{:<12} {:>8} {:<20} {:<10} MODEL", "ID", "PRIORITY", "KIND", "STATUS");
            for spec in registry.list() {
                let status = if registry.is_configured(spec, &credentials).await {
                    "ready"
                } else {
                    "no key"
                };
                println!(
                    "{:<12} {:>8} {:<20} {:<10} {}",
                    spec.id,
                    spec.priority,
                    format!("{:?}", spec.kind),
                    status,
                    spec.model
                );
            }
        }
        Command::Summary { period } => {
            let period = period.unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());
            let sink = JsonlMetricsSink::new(&config.metrics_dir);
            let records = sink.read_period(&period).await?;
            let summary = summarize(&records);

            println!("Period {period}: {} executions", summary.executions);
            println!("  success rate:    {:.1}%", summary.success_rate() * 100.0);
            println!("  cache hit rate:  {:.1}%", summary.cache_hit_rate() * 100.0);
            println!("  avg duration:    {:.0} ms", summary.avg_duration_ms());
            println!("  avg fallbacks:   {:.2}", summary.avg_fallback_count());
            for (provider_id, tally) in &summary.by_provider {
                println!(
                    "  {:<12} {:>5} attempts  {:>5.1}% ok  {:>7.0} ms avg",
                    provider_id,
                    tally.attempts,
                    tally.success_rate() * 100.0,
                    tally.avg_duration_ms()
                );
            }
        }
    }

    Ok(())
}
