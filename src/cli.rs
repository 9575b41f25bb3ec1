//! Command-line front end.
//!
//! Thin shell over the library: builds a `ProviderConfig` from the
//! environment (plus flag overrides), runs one operation, prints JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::batch::{self, BatchItemOutcome, BatchRunner};
use crate::config::{self, ProviderConfig};
use crate::error::RecognitionError;
use crate::history::MemoryHistory;
use crate::llm::provider::{self, Dialect, ProviderTag};
use crate::llm::transport::HttpTransport;
use crate::llm::types::{Category, ImageInput, RecognitionRequest, RecognitionResult};
use crate::pipeline::Recognizer;

#[derive(Parser)]
#[command(name = "vision-relay")]
#[command(about = "Recognize images with AI vision providers and self-hosted relays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct ProviderArgs {
    /// Provider tag (gemini, openai, openrouter, claude, deepseek, custom)
    #[arg(long)]
    provider: Option<ProviderTag>,
    /// Model name; the provider default when omitted
    #[arg(long)]
    model: Option<String>,
    /// API endpoint (base URL or full relay URL)
    #[arg(long)]
    endpoint: Option<String>,
    /// Treat the endpoint as a self-hosted relay
    #[arg(long)]
    self_hosted: bool,
}

impl ProviderArgs {
    fn resolve(&self) -> Result<ProviderConfig, String> {
        let mut config = match self.provider {
            Some(tag) => ProviderConfig::from_env_for(Some(tag)),
            None => ProviderConfig::from_env(),
        }
        .map_err(|e| e.to_string())?;
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.api_endpoint = endpoint.clone();
        }
        if self.self_hosted {
            config.is_self_hosted = true;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize one image
    Recognize {
        file: PathBuf,
        /// Content category, or "auto" to classify first
        #[arg(long, default_value = "auto")]
        category: Category,
        /// Replace the recognition prompt (disables classification)
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Check that the endpoint is reachable with the configured key
    Probe {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Recognize several images one after another
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "auto")]
        category: Category,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Run one image through several vendor providers
    Compare {
        file: PathBuf,
        /// Provider to include; repeat for each
        #[arg(long = "with", required = true)]
        providers: Vec<ProviderTag>,
        #[arg(long, default_value = "auto")]
        category: Category,
    },
    /// List known providers and whether a key is configured
    Providers,
    /// Store a provider API key in the OS keychain (key read from stdin)
    SetKey { provider: ProviderTag },
}

pub async fn run() -> Result<(), String> {
    let loaded = config::load_env_files();
    env_logger::init();
    for path in &loaded {
        log::info!("[STARTUP] Loaded {}", path.display());
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Recognize {
            file,
            category,
            prompt,
            provider,
        } => {
            let config = provider.resolve()?;
            let mut request = RecognitionRequest::new(read_image(&file).await?, category);
            if let Some(prompt) = prompt {
                request = request.with_prompt(prompt);
            }
            let result = Recognizer::http()
                .recognize(&request, &config)
                .await
                .map_err(|e| describe_error(&e))?;
            print_json(&result)
        }
        Commands::Probe { provider } => {
            let config = provider.resolve()?;
            let outcome = Recognizer::http().probe_connection(&config).await;
            print_json(&outcome)?;
            if outcome.reachable {
                Ok(())
            } else {
                Err(outcome.message)
            }
        }
        Commands::Batch {
            files,
            category,
            provider,
        } => {
            let config = provider.resolve()?;
            let mut requests = Vec::with_capacity(files.len());
            for file in &files {
                requests.push(RecognitionRequest::new(read_image(file).await?, category));
            }

            let history = Arc::new(MemoryHistory::new());
            let recognizer = Recognizer::builder(Arc::new(HttpTransport::new()))
                .history(history.clone())
                .build();
            let runner = BatchRunner::new(recognizer.options().batch_delay);
            let outcomes = runner
                .run_with(&recognizer, &requests, &config, |outcome| {
                    log::info!(
                        "[BATCH] {} {}",
                        outcome.source_name.as_deref().unwrap_or("-"),
                        if outcome.result.is_ok() { "done" } else { "failed" }
                    );
                })
                .await;
            log::info!("[BATCH] {} of {} recorded", history.len(), outcomes.len());
            let report: Vec<_> = outcomes.iter().map(batch_item_json).collect();
            print_json(&report)
        }
        Commands::Compare {
            file,
            providers,
            category,
        } => {
            let configs = providers
                .iter()
                .map(|tag| ProviderConfig::for_provider(*tag).map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            let request = RecognitionRequest::new(read_image(&file).await?, category);
            let recognizer = Recognizer::http();
            let comparisons = batch::compare_providers(
                &recognizer,
                &request,
                &configs,
                recognizer.options().batch_delay,
            )
            .await;
            let report: Vec<_> = comparisons
                .iter()
                .map(|c| {
                    json!({
                        "provider": c.provider,
                        "elapsedMs": c.elapsed.as_millis() as u64,
                        "outcome": result_json(&c.result),
                    })
                })
                .collect();
            print_json(&report)
        }
        Commands::Providers => {
            let report: Vec<_> = provider::all_providers()
                .into_iter()
                .zip(Dialect::ALL)
                .map(|(info, dialect)| {
                    json!({
                        "provider": info,
                        "configured": provider::is_provider_configured(dialect),
                    })
                })
                .collect();
            print_json(&report)
        }
        Commands::SetKey { provider } => {
            let Some(dialect) = provider.dialect() else {
                return Err("keys are stored per vendor provider; use VISION_API_KEY for relays".into());
            };
            let mut key = String::new();
            std::io::stdin()
                .read_line(&mut key)
                .map_err(|e| format!("Failed to read key: {}", e))?;
            let key = key.trim();
            if key.is_empty() {
                return Err("empty key".into());
            }
            config::store_keychain_key(dialect.id(), key)?;
            print_json(&json!({ "provider": dialect.id(), "stored": true }))
        }
    }
}

async fn read_image(path: &Path) -> Result<ImageInput, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let mut image = ImageInput::from_bytes(bytes);
    if let Some(name) = path.file_name() {
        image = image.with_source_name(name.to_string_lossy());
    }
    Ok(image)
}

fn describe_error(err: &RecognitionError) -> String {
    if err.retryable() {
        format!("{} (retryable)", err)
    } else {
        err.to_string()
    }
}

fn result_json(result: &Result<RecognitionResult, RecognitionError>) -> serde_json::Value {
    match result {
        Ok(result) => json!({ "result": result }),
        Err(e) => json!({ "error": e.to_string(), "retryable": e.retryable() }),
    }
}

fn batch_item_json(outcome: &BatchItemOutcome) -> serde_json::Value {
    json!({
        "index": outcome.index,
        "source": outcome.source_name,
        "outcome": result_json(&outcome.result),
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
