mod brands;
mod config;
mod dictionary;
mod engine;
mod matcher;
mod model;
mod normalizer;
mod storage;

use clap::Parser;
use config::load_config;
use engine::ExtractionEngine;
use storage::{SharedStorage, SqliteStorage};
use tracing::{error, info};

/// Извлечение артикулов автозапчастей из текстов объявлений.
#[derive(Debug, Parser)]
#[command(name = "parts-resolver", version)]
struct Cli {
    /// Path to the application config file.
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Limit the number of processed advertisements.
    #[arg(long)]
    limit: Option<u64>,

    /// Override the batch size from the config.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Only check database availability and exit.
    #[arg(long)]
    test_connection: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration from file
    let mut config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }

    // Initialize storage (SQLite)
    let storage = match SqliteStorage::new(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize storage: {e}");
            std::process::exit(1);
        }
    };

    if cli.test_connection {
        info!("Checking database availability...");
        let code = match (storage.count_advertisements(), storage.count_resolved()) {
            (Ok(ads), Ok(resolved)) => {
                info!("advertisements table available ({ads} rows)");
                info!("parts_resolved table available ({resolved} rows)");
                info!("Connection test finished successfully");
                0
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("Connection test failed: {e}");
                1
            }
        };
        std::process::exit(code);
    }

    info!("Launch parameters:");
    info!("  - ad limit: {}", cli.limit.map_or("none".to_string(), |l| l.to_string()));
    info!("  - batch size: {}", config.batch_size);
    info!("  - automaton caching: disabled (always rebuilt from the dictionary)");

    let shared = SharedStorage::new(storage);
    let mut engine = ExtractionEngine::new(config);

    // Build phase: dictionary + automatons. Fatal errors abort the run.
    if let Err(e) = engine.load_dictionary() {
        error!("Dictionary load failed: {e}");
        std::process::exit(1);
    }
    if let Err(e) = engine.build_automatons() {
        error!("Automaton build failed: {e}");
        std::process::exit(1);
    }

    // Process all pending advertisements
    let stats = match engine.process(&shared, &shared, cli.limit).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Extraction failed: {e}");
            std::process::exit(1);
        }
    };

    info!("============================================================");
    info!("RUN SUMMARY");
    info!("============================================================");
    info!("Total time: {:.1}s", stats.processing_secs);
    info!("Processed ads: {}", stats.total_processed);
    if stats.total_processed > 0 {
        let speed = stats.total_processed as f64 / stats.processing_secs.max(f64::EPSILON);
        info!("Average speed: {speed:.1} ads/sec");
        info!(
            "Ads with articles: {} ({:.1}%)",
            stats.articles_found,
            stats.articles_found as f64 * 100.0 / stats.total_processed as f64
        );
        info!(
            "Ads with brands: {} ({:.1}%)",
            stats.brands_found,
            stats.brands_found as f64 * 100.0 / stats.total_processed as f64
        );
        info!("Saved to database: {}", stats.total_saved);
        if stats.save_errors > 0 {
            info!("Save errors: {}", stats.save_errors);
        }
    }
}
