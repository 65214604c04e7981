//! Feed Sync - wine shop catalog sync
//!
//! Pulls the stock and product CSV feeds, prices every product and brings
//! the Airtable table in line. Runs once, or serves an HTTP trigger.

use clap::Parser;
use feed_sync::{run_once, CostPolicy, SyncConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Sync stock & product feeds into an Airtable table
#[derive(Parser, Debug)]
#[command(name = "feed_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Airtable personal access token
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Airtable base id
    #[arg(long, env = "AIRTABLE_BASE_ID")]
    base_id: Option<String>,

    /// Airtable table name
    #[arg(long, env = "AIRTABLE_TABLE_NAME")]
    table_name: Option<String>,

    /// URL of the stock CSV feed
    #[arg(long, env = "STOCK_CSV_URL")]
    stock_csv_url: Option<String>,

    /// URL of the product data CSV feed
    #[arg(long, env = "PRODUCT_CSV_URL")]
    product_csv_url: Option<String>,

    /// Airtable API root
    #[arg(long, env = "AIRTABLE_API_URL", default_value = feed_sync::table::DEFAULT_API_URL)]
    api_url: String,

    /// Records per write request (1-10)
    #[arg(long, env = "FEED_SYNC_BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    /// Minimum gap between remote requests, in milliseconds
    #[arg(long, env = "FEED_SYNC_RATE_LIMIT_MS", default_value_t = 200)]
    rate_limit_ms: u64,

    /// Retries per batch on throttling or server errors
    #[arg(long, env = "FEED_SYNC_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// JSON field map replacing the built-in wine catalog map
    #[arg(long, env = "FEED_SYNC_FIELD_MAP")]
    field_map: Option<PathBuf>,

    /// Price unparseable costs as 0 instead of aborting the run
    #[arg(long, env = "FEED_SYNC_LENIENT_COST", default_value_t = false)]
    lenient_cost: bool,

    /// Log the planned changes without writing them
    #[arg(long, env = "FEED_SYNC_DRY_RUN", default_value_t = false)]
    dry_run: bool,

    /// Serve the HTTP trigger on this port instead of running once
    #[arg(long, env = "FEED_SYNC_WEB_PORT")]
    web_port: Option<u16>,
}

impl Args {
    fn into_config(self) -> SyncConfig {
        let mut config = SyncConfig::new(
            self.api_key.unwrap_or_default(),
            self.base_id.unwrap_or_default(),
            self.table_name.unwrap_or_default(),
            self.stock_csv_url.unwrap_or_default(),
            self.product_csv_url.unwrap_or_default(),
        )
        .with_rate_limit_delay(Duration::from_millis(self.rate_limit_ms));

        config.api_url = self.api_url;
        config.batch.batch_size = self.batch_size;
        config.batch.max_retries = self.max_retries;
        config.field_map = self.field_map;
        config.dry_run = self.dry_run;
        if self.lenient_cost {
            config.cost_policy = CostPolicy::ZeroOnInvalid;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let web_port = args.web_port;
    let config = args.into_config();

    log::info!("Starting feed_sync...");

    if let Err(e) = config.validate().and_then(|_| config.field_mapper()) {
        log::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Some(port) = web_port {
        if let Err(e) = feed_sync::web::serve(config, port).await {
            log::error!("Web server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    match run_once(config).await {
        Ok(report) => {
            log::info!(
                "Done: {} merged, {} remote, {} updated, {} created, {} deleted",
                report.merged,
                report.remote,
                report.updates,
                report.creates,
                report.deletes
            );
        }
        Err(e) => {
            log::error!("Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}
