mod config;
mod feed;
mod normalize;
mod render;
mod store;

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{FeedConfig, EXPORT_BASE_URL, SHEET_ID, SHEET_TAB, TIMEOUT_SECS};
use crate::render::{render_rows, render_text, render_thead, TbodyWriter};
use crate::store::{CompareStore, FilterCriteria, SortKey};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Html,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "deal_compare")]
#[command(about = "Load the challenge comparison sheet and print the filtered, sorted table")]
struct Args {
    /// Spreadsheet id of the comparison feed
    #[arg(long, env = "COMPARE_SHEET_ID", default_value = SHEET_ID)]
    sheet_id: String,

    /// Tab inside the spreadsheet
    #[arg(long, env = "COMPARE_SHEET_TAB", default_value = SHEET_TAB)]
    sheet_tab: String,

    /// Export endpoint base
    #[arg(long, env = "COMPARE_BASE_URL", default_value = EXPORT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "COMPARE_TIMEOUT_SECS", default_value_t = TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Drawdown filter ("All" for any)
    #[arg(long, default_value = "All")]
    drawdown: String,

    /// Account size filter ("All" for any)
    #[arg(long, default_value = "All")]
    account_size: String,

    /// Steps filter ("All" for any)
    #[arg(long, default_value = "All")]
    steps: String,

    /// Price type filter ("All" for any)
    #[arg(long, default_value = "All")]
    price_type: String,

    /// Column header clicks by data-sort name, applied in order (repeat a key to flip direction)
    #[arg(long = "sort", value_parser = parse_sort_key)]
    sort: Vec<SortKey>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

fn parse_sort_key(attr: &str) -> Result<SortKey, String> {
    SortKey::from_attr(attr).ok_or_else(|| {
        let known: Vec<&str> = SortKey::COLUMNS.iter().map(|k| k.attr()).collect();
        format!("unknown sort column '{}' (expected one of: {})", attr, known.join(", "))
    })
}

impl Args {
    fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            sheet_id: self.sheet_id.clone(),
            sheet_tab: self.sheet_tab.clone(),
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn filters(&self) -> FilterCriteria {
        FilterCriteria::from_controls(&self.drawdown, &self.account_size, &self.steps, &self.price_type)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deal_compare=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let config = args.feed_config();
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    let entries = feed::load_entries(&client, &config).await;
    if entries.is_empty() {
        warn!("no comparison entries loaded");
    }

    let mut store = CompareStore::new(entries);
    store.set_filters(args.filters());
    for key in &args.sort {
        store.toggle_sort(*key);
    }

    let visible = store.visible_entries();
    info!(
        visible = visible.len(),
        total = store.entries().len(),
        filters = ?store.filters(),
        sort = ?store.sort(),
        "table ready"
    );

    match args.format {
        OutputFormat::Text => println!("{}", render_text(&visible)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render_rows(&visible))?),
        OutputFormat::Html => {
            drop(visible);
            println!("{}", render_thead(|key| store.header_state(key)));
            // Attach the page body last so only the final state is written.
            let mut store = store.with_target(Box::new(TbodyWriter::stdout()));
            store.render();
        }
    }

    Ok(())
}
