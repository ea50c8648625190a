//! dao-binder - Main entry point.
//!
//! Runs one SQL statement through the execution engine and prints the result
//! as JSON lines.

use clap::Parser;
use dao_binder::bind::classify_sql;
use dao_binder::config::{Config, DaoConfig};
use dao_binder::dao::CommonDao;
use dao_binder::models::{Page, SqlValue};
use futures_util::StreamExt;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Command line values are bound as integers, floats, booleans or text.
fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        SqlValue::Bool(b)
    } else {
        SqlValue::from(raw)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut dao_config = DaoConfig::parse(&config.database)?;
    if let Some(fetch_size) = config.fetch_size {
        dao_config = dao_config.with_fetch_size(fetch_size);
    }
    let dao = CommonDao::connect(dao_config).await?;
    let params: Vec<SqlValue> = config.params.iter().map(|p| parse_param(p)).collect();

    let kind = classify_sql(&config.sql, dao.db_type())?;
    let result = if !kind.is_query() {
        let affected = dao.execute(&config.sql, &params).await?;
        print_json(&serde_json::json!({ "rows_affected": affected }))
    } else if let Some(page_num) = config.page {
        let page = Page::new(page_num, config.page_size);
        let result = dao.query_page_records(&config.sql, &params, page).await?;
        print_json(&result)
    } else if config.stream {
        let mut rows = dao.with_stream().query(&config.sql, &params);
        let mut streamed = Ok(());
        while let Some(row) = rows.next().await {
            match row {
                Ok(record) => print_json(&record)?,
                Err(e) => {
                    streamed = Err(e.into());
                    break;
                }
            }
        }
        rows.close().await;
        streamed
    } else {
        for record in dao.query(&config.sql, &params).await? {
            print_json(&record)?;
        }
        Ok(())
    };

    dao.close().await;
    result
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting dao-binder");

    if let Err(e) = run(&config).await {
        error!(error = %e, "Execution failed");
        return Err(e);
    }
    Ok(())
}
