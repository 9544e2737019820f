//! A message-board page loader in front of a slow "database".
//!
//! Run with `RUST_LOG=servercache=debug cargo run --example message_board`
//! to watch misses, joins and background refreshes.

use serde_json::{Value, json};
use servercache::{CacheError, Pagination, global, keys, paginate, parse_page};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const MESSAGES_PER_PAGE: u64 = 10;
const MESSAGE_TTL: Duration = Duration::from_secs(5 * 60);
const USER_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const TOTAL_MESSAGES: u64 = 37;

/// Stand-in for `select count(*) ... where status = 'approved'`.
async fn count_messages() -> servercache::Result<Value> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(json!(TOTAL_MESSAGES))
}

/// Stand-in for a filtered, sorted, ranged select.
async fn select_messages(range_start: u64, range_end: u64) -> servercache::Result<Value> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let last = range_end.min(TOTAL_MESSAGES.saturating_sub(1));
    let rows: Vec<Value> = (range_start..=last)
        .map(|id| json!({ "id": id, "status": "approved", "body": format!("message #{id}") }))
        .collect();
    Ok(Value::Array(rows))
}

async fn load_index(raw_page: Option<&str>) -> Result<(Value, Pagination), CacheError> {
    let count = global()
        .get_or_set(&keys::resource_count("index:messages"), count_messages, MESSAGE_TTL)
        .await?;
    let pagination = paginate(
        count.as_u64().unwrap_or(0),
        MESSAGES_PER_PAGE,
        parse_page(raw_page),
    )?;

    let (range_start, range_end) = (pagination.range_start, pagination.range_end);
    let rows = global()
        .get_or_set(
            &keys::index_messages(pagination.current_page),
            move || select_messages(range_start, range_end),
            MESSAGE_TTL,
        )
        .await?;

    Ok((rows, pagination))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Cold load ===");
    let started = Instant::now();
    let (data, pagination) = load_index(Some("2")).await?;
    println!(
        "page {}/{} with {} rows in {:?}",
        pagination.current_page,
        pagination.total_pages,
        data.as_array().map_or(0, Vec::len),
        started.elapsed()
    );

    println!("\n=== Warm load ===");
    let started = Instant::now();
    let (_, pagination) = load_index(Some("2")).await?;
    println!("page {} again in {:?}", pagination.current_page, started.elapsed());

    println!("\n=== Concurrent cold loads share one query ===");
    let started = Instant::now();
    let loads: Vec<_> = (0..8)
        .map(|_| tokio::spawn(async { load_index(Some("3")).await }))
        .collect();
    for load in loads {
        load.await??;
    }
    println!("8 loads of page 3 in {:?}", started.elapsed());

    println!("\n=== Garbage page parameter ===");
    let (_, pagination) = load_index(Some("not-a-number")).await?;
    println!("`not-a-number` reads as page {}", pagination.current_page);

    println!("\n=== Background user lookup ===");
    let user_key = keys::user_info("user_42");
    if global().get(&user_key).await.is_none() {
        global()
            .refresh_in_background(
                user_key.as_str(),
                || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(json!({ "id": "user_42", "name": "Ada" }))
                },
                USER_TTL,
            )
            .await?;
    }
    println!("cached user: {}", global().get(&user_key).await.unwrap_or(Value::Null));

    println!("\n=== Stats ===");
    println!("{}", serde_json::to_string_pretty(&global().stats().await)?);

    Ok(())
}
