use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate};

use floatcast::api::{ContentApi, ContentFilter, Cursor};
use floatcast::Config;

use super::api_client;
use crate::OutputFormat;

pub async fn cmd_subscriptions(config: &Config, format: OutputFormat) -> Result<()> {
    let api = api_client(config)?;
    let creators = api.subscriptions().await?;

    match format {
        OutputFormat::Json => {
            for creator in &creators {
                println!("{}", serde_json::to_string(creator)?);
            }
        }
        OutputFormat::Text => {
            if creators.is_empty() {
                println!("No subscriptions");
            }
            for creator in &creators {
                println!("{:<28} {}", creator.id, creator.title);
            }
        }
    }
    Ok(())
}

pub async fn cmd_creator(config: &Config, creator: &str, format: OutputFormat) -> Result<()> {
    let api = api_client(config)?;
    let info = api.creator_info(creator).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&info)?),
        OutputFormat::Text => {
            println!("{} ({})", info.title, info.id);
            match info.on_air() {
                Some(live) => {
                    let state = live.state.as_deref().unwrap_or_default();
                    println!("🔴 Live ({state}): {}", live.title);
                    if !live.description.is_empty() {
                        println!("   {}", live.description);
                    }
                    if let Some(item) = live.to_content_item() {
                        let attachment = item.resolved_attachment_id().unwrap_or_default();
                        println!("   floatcast play {} --live --attachment {attachment}", item.id);
                    }
                }
                None => println!("Offline"),
            }
        }
    }
    Ok(())
}

/// `--from`/`--to` bound: an RFC 3339 timestamp passes through, a bare
/// date covers the whole day.
pub(crate) fn date_bound(value: &str, end_of_day: bool) -> Result<String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.to_rfc3339());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date '{value}': expected YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day { "23:59:59" } else { "00:00:00" };
    Ok(format!("{date}T{time}Z"))
}

pub async fn cmd_content(
    config: &Config,
    creator: &str,
    filter: &ContentFilter,
    limit: u32,
    after: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let api = api_client(config)?;
    let cursor = after.map(|a| {
        a.parse::<u64>()
            .map_or_else(|_| Cursor::Token(a.to_string()), Cursor::Offset)
    });
    let page = api.creator_content(creator, filter, limit, cursor.as_ref()).await?;

    match format {
        OutputFormat::Json => {
            for item in &page.items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
        OutputFormat::Text => {
            for item in &page.items {
                let date = item
                    .release_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                let live = if item.is_live { " [live]" } else { "" };
                println!("{:<12} {:<10} {}{live}", item.id, date, item.title);
            }
            println!("\n({} items)", page.items.len());
        }
    }

    if page.has_more {
        if let Some(next) = page.next_cursor {
            eprintln!("More: --after {next}");
        }
    }
    Ok(())
}
