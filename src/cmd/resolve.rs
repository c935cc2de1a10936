use anyhow::{anyhow, Result};

use floatcast::stream::selector;
use floatcast::{Config, DeliveryResolver, Scenario};

use super::api_client;
use crate::OutputFormat;

pub async fn cmd_resolve(
    config: &Config,
    content_id: &str,
    attachment: Option<&str>,
    live: bool,
    scenario: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let requested = match scenario {
        Some(s) => Some(Scenario::parse(s).ok_or_else(|| anyhow!("unknown scenario '{s}'"))?),
        None => config.playback.preferred_scenario,
    };

    let resolver = DeliveryResolver::new(api_client(config)?);
    let resolution = resolver
        .resolve(content_id, attachment, live, requested)
        .await?;
    let default = selector::pick(&resolution.sources);

    match format {
        OutputFormat::Json => {
            for source in &resolution.sources {
                println!("{}", serde_json::to_string(source)?);
            }
        }
        OutputFormat::Text => {
            println!(
                "🎬 {} sources via {} (HTTP {})",
                resolution.sources.len(),
                resolution.scenario_used,
                resolution.status
            );
            for (i, source) in resolution.sources.iter().enumerate() {
                let marker = if Some(i) == default { "*" } else { " " };
                println!(
                    "{marker} {:<10} {:<22} {}",
                    source.label(),
                    source.container.mime(),
                    source.url
                );
            }
        }
    }
    Ok(())
}
