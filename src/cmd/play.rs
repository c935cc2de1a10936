use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use floatcast::stream::backends::{HttpSegmentLoader, NativeRenderer, VariantChoice};
use floatcast::stream::keys::{HttpKeyChannel, KeyBridge, KeyCache, KeyChannel, NoKeyChannel};
use floatcast::stream::player::PLAYBACK_FINISHED;
use floatcast::{
    Config, ContentItem, DeliveryResolver, LoadCoordinator, PlaybackError, Player, PlayerEvent,
};

use super::api_client;

enum Exit {
    Finished,
    PlayerExited,
    Interrupted,
    Failed(PlaybackError),
}

pub async fn cmd_play(
    config: &Config,
    content_id: &str,
    attachment: Option<&str>,
    live: bool,
    source: Option<String>,
    quality: Option<&str>,
    player: Option<&str>,
) -> Result<()> {
    let variant: VariantChoice = quality
        .unwrap_or(&config.player.quality)
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    let player_cmd = player.unwrap_or(&config.player.command);
    let player_path = which::which(player_cmd)
        .map_err(|_| anyhow!("{player_cmd} not found in PATH. Install it or pass --player."))?;

    let mut item = ContentItem::new(content_id);
    if let Some(attachment) = attachment {
        item = item.with_attachment(attachment);
    }
    if live {
        item = item.live();
    }

    let api = api_client(config)?;
    let coordinator = Arc::new(
        LoadCoordinator::new(DeliveryResolver::new(api))
            .with_preferred_scenario(config.playback.preferred_scenario),
    );

    eprintln!("🎬 Piping to: {player_cmd}");
    let mut child = tokio::process::Command::new(&player_path)
        .args(get_player_stdin_args(player_cmd))
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {player_cmd}: {e}"))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("Failed to get stdin for {player_cmd}"))?;

    let client = reqwest::Client::builder()
        .user_agent(config.api.user_agent.as_str())
        .use_rustls_tls()
        .connect_timeout(Duration::from_secs(10))
        .read_timeout(config.player.read_timeout())
        .build()?;
    let channel: Arc<dyn KeyChannel> = match &config.keys.endpoint {
        Some(endpoint) => Arc::new(HttpKeyChannel::new(endpoint.clone())?),
        None => Arc::new(NoKeyChannel),
    };
    let key_cache = KeyCache::new();
    let loader = KeyBridge::new(HttpSegmentLoader::new(client.clone()), channel, key_cache.clone())
        .with_pattern(&config.keys.pattern)?;
    let renderer = NativeRenderer::new(client, Arc::new(loader), stdin).with_variant(variant);

    let (handle, mut events) =
        Player::spawn(coordinator, renderer, key_cache, config.playback.clone());
    handle.play_with_quality(item, source)?;

    let exit = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PlayerEvent::Phase { phase, .. }) => eprintln!("   ▶ {phase}"),
                Ok(PlayerEvent::SourceChanged { source, .. }) => {
                    eprintln!("📺 Source: {} ({})", source.label(), source.url);
                }
                Ok(PlayerEvent::Info(message)) if message == PLAYBACK_FINISHED => break Exit::Finished,
                Ok(PlayerEvent::Info(message)) => eprintln!("   ⚠️  {message}"),
                Ok(PlayerEvent::Error(err)) => break Exit::Failed(err),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped player events"),
                Err(RecvError::Closed) => break Exit::Finished,
            },
            status = child.wait() => {
                if let Ok(status) = status {
                    eprintln!("   {player_cmd} exited ({status})");
                }
                break Exit::PlayerExited;
            }
            _ = tokio::signal::ctrl_c() => break Exit::Interrupted,
        }
    };

    // Shutdown releases the renderer, which closes the player's stdin.
    let _ = handle.shutdown();

    match exit {
        Exit::Finished => {
            child.wait().await?;
            eprintln!("✅ Done");
            Ok(())
        }
        Exit::PlayerExited => Ok(()),
        Exit::Interrupted => {
            let _ = child.kill().await;
            eprintln!("⏹  Stopped");
            Ok(())
        }
        Exit::Failed(err) => {
            let _ = child.kill().await;
            if err.is_terminal() {
                bail!("Playback failed: {err}");
            }
            Err(err.into())
        }
    }
}

fn get_player_stdin_args(player: &str) -> Vec<&'static str> {
    match player {
        "vlc" => vec!["-", "--intf", "dummy", "--play-and-exit"],
        "ffplay" => vec!["-i", "-"],
        "iina" => vec!["--stdin"],
        _ => vec!["-"],
    }
}
