//! `floatcast` CLI - browse subscriptions and play creator videos

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use floatcast::api::ContentFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "floatcast")]
#[command(about = "Creator-subscription video client: resolve, select and play")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/floatcast/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Text,
    /// JSON lines
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    Desc,
}

impl SortOrder {
    fn as_param(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Account username or email
        #[arg(short, long)]
        username: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Two-factor code (prompted when required and omitted)
        #[arg(long)]
        code: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// List subscribed creators
    Subscriptions,

    /// Show a creator's profile and live status
    Creator {
        /// Creator id
        creator: String,
    },

    /// List a creator's videos
    Content {
        /// Creator id
        creator: String,

        /// Page size (1-20)
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Cursor from a previous page
        #[arg(long)]
        after: Option<String>,

        /// Search titles and descriptions
        #[arg(short, long)]
        search: Option<String>,

        /// Release date order
        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// Only posts with this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Released on or after (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,

        /// Released on or before (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },

    /// Resolve playable sources for a content item
    Resolve {
        /// Content (post) id
        content_id: String,

        /// Attachment id (looked up when omitted)
        #[arg(short, long)]
        attachment: Option<String>,

        /// Treat as a live stream
        #[arg(long)]
        live: bool,

        /// Scenario to try first: download, onDemand, live
        #[arg(short, long)]
        scenario: Option<String>,
    },

    /// Play a content item through an external media player
    Play {
        /// Content (post) id
        content_id: String,

        /// Attachment id (looked up when omitted)
        #[arg(short, long)]
        attachment: Option<String>,

        /// Treat as a live stream
        #[arg(long)]
        live: bool,

        /// Source quality label to start with, e.g. 720p
        #[arg(short = 'Q', long)]
        source: Option<String>,

        /// HLS variant: best, worst, or a height like 720
        #[arg(short, long)]
        quality: Option<String>,

        /// Media player (mpv, vlc, ffplay, mplayer, iina)
        #[arg(long)]
        player: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Login {
            username,
            password,
            code,
        } => {
            cmd::cmd_login(&config, &username, password, code).await?;
        }
        Commands::Logout => {
            cmd::cmd_logout()?;
        }
        Commands::Subscriptions => {
            cmd::cmd_subscriptions(&config, cli.format).await?;
        }
        Commands::Creator { creator } => {
            cmd::cmd_creator(&config, &creator, cli.format).await?;
        }
        Commands::Content {
            creator,
            limit,
            after,
            search,
            sort,
            tags,
            from,
            to,
        } => {
            let filter = ContentFilter {
                search,
                sort: sort.map(|s| s.as_param().to_string()),
                tags,
                from_date: from.as_deref().map(|d| cmd::date_bound(d, false)).transpose()?,
                to_date: to.as_deref().map(|d| cmd::date_bound(d, true)).transpose()?,
                channel: None,
            };
            cmd::cmd_content(&config, &creator, &filter, limit, after.as_deref(), cli.format)
                .await?;
        }
        Commands::Resolve {
            content_id,
            attachment,
            live,
            scenario,
        } => {
            cmd::cmd_resolve(
                &config,
                &content_id,
                attachment.as_deref(),
                live,
                scenario.as_deref(),
                cli.format,
            )
            .await?;
        }
        Commands::Play {
            content_id,
            attachment,
            live,
            source,
            quality,
            player,
        } => {
            cmd::cmd_play(
                &config,
                &content_id,
                attachment.as_deref(),
                live,
                source,
                quality.as_deref(),
                player.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
