//! cardcast: replay bot updates through the prediction engine and manage
//! its persisted state.
//!
//! Usage:
//!   cardcast replay --input updates.jsonl     # dry run, prints a summary
//!   cardcast replay --bot-token $TOKEN        # deliver for real, updates on stdin
//!   cardcast status                           # channels, tally, learned rules
//!   cardcast learn | revert                   # toggle learned rules
//!   cardcast bind --role source --chat-id -1001234

mod display;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cardcast_core::{
    CardToken, ChannelBindingAction, ChannelRole, Engine, EngineConfig, Rank, RuleControl,
    select_engine,
};
use cardcast_relay::update::bot_id_from_token;
use cardcast_relay::{Delivery, Dispatcher, RecordingDelivery, TelegramClient, Update};
use cardcast_store::JsonDirStore;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info, warn};

use crate::display::ReplaySummary;

#[derive(Parser)]
#[command(name = "cardcast")]
#[command(about = "Card game prediction relay")]
#[command(version)]
struct Cli {
    /// Directory holding the persisted engine state
    #[arg(long, env = "CARDCAST_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Rank to forecast
    #[arg(long, env = "CARDCAST_TARGET_RANK", default_value = "K", value_parser = parse_rank, global = true)]
    target_rank: Rank,

    /// Card that fires the static prediction rule
    #[arg(long, env = "CARDCAST_TRIGGER_CARD", default_value = "10♥️", global = true)]
    trigger_card: CardToken,

    /// Total score at or above which a prediction fires
    #[arg(long, env = "CARDCAST_SCORE_THRESHOLD", default_value_t = 45, global = true)]
    score_threshold: u32,

    /// Games since the last outcome beyond which a prediction fires
    #[arg(long, env = "CARDCAST_GAP_THRESHOLD", default_value_t = cardcast_core::config::DEFAULT_GAP_THRESHOLD, global = true)]
    gap_threshold: u32,

    /// Distance from trigger game to predicted game
    #[arg(long, env = "CARDCAST_OFFSET", default_value_t = 2, global = true)]
    offset: u32,

    /// Games kept in the correlation window
    #[arg(long, env = "CARDCAST_WINDOW", default_value_t = cardcast_core::config::DEFAULT_WINDOW, global = true)]
    window: u32,

    /// Minimum seconds between predictions
    #[arg(long, env = "CARDCAST_COOLDOWN_SECS", default_value_t = 30, global = true)]
    cooldown_secs: i64,

    /// Number of learned trigger rules kept
    #[arg(long, env = "CARDCAST_TOP_RULES", default_value_t = 3, global = true)]
    top_rules: usize,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            target_rank: self.target_rank,
            trigger_card: self.trigger_card,
            score_threshold: self.score_threshold,
            gap_threshold: self.gap_threshold,
            offset: self.offset,
            window: self.window,
            cooldown_secs: self.cooldown_secs,
            top_rules: self.top_rules,
            ..EngineConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Feed JSON-lines bot updates through the dispatcher
    Replay {
        /// Input file (or - for stdin)
        #[arg(long, default_value = "-")]
        input: String,

        /// Deliver through the Bot API instead of recording
        #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,

        /// Bot API server
        #[arg(long, env = "TELEGRAM_API_URL", default_value = cardcast_relay::telegram::DEFAULT_API_URL)]
        api_url: String,
    },

    /// Show channels, prediction tally and learned rules
    Status,

    /// Recompute learned rules from collected samples and enable them
    Learn,

    /// Disable learned rules; static rules only
    Revert,

    /// Bind a chat to the source or output role
    Bind {
        /// source or output
        #[arg(long)]
        role: ChannelRole,

        /// Chat id (channel ids are negative)
        #[arg(long, allow_hyphen_values = true)]
        chat_id: i64,
    },
}

fn parse_rank(s: &str) -> Result<Rank, String> {
    Rank::parse(s).ok_or_else(|| format!("not a card rank: {s}"))
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

fn open_engine(data_dir: &Path, config: EngineConfig) -> Result<Box<dyn Engine>> {
    let store = JsonDirStore::open(data_dir)
        .with_context(|| format!("failed to open state directory {}", data_dir.display()))?;
    Ok(select_engine(store, config))
}

async fn replay<D: Delivery>(dispatcher: &mut Dispatcher<D>, input: &str) -> Result<ReplaySummary> {
    let body = read_input(input)?;
    let mut summary = ReplaySummary::default();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let outcome = match serde_json::from_str::<Update>(line) {
            Ok(update) => {
                let now = update.timestamp().unwrap_or_else(Utc::now);
                dispatcher.handle_update(&update, now).await
            }
            Err(_) => dispatcher.handle_raw(line, Utc::now()).await,
        };
        summary.add(&outcome);
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();
    info!("cardcast v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.engine.config();
    let mut engine = open_engine(&cli.data_dir, config)?;

    match cli.command {
        Commands::Replay {
            input,
            bot_token,
            api_url,
        } => {
            let summary = match bot_token {
                Some(token) => {
                    let client = TelegramClient::with_api_url(&api_url, &token)?;
                    let bot_id = match client.get_me().await {
                        Ok(id) => Some(id),
                        Err(e) => {
                            warn!(error = %e, "getMe failed, using token prefix");
                            bot_id_from_token(&token)
                        }
                    };
                    let mut dispatcher = Dispatcher::new(engine, client).with_bot_id(bot_id);
                    let summary = replay(&mut dispatcher, &input).await?;
                    display::print_replay_summary(&summary, false);
                    summary
                }
                None => {
                    let mut dispatcher = Dispatcher::new(engine, RecordingDelivery::new());
                    let summary = replay(&mut dispatcher, &input).await?;
                    for call in dispatcher.delivery().calls() {
                        println!("{call:?}");
                    }
                    display::print_replay_summary(&summary, true);
                    summary
                }
            };
            if summary.updates > 0 && summary.rejected == summary.updates {
                bail!("every update in {input} was rejected");
            }
        }
        Commands::Status => {
            display::print_status(&engine.status(), &engine.channels(), &engine.tally());
        }
        Commands::Learn => {
            ensure_enabled(engine.as_ref())?;
            let report = engine.apply_control(RuleControl::ApplyLearnedRules);
            println!("{}", report.text);
        }
        Commands::Revert => {
            ensure_enabled(engine.as_ref())?;
            let report = engine.apply_control(RuleControl::RevertToStaticOnly);
            println!("{}", report.text);
        }
        Commands::Bind { role, chat_id } => {
            ensure_enabled(engine.as_ref())?;
            let changed = engine.bind_channel(ChannelBindingAction { role, chat_id });
            println!(
                "{role} channel {} {chat_id}",
                if changed { "set to" } else { "already" }
            );
        }
    }

    Ok(())
}

fn ensure_enabled(engine: &dyn Engine) -> Result<()> {
    if engine.is_enabled() {
        Ok(())
    } else {
        bail!("{}", engine.status().text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_engine_defaults() {
        let cli = Cli::try_parse_from(["cardcast", "status"]).unwrap();
        assert_eq!(cli.engine.config(), EngineConfig::default());
    }

    #[test]
    fn engine_knobs_parse() {
        let cli = Cli::try_parse_from([
            "cardcast",
            "replay",
            "--target-rank",
            "q",
            "--trigger-card",
            "J♠",
            "--offset",
            "3",
        ])
        .unwrap();
        let config = cli.engine.config();
        assert_eq!(config.target_rank, Rank::Queen);
        assert_eq!(config.trigger_card.to_string(), "J♠️");
        assert_eq!(config.offset, 3);
    }

    #[test]
    fn bind_accepts_negative_chat_id() {
        let cli =
            Cli::try_parse_from(["cardcast", "bind", "--role", "output", "--chat-id", "-1002"])
                .unwrap();
        let Commands::Bind { role, chat_id } = cli.command else {
            panic!("expected bind");
        };
        assert_eq!(role, ChannelRole::Output);
        assert_eq!(chat_id, -1002);
    }

    #[test]
    fn bad_rank_rejected() {
        assert!(Cli::try_parse_from(["cardcast", "--target-rank", "Z", "status"]).is_err());
    }
}
