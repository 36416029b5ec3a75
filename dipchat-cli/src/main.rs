use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dipchat_core::chat::{
    ChatService, GameId, InMemoryGameDirectory, Nation, Nations, SendMessage,
    StaticVariantRegistry, Timestamp, UserId, CLASSICAL,
};
use dipchat_core::config::Config;
use dipchat_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use dipchat_core::storage::SqliteChatStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "dipchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configured path)
    #[arg(long)]
    db: Option<String>,

    /// Game the command operates on
    #[arg(long, default_value_t = 1)]
    game: i64,

    /// Variant played by the game; only variants with a known nation roster are accepted
    #[arg(long, default_value = CLASSICAL, value_parser = [CLASSICAL])]
    variant: String,

    /// Seat a player, as `user=NATION`; repeatable
    #[arg(long = "player", value_parser = parse_player)]
    players: Vec<(UserId, Nation)>,

    /// User issuing the command
    #[arg(long = "as")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message to a channel
    Send {
        /// Channel members, comma separated (e.g. England,France)
        members: String,

        /// Message text
        body: String,

        /// Retry token; resending with the same token does not duplicate
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// List messages in a channel, newest first
    Messages {
        /// Channel members, comma separated
        members: String,

        /// Only messages created after this RFC 3339 instant
        #[arg(long)]
        since: Option<String>,
    },
    /// List channels visible to the user
    Channels {
        /// Count only messages created after this RFC 3339 instant
        #[arg(long)]
        since: Option<String>,
    },
}

fn parse_player(raw: &str) -> Result<(UserId, Nation), String> {
    match raw.split_once('=') {
        Some((user, nation)) if !user.trim().is_empty() && !nation.trim().is_empty() => {
            Ok((UserId::new(user.trim()), Nation::new(nation.trim())))
        }
        _ => Err(format!("expected user=NATION, got '{}'", raw)),
    }
}

fn parse_since(raw: Option<&str>) -> Result<Option<Timestamp>> {
    raw.map(Timestamp::parse_rfc3339).transpose().map_err(Into::into)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(db) = &args.db {
        config.store.db_path = PathBuf::from(shellexpand::tilde(db).into_owned());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.parse::<LogLevel>()?.to_string();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::from_config(&config.logging)?)?;

    let game = GameId::new(args.game);
    let games = InMemoryGameDirectory::new();
    games.add_game(game, args.variant.clone()).await;
    for (user, nation) in &args.players {
        games.add_player(game, user.clone(), nation.clone()).await?;
    }

    let variants = StaticVariantRegistry::classical();

    let store = Arc::new(SqliteChatStore::open(&config.store)?);
    debug!(path = %store.path().display(), "Using chat store");

    let service = ChatService::new(store, Arc::new(games), Arc::new(variants), config.chat.clone());
    let user = args.user.as_deref().map(UserId::new);

    match args.command {
        Command::Send {
            members,
            body,
            idempotency_key,
        } => {
            let members: Nations = members.parse()?;
            let mut request = SendMessage::new(members, body);
            if let Some(token) = idempotency_key {
                request = request.with_idempotency_key(token);
            }
            let message = service.create_message(user.as_ref(), game, request).await?;
            print_json(&message)?;
        }
        Command::Messages { members, since } => {
            let members: Nations = members.parse()?;
            let since = parse_since(since.as_deref())?;
            let messages = service
                .list_messages(user.as_ref(), game, &members, since)
                .await?;
            print_json(&messages)?;
        }
        Command::Channels { since } => {
            let since = parse_since(since.as_deref())?;
            let channels = service
                .list_channels(user.as_ref(), game, since)
                .await
                .map_err(|e| {
                    let details: Vec<String> = e.failures().iter().map(|f| f.to_string()).collect();
                    if details.is_empty() {
                        anyhow!(e)
                    } else {
                        anyhow!("{}: {}", e, details.join("; "))
                    }
                })?;
            print_json(&channels)?;
        }
    }

    info!("dipchat finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player() {
        let (user, nation) = parse_player("alice=England").unwrap();
        assert_eq!(user, UserId::new("alice"));
        assert_eq!(nation, Nation::from("England"));

        assert!(parse_player("alice").is_err());
        assert!(parse_player("=England").is_err());
        assert!(parse_player("alice=").is_err());
    }

    #[test]
    fn test_parse_since() {
        assert_eq!(parse_since(None).unwrap(), None);
        assert!(parse_since(Some("2024-03-01T12:00:00Z")).unwrap().is_some());
        assert!(parse_since(Some("soon")).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "dipchat",
            "--player",
            "alice=England",
            "--player",
            "bob=France",
            "--as",
            "alice",
            "send",
            "England,France",
            "hello",
        ])
        .unwrap();

        assert_eq!(args.players.len(), 2);
        assert_eq!(args.user.as_deref(), Some("alice"));
        assert!(matches!(args.command, Command::Send { .. }));
        assert_eq!(args.variant, CLASSICAL);
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let result = Args::try_parse_from([
            "dipchat",
            "--variant",
            "Hundred",
            "--as",
            "alice",
            "channels",
        ]);
        assert!(result.is_err());

        let args = Args::try_parse_from(["dipchat", "--variant", CLASSICAL, "channels"]).unwrap();
        assert_eq!(args.variant, CLASSICAL);
    }
}
