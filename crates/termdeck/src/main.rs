//! # termdeck
//!
//! Stdio bridge for the termdeck session coordinator.
//!
//! ## Overview
//!
//! Reads JSON lines on stdin and writes JSON lines on stdout:
//! - `{"ui": ...}` lines carry UI commands (create, remove, focus, resize, ...)
//! - `{"host": ...}` lines carry process-host events (output, removal, session list)
//! - output lines are `{"event": ...}` for the UI and `{"host": ...}` for the host
//!
//! Logs go to stderr.
//!
//! ## Options
//!
//! - `--config <path>`: YAML configuration file
//! - `--state <path>`: persisted layout, restored at start and saved at exit
//! - `--print-schema`: print the protocol JSON schema and exit

use anyhow::Context;
use tokio::io::BufReader;

use termdeck::{protocol_schema, HostBridge};
use termdeck_core::DeckConfig;
use termdeck_session::JsonStateStore;

/// Command line options.
#[derive(Debug, Default)]
struct Options {
    config: Option<String>,
    state: Option<String>,
    print_schema: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => options.config = Some(args.next().context("--config needs a path")?),
            "--state" => options.state = Some(args.next().context("--state needs a path")?),
            "--print-schema" => options.print_schema = true,
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1))?;

    if options.print_schema {
        println!("{}", serde_json::to_string_pretty(&protocol_schema())?);
        return Ok(());
    }

    let config = match &options.config {
        Some(path) => DeckConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => DeckConfig::default(),
    };

    // Initialize logging (stdout is reserved for protocol lines)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "termdeck v{} starting: max_sessions={}",
        env!("CARGO_PKG_VERSION"),
        config.sessions.max_sessions
    );

    let mut bridge = HostBridge::new(config);
    if let Some(path) = &options.state {
        bridge = bridge
            .with_state_store(JsonStateStore::new(path))
            .with_context(|| format!("failed to restore state from {}", path))?;
        tracing::info!(
            "Restored {} sessions from {}",
            bridge.coordinator().list().len(),
            path
        );
    }

    bridge
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    tracing::info!("termdeck shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(args(&["--config", "deck.yaml", "--state", "s.json"])).unwrap();
        assert_eq!(options.config.as_deref(), Some("deck.yaml"));
        assert_eq!(options.state.as_deref(), Some("s.json"));
        assert!(!options.print_schema);
    }

    #[test]
    fn test_parse_args_rejects_unknown() {
        assert!(parse_args(args(&["--headless"])).is_err());
        assert!(parse_args(args(&["--state"])).is_err());
    }
}
