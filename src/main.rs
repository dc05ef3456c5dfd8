//! `cable` - command-line ActionCable client.
//!
//! Subscribes to a channel and streams pushed data as JSON lines, performs
//! one-off actions, and encodes/decodes frames offline.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use cable_client::codec::{self, Command};
use cable_client::{CableClient, CableConfig, CableEvent, Identifier};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "cable", version = VERSION, about = "ActionCable protocol client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe and print every data push as a JSON line
    Listen {
        #[command(flatten)]
        target: Target,
    },
    /// Subscribe, perform one action, then unsubscribe
    Perform {
        #[command(flatten)]
        target: Target,
        /// Action name
        #[arg(long)]
        action: String,
        /// Action field; values that parse as JSON are sent as JSON
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
    /// Print an outgoing frame without connecting
    Encode {
        #[command(subcommand)]
        kind: EncodeKind,
    },
    /// Decode an inbound frame
    Decode {
        /// Raw frame text
        frame: String,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum EncodeKind {
    /// Subscribe frame
    Subscribe {
        #[command(flatten)]
        channel: ChannelArgs,
    },
    /// Unsubscribe frame
    Unsubscribe {
        #[command(flatten)]
        channel: ChannelArgs,
    },
    /// Message (perform) frame
    Perform {
        #[command(flatten)]
        channel: ChannelArgs,
        /// Action name
        #[arg(long)]
        action: String,
        /// Action field
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
}

#[derive(Args)]
struct ChannelArgs {
    /// Channel class name (e.g. ChatChannel)
    #[arg(long)]
    channel: String,
    /// Identifier parameter, in order
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

impl ChannelArgs {
    fn identifier(&self) -> Identifier {
        Identifier::new(self.channel.clone(), self.params.clone())
    }
}

#[derive(Args)]
struct Target {
    /// Cable URL (overrides config and CABLE_URL)
    #[arg(long)]
    url: Option<String>,
    /// Extra handshake header
    #[arg(long = "header", value_parser = parse_key_value)]
    headers: Vec<(String, String)>,
    #[command(flatten)]
    channel: ChannelArgs,
}

impl Target {
    fn config(&self) -> Result<CableConfig> {
        let mut config = CableConfig::load()?;
        if let Some(url) = &self.url {
            config.url.clone_from(url);
        }
        config.headers.extend(self.headers.iter().cloned());
        Ok(config)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

fn data_fields(data: &[(String, String)]) -> Vec<(String, Value)> {
    data.iter()
        .map(|(k, v)| {
            let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone()));
            (k.clone(), value)
        })
        .collect()
}

/// Connect and subscribe to the target channel, then pass every other
/// event for that channel to `on_event` until the connection closes.
async fn run_session(target: &Target, mut on_event: impl SessionHandler) -> Result<()> {
    let config = target.config()?;
    let identifier = target.channel.identifier();
    let (client, mut events) = CableClient::connect(&config).await?;
    let mut confirmed = false;

    while let Some(event) = events.recv().await {
        match event {
            CableEvent::Connected => {
                if let Err(err) = client.subscribe(identifier.clone()).await {
                    log::debug!("Not resubscribing: {}", err);
                }
            }
            CableEvent::Confirmed(id) if id == identifier => {
                confirmed = true;
                on_event.confirmed(&client, &identifier).await?;
            }
            CableEvent::Rejected(id) if id == identifier => {
                bail!("Subscription rejected for {}", identifier);
            }
            CableEvent::Received {
                identifier: from,
                message,
            } if from == identifier => on_event.received(&message)?,
            CableEvent::Disconnect { reason, .. } => {
                let reason = reason.as_deref().unwrap_or("no reason");
                log::warn!("Server closed the cable: {}", reason);
            }
            CableEvent::Closed => break,
            _ => {}
        }
    }

    if confirmed {
        Ok(())
    } else {
        bail!("Connection closed before {} was confirmed", identifier)
    }
}

/// What a command does once its subscription is live.
trait SessionHandler {
    async fn confirmed(&mut self, client: &CableClient, identifier: &Identifier) -> Result<()>;
    fn received(&mut self, message: &Value) -> Result<()>;
}

/// `cable listen`: print pushes as JSON lines.
struct Printer;

impl SessionHandler for Printer {
    async fn confirmed(&mut self, _: &CableClient, identifier: &Identifier) -> Result<()> {
        log::info!("Listening on {}", identifier);
        Ok(())
    }

    fn received(&mut self, message: &Value) -> Result<()> {
        println!("{}", serde_json::to_string(message)?);
        Ok(())
    }
}

/// `cable perform`: one action, then unsubscribe and close.
struct OneShot {
    action: String,
    fields: Vec<(String, Value)>,
}

impl SessionHandler for OneShot {
    async fn confirmed(&mut self, client: &CableClient, identifier: &Identifier) -> Result<()> {
        client
            .perform(self.action.clone(), self.fields.clone(), identifier.clone())
            .await?;
        client.unsubscribe(identifier.clone()).await?;
        log::info!("Performed '{}' on {}", self.action, identifier);
        client.shutdown();
        Ok(())
    }

    fn received(&mut self, _: &Value) -> Result<()> {
        Ok(())
    }
}

fn encode(kind: &EncodeKind) -> String {
    match kind {
        EncodeKind::Subscribe { channel } => codec::subscribe_command(&channel.identifier()),
        EncodeKind::Unsubscribe { channel } => codec::unsubscribe_command(&channel.identifier()),
        EncodeKind::Perform {
            channel,
            action,
            data,
        } => Command::Message {
            identifier: channel.identifier(),
            action: action.clone(),
            data: data_fields(data),
        }
        .encode(),
    }
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Ok(path) = std::env::var("CABLE_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(env_logger::Target::Stderr);
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen { target } => run_session(&target, Printer).await?,
        Commands::Perform {
            target,
            action,
            data,
        } => {
            let handler = OneShot {
                action,
                fields: data_fields(&data),
            };
            run_session(&target, handler).await?;
        }
        Commands::Encode { kind } => println!("{}", encode(&kind)),
        Commands::Decode { frame } => println!("{:#?}", codec::decode(&frame)),
        Commands::Config { save } => {
            let config = CableConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = CableConfig::config_path()?;
                config.save_to(&path)?;
                log::info!("Saved config to {}", path.display());
            }
        }
    }

    Ok(())
}
