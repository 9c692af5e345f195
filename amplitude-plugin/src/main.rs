//! amplitude-plugin - CLI for sending analytics calls through the Amplitude plugin
//!
//! This tool provides commands for:
//! - Checking plugin configuration and the resolved ingestion endpoint
//! - Sending identify, track and page calls through the server adapter
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/amplitude-plugin/config.toml (~/.config/amplitude-plugin/config.toml)
//! - Logs: $XDG_STATE_HOME/amplitude-plugin/ (~/.local/state/amplitude-plugin/)

use amplitude_plugin_core::client::resolve_base_url;
use amplitude_plugin_core::config::API_KEY_ENV;
use amplitude_plugin_core::plugin::{AnalyticsPlugin, InitContext, StaticInstance};
use amplitude_plugin_core::{
    Config, IdentifyPayload, PageOptions, PagePayload, Properties, ServerOptions, ServerPlugin,
    TrackOptions, TrackPayload,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "amplitude-plugin")]
#[command(about = "Send identify, track and page calls to Amplitude")]
#[command(version)]
struct Args {
    /// Verbose output (writes a log file to the state directory)
    #[arg(short, long)]
    verbose: bool,

    /// Device id to report (default: a fresh random id)
    #[arg(long, global = true)]
    device_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show plugin configuration without contacting Amplitude
    Status,

    /// Associate a user id and traits with the device
    Identify {
        /// User id to set
        user_id: String,

        /// Trait as key=value (repeatable)
        #[arg(long = "trait", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        traits: Vec<(String, Value)>,
    },

    /// Send a named event
    Track {
        /// Event type
        event: String,

        /// Event property as key=value (repeatable)
        #[arg(long = "prop", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        props: Vec<(String, Value)>,

        /// One-shot user property as key=value (repeatable)
        #[arg(long = "user-prop", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        user_props: Vec<(String, Value)>,
    },

    /// Send a page view
    Page {
        /// Event type to report instead of "Page View"
        #[arg(long)]
        event_type: Option<String>,

        /// Page property as key=value (repeatable)
        #[arg(long = "prop", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        props: Vec<(String, Value)>,
    },
}

/// Parse `key=value`; the value is JSON when it parses, a string otherwise.
fn parse_key_value(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn to_properties(pairs: Vec<(String, Value)>) -> Properties {
    pairs.into_iter().collect()
}

/// Show the first few characters of a secret.
fn mask(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{}****", prefix)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(
            amplitude_plugin_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Identify { user_id, traits } => {
            let plugin = connect(&config, args.device_id)?;
            plugin
                .identify(IdentifyPayload {
                    user_id: Some(user_id.clone()),
                    traits: to_properties(traits),
                })
                .await
                .context("identify failed")?;
            println!("Identified {}", user_id);
            Ok(())
        }
        Command::Track {
            event,
            props,
            user_props,
        } => {
            let plugin = connect(&config, args.device_id)?;
            let user_properties = if user_props.is_empty() {
                None
            } else {
                Some(Value::Object(to_properties(user_props)))
            };
            plugin
                .track(TrackPayload {
                    event: event.clone(),
                    properties: to_properties(props),
                    options: TrackOptions { user_properties },
                })
                .await
                .context("track failed")?;
            println!("Tracked {}", event);
            Ok(())
        }
        Command::Page { event_type, props } => {
            let plugin = connect(&config, args.device_id)?;
            plugin
                .page(PagePayload {
                    properties: to_properties(props),
                    options: Some(PageOptions { event_type }),
                })
                .await
                .context("page failed")?;
            println!("Page view sent");
            Ok(())
        }
    }
}

/// Build and initialize the server adapter from the file configuration.
fn connect(config: &Config, device_id: Option<String>) -> Result<ServerPlugin> {
    let plugin_config = config.plugin_config();
    let mut plugin =
        ServerPlugin::new(plugin_config.clone()).context("invalid Amplitude configuration")?;

    let device_id = device_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::debug!(device_id = %device_id, "Initializing server plugin");

    plugin
        .initialize(InitContext {
            config: &plugin_config,
            instance: &StaticInstance::new(device_id),
        })
        .context("failed to initialize Amplitude plugin")?;

    Ok(plugin)
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Amplitude Plugin Configuration");
    println!("==============================");
    println!();

    let section = &config.amplitude;

    println!("Config File:     {}", Config::config_path().display());
    println!(
        "API Key:         {}",
        section
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(mask)
            .unwrap_or_else(|| "<not set>".to_string())
    );
    println!(
        "Project:         {}",
        section.project_name.as_deref().unwrap_or("<default>")
    );

    let plugin_config = config.plugin_config();
    let options = ServerOptions::from_plugin_config(&plugin_config)
        .context("invalid Amplitude options")?;
    println!(
        "Endpoint:        {}",
        resolve_base_url(options.api_endpoint.as_deref())
    );
    println!(
        "HTTP Headers:    {}",
        options.http_headers.as_ref().map_or(0, |h| h.len())
    );
    println!(
        "Event Options:   {}",
        if options.event_options.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );

    let log_files = amplitude_plugin_core::logging::log_files().context("failed to list logs")?;
    println!(
        "Log Files:       {} in {}",
        log_files.len(),
        Config::state_dir().display()
    );

    println!();
    if plugin_config.validate().is_ok() {
        println!("Status: Ready to send");
    } else {
        println!("Status: Not ready (missing API key)");
        println!();
        println!(
            "Set it in {} or export {}:",
            Config::config_path().display(),
            API_KEY_ENV
        );
        println!();
        println!("  [amplitude]");
        println!("  api_key = \"your-project-api-key\"");
    }

    Ok(())
}
