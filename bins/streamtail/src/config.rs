use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use streamtail_engine::config::{RetryConfig, TailOptions};
use streamtail_engine::{OutputStyle, TailSettings};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "streamtail", about = "Tail the network server's Redis streams as typed events")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Device event log (up, join, ack, txack, log, status, location, integration)
    Events(EventsArgs),
    /// LoRaWAN frame log of the gateways or the devices (up, down)
    Frames(FramesArgs),
    /// Frame meta log (uplink/downlink byte counts)
    Meta(TailArgs),
    /// API request log
    Requests(TailArgs),
    /// Run every [[tails]] entry of a TOML file concurrently
    Run(RunArgs),
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct TailArgs {
    /// Redis server, `host:port` or a redis:// URL
    #[arg(long, default_value = "localhost:6379", env = "STREAMTAIL_SERVER")]
    pub server: String,

    /// Stream key. Defaults to the stream of the chosen subcommand
    #[arg(long)]
    pub key: Option<String>,

    /// Prepended to the stream key (network server `redis.key_prefix`)
    #[arg(long, default_value = "", env = "STREAMTAIL_KEY_PREFIX")]
    pub key_prefix: String,

    /// Records per XREAD
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Start after this id (`0` = whole history)
    #[arg(long, default_value = "0")]
    pub start: String,

    /// json | properties
    #[arg(long, default_value = "json")]
    pub output: OutputStyle,

    /// Persist the cursor here and resume from it on restart
    #[arg(long)]
    pub cursor_file: Option<PathBuf>,

    /// Consecutive connection failures tolerated (0 = exit on the first)
    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,
}

#[derive(Args, Clone, Debug)]
pub struct EventsArgs {
    #[command(flatten)]
    pub tail: TailArgs,

    /// Tail the per-device stream of this DevEUI
    #[arg(long)]
    pub dev_eui: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct FramesArgs {
    #[command(flatten)]
    pub tail: TailArgs,

    /// Tail the gateway frame log instead of the device one
    #[arg(long)]
    pub gateways: bool,

    /// Tail the per-gateway stream of this gateway ID
    #[arg(long)]
    pub gateway_id: Option<String>,

    /// Tail the per-device stream of this DevEUI
    #[arg(long)]
    pub dev_eui: Option<String>,
}

impl FramesArgs {
    pub fn target(&self) -> Target<'_> {
        Target {
            key: None,
            dev_eui: self.dev_eui.as_deref(),
            gateway_id: self.gateway_id.as_deref(),
            gateways: self.gateways,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "streamtail.toml", env = "STREAMTAIL_CONFIG")]
    pub config: String,

    /// Overrides `server` from the file
    #[arg(long)]
    pub server: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

/// Which envelope a stream is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    Event,
    Frame,
    Meta,
    Request,
}

impl Schema {
    pub fn default_key(self) -> &'static str {
        match self {
            Schema::Event => "device:stream:event",
            Schema::Frame => "device:stream:frame",
            Schema::Meta => "stream:meta",
            Schema::Request => "api:stream:request",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Event => f.write_str("event"),
            Schema::Frame => f.write_str("frame"),
            Schema::Meta => f.write_str("meta"),
            Schema::Request => f.write_str("request"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default)]
    pub key_prefix: String,

    #[serde(default)]
    pub tails: Vec<TailEntry>,
}

fn default_server() -> String {
    "localhost:6379".into()
}

#[derive(Debug, Deserialize)]
pub struct TailEntry {
    pub name: String,
    pub schema: Schema,
    #[serde(default)]
    pub key: Option<String>,
    /// Only valid with `schema = "event"` or `"frame"`.
    #[serde(default)]
    pub dev_eui: Option<String>,
    /// Only valid with `schema = "frame"`.
    #[serde(default)]
    pub gateway_id: Option<String>,
    /// Frame schema only: the gateway frame log rather than the device one.
    #[serde(default)]
    pub gateways: bool,
    #[serde(flatten)]
    pub options: TailOptions,
}

impl TailEntry {
    fn target(&self) -> Target<'_> {
        Target {
            key: self.key.as_deref(),
            dev_eui: self.dev_eui.as_deref(),
            gateway_id: self.gateway_id.as_deref(),
            gateways: self.gateways,
        }
    }
}

impl FileConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::config("read", format!("'{path}': {e}")))?;
        Self::parse(&content).map_err(|e| match e {
            CliError::Config { context, detail } => CliError::config(context, format!("'{path}': {detail}")),
            other => other,
        })
    }

    pub fn parse(toml_str: &str) -> Result<Self, CliError> {
        toml::from_str(toml_str).map_err(|e| CliError::config("parse", e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: validated, ready to spawn
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct TailJob {
    pub name: String,
    pub schema: Schema,
    pub settings: TailSettings,
    pub output: OutputStyle,
    pub cursor_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Effective {
    pub server: String,
    pub tails: Vec<TailJob>,
}

impl Effective {
    /// Single tail from subcommand flags. `--key` always comes from `args`.
    pub fn from_args(schema: Schema, args: &TailArgs, target: Target<'_>) -> Result<Self, CliError> {
        let options = TailOptions {
            batch_size: args.batch_size,
            start: args.start.clone(),
            output: args.output,
            cursor_file: args.cursor_file.clone(),
            retry: RetryConfig {
                max_retries: args.max_retries,
                ..RetryConfig::default()
            },
        };
        let target = Target { key: args.key.as_deref(), ..target };
        let key = stream_key(&args.key_prefix, schema, target)?;
        let job = TailJob::new(schema.to_string(), schema, key, &options)?;
        Ok(Self {
            server: args.server.clone(),
            tails: vec![job],
        })
    }

    pub fn from_file(args: &RunArgs) -> Result<Self, CliError> {
        let cfg = FileConfig::load(&args.config)?;
        let mut eff = Self::from_config(cfg)?;
        if let Some(server) = &args.server {
            eff.server = server.clone();
        }
        Ok(eff)
    }

    pub fn from_config(cfg: FileConfig) -> Result<Self, CliError> {
        if cfg.tails.is_empty() {
            return Err(CliError::config("validate", "no [[tails]] configured"));
        }

        let mut names = HashSet::new();
        let mut tails = Vec::with_capacity(cfg.tails.len());
        for entry in &cfg.tails {
            if !names.insert(entry.name.as_str()) {
                return Err(CliError::config("validate", format!("duplicate tail name '{}'", entry.name)));
            }
            let key = stream_key(&cfg.key_prefix, entry.schema, entry.target())
                .map_err(|e| with_tail(e, &entry.name))?;
            tails.push(TailJob::new(entry.name.clone(), entry.schema, key, &entry.options)?);
        }

        Ok(Self {
            server: cfg.server,
            tails,
        })
    }
}

impl TailJob {
    fn new(name: String, schema: Schema, key: String, options: &TailOptions) -> Result<Self, CliError> {
        let settings = options
            .settings(key)
            .map_err(|e| CliError::config("validate", format!("tail '{name}': {e}")))?;
        Ok(Self {
            name,
            schema,
            settings,
            output: options.output,
            cursor_file: options.cursor_file.clone(),
        })
    }
}

fn with_tail(e: CliError, name: &str) -> CliError {
    match e {
        CliError::Config { context, detail } => CliError::config(context, format!("tail '{name}': {detail}")),
        other => other,
    }
}

/// Which stream of a schema to tail. At most one of `key`, `dev_eui`,
/// `gateway_id` and `gateways` may be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Target<'a> {
    pub key: Option<&'a str>,
    pub dev_eui: Option<&'a str>,
    pub gateway_id: Option<&'a str>,
    pub gateways: bool,
}

impl<'a> Target<'a> {
    pub fn device(dev_eui: Option<&'a str>) -> Self {
        Self { dev_eui, ..Self::default() }
    }
}

/// `<prefix><key>`, where key is the explicit one, a per-device or
/// per-gateway stream, the gateway frame log, or the schema default.
pub fn stream_key(prefix: &str, schema: Schema, target: Target<'_>) -> Result<String, CliError> {
    let chosen = [
        target.key.is_some(),
        target.dev_eui.is_some(),
        target.gateway_id.is_some(),
        target.gateways,
    ];
    if chosen.iter().filter(|set| **set).count() > 1 {
        return Err(CliError::config(
            "validate",
            "key, dev_eui, gateway_id and gateways are mutually exclusive",
        ));
    }

    let base = if let Some(key) = target.key {
        key.to_string()
    } else if let Some(eui) = target.dev_eui {
        match schema {
            Schema::Event => format!("device:{{{}}}:stream:event", parse_eui("DevEUI", eui)?),
            Schema::Frame => format!("device:{{{}}}:stream:frame", parse_eui("DevEUI", eui)?),
            _ => {
                return Err(CliError::config(
                    "validate",
                    format!("dev_eui is only valid for the event and frame schemas, not '{schema}'"),
                ));
            }
        }
    } else if let Some(id) = target.gateway_id {
        require_frame(schema, "gateway_id")?;
        format!("gw:{{{}}}:stream:frame", parse_eui("gateway ID", id)?)
    } else if target.gateways {
        require_frame(schema, "gateways")?;
        "gw:stream:frame".to_string()
    } else {
        schema.default_key().to_string()
    };
    Ok(format!("{prefix}{base}"))
}

fn require_frame(schema: Schema, option: &str) -> Result<(), CliError> {
    if schema != Schema::Frame {
        return Err(CliError::config(
            "validate",
            format!("{option} is only valid for the frame schema, not '{schema}'"),
        ));
    }
    Ok(())
}

/// 8 bytes as 16 hex digits, normalized to lower case.
fn parse_eui(what: &str, eui: &str) -> Result<String, CliError> {
    if eui.len() != 16 || !eui.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::config("validate", format!("invalid {what} '{eui}' (expected 16 hex digits)")));
    }
    Ok(eui.to_ascii_lowercase())
}
