//! Console sink: one framed block per event.
//!
//! ```text
//! === TX ACK ===
//! {
//!   "downlinkId": 42,
//!   ...
//! }
//! ==============
//! ```
//!
//! The closing rule is as wide as the banner. Each block is written with a
//! single `write_all` so concurrent tails sharing stdout never interleave
//! inside a block.

use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::str::FromStr;

use serde::Deserialize;

use streamtail_api::{Envelope, EventSink, PayloadKind, RecordId, SinkError};

/// What goes between the banner and the closing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// Pretty-printed JSON of the payload.
    #[default]
    Json,
    /// Record id followed by `key: value` summary lines.
    Properties,
}

impl fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStyle::Json => f.write_str("json"),
            OutputStyle::Properties => f.write_str("properties"),
        }
    }
}

impl FromStr for OutputStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputStyle::Json),
            "properties" => Ok(OutputStyle::Properties),
            other => Err(format!("unknown output style '{other}' (expected json|properties)")),
        }
    }
}

pub struct ConsoleSink<W> {
    out: W,
    style: OutputStyle,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(style: OutputStyle) -> Self {
        Self::new(io::stdout(), style)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, style: OutputStyle) -> Self {
        Self { out, style }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render<E: Envelope>(&self, id: &RecordId, event: &E) -> Result<String, SinkError> {
        let banner = format!("=== {} ===", event.kind().label());
        let mut block = String::with_capacity(256);
        block.push_str(&banner);
        block.push('\n');

        match self.style {
            OutputStyle::Json => {
                let json = serde_json::to_string_pretty(event)
                    .map_err(|e| SinkError::Format(e.to_string()))?;
                block.push_str(&json);
                block.push('\n');
            }
            OutputStyle::Properties => {
                let fmt_err = |e: fmt::Error| SinkError::Format(e.to_string());
                writeln!(block, "ID: {id}").map_err(fmt_err)?;
                for (key, value) in event.properties() {
                    writeln!(block, "{key}: {value}").map_err(fmt_err)?;
                }
            }
        }

        block.push_str(&"=".repeat(banner.chars().count()));
        block.push('\n');
        Ok(block)
    }
}

impl<E: Envelope, W: Write + Send> EventSink<E> for ConsoleSink<W> {
    fn emit(&mut self, id: &RecordId, event: &E) -> Result<(), SinkError> {
        let block = self.render(id, event)?;
        self.out.write_all(block.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
