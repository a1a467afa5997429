//! Logging setup for the service.
//!
//! Read once at startup:
//! - `RUST_LOG` replaces the filter entirely when set
//! - `PLANTWATCH_LOG_LEVEL` sets the base level otherwise (default `debug`)
//! - `PLANTWATCH_SPAN_EVENTS` is `full`, `enter_exit`, or anything else for
//!   close events only
//! - `FORCE_COLOR` forces ANSI output on or off; unset means TTY detection
use std::{env, str::FromStr};

use is_terminal::IsTerminal;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt::format::FmtSpan};

// ---

const DEFAULT_LEVEL: Level = Level::DEBUG;

/// Statement logging from sqlx is too chatty below `warn`.
const QUIET_TARGETS: &str = "sqlx::query=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub span_events: FmtSpan,
    /// `None` defers to TTY detection.
    pub color: Option<bool>,
    /// A `PLANTWATCH_LOG_LEVEL` value that was not a level, reported once
    /// the subscriber is up.
    pub rejected_level: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // ---
        let mut rejected_level = None;
        let directives = match var("RUST_LOG") {
            Some(directives) => directives,
            None => {
                let level = match var("PLANTWATCH_LOG_LEVEL") {
                    Some(raw) => match Level::from_str(raw.trim()) {
                        Ok(level) => level,
                        Err(_) => {
                            rejected_level = Some(raw);
                            DEFAULT_LEVEL
                        }
                    },
                    None => DEFAULT_LEVEL,
                };
                format!("{},{QUIET_TARGETS}", level.as_str().to_ascii_lowercase())
            }
        };

        Self {
            directives,
            span_events: span_events(var("PLANTWATCH_SPAN_EVENTS").as_deref()),
            color: var("FORCE_COLOR").as_deref().and_then(parse_switch),
            rejected_level,
        }
    }

    /// Install the global subscriber. Call once, before any logging macro runs.
    pub fn install(self) {
        // ---
        let filter = EnvFilter::try_new(&self.directives).unwrap_or_else(|_| {
            EnvFilter::new(format!("{},{QUIET_TARGETS}", DEFAULT_LEVEL.as_str()))
        });
        let color = self
            .color
            .unwrap_or_else(|| std::io::stdout().is_terminal());

        tracing_subscriber::fmt()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(self.span_events)
            .with_env_filter(filter)
            .with_ansi(color)
            .compact()
            .init();

        if let Some(raw) = self.rejected_level {
            tracing::warn!(value = %raw, "PLANTWATCH_LOG_LEVEL is not a level, using debug");
        }
    }
}

fn span_events(mode: Option<&str>) -> FmtSpan {
    match mode {
        Some("full") => FmtSpan::FULL,
        Some("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
