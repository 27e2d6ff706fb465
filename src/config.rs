//! Service configuration
//!
//! All tunables of the registry, mailboxes, rate limiter and reaper. Defaults
//! match the reference behaviour; each value can be overridden through a
//! `CHAT_*` environment variable.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_MAILBOX_CAPACITY: usize = 10;
const DEFAULT_RATE_LIMIT_PER_SEC: f64 = 1.0;
const DEFAULT_RATE_LIMIT_BURST: u32 = 5;
const DEFAULT_MAX_MESSAGE_LEN: usize = 500;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_REAP_INTERVAL_SECS: u64 = 60;
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Largest buffer tokio's bounded `mpsc` accepts
pub const MAX_CHANNEL_CAPACITY: usize = usize::MAX >> 3;
/// Upper bound for every configured duration (one year)
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Chat service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Pending messages each client mailbox can hold
    pub mailbox_capacity: usize,
    /// Steady token refill rate per client (messages per second)
    pub rate_limit_per_sec: f64,
    /// Token bucket capacity per client
    pub rate_limit_burst: u32,
    /// Maximum message length, in characters
    pub max_message_len: usize,
    /// Clients not seen for longer than this are evicted
    pub idle_timeout: Duration,
    /// Period of the idle sweep
    pub reap_interval: Duration,
    /// Upper bound on a single receive wait
    pub receive_timeout: Duration,
    /// Buffer of the registry command channel
    pub command_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            reap_interval: Duration::from_secs(DEFAULT_REAP_INTERVAL_SECS),
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ChatConfig {
    /// Build a configuration from `CHAT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to the defaults. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            mailbox_capacity: parse_or(
                &lookup,
                "CHAT_MAILBOX_CAPACITY",
                defaults.mailbox_capacity,
            )?,
            rate_limit_per_sec: parse_or(
                &lookup,
                "CHAT_RATE_LIMIT_PER_SEC",
                defaults.rate_limit_per_sec,
            )?,
            rate_limit_burst: parse_or(
                &lookup,
                "CHAT_RATE_LIMIT_BURST",
                defaults.rate_limit_burst,
            )?,
            max_message_len: parse_or(
                &lookup,
                "CHAT_MAX_MESSAGE_LEN",
                defaults.max_message_len,
            )?,
            idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CHAT_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )?),
            reap_interval: Duration::from_secs(parse_or(
                &lookup,
                "CHAT_REAP_INTERVAL_SECS",
                DEFAULT_REAP_INTERVAL_SECS,
            )?),
            receive_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CHAT_RECEIVE_TIMEOUT_MS",
                DEFAULT_RECEIVE_TIMEOUT_MS,
            )?),
            command_buffer: parse_or(&lookup, "CHAT_COMMAND_BUFFER", defaults.command_buffer)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    ///
    /// Zero-sized or oversized channels and zero-period intervals panic inside
    /// tokio, and durations past [`MAX_DURATION`] can overflow an `Instant`,
    /// so they are caught here instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(out_of_range("CHAT_MAILBOX_CAPACITY"));
        }
        if self.command_buffer == 0 {
            return Err(out_of_range("CHAT_COMMAND_BUFFER"));
        }
        if self.rate_limit_burst == 0 {
            return Err(out_of_range("CHAT_RATE_LIMIT_BURST"));
        }
        if !(self.rate_limit_per_sec.is_finite() && self.rate_limit_per_sec > 0.0) {
            return Err(out_of_range("CHAT_RATE_LIMIT_PER_SEC"));
        }
        if self.max_message_len == 0 {
            return Err(out_of_range("CHAT_MAX_MESSAGE_LEN"));
        }
        if self.reap_interval.is_zero() {
            return Err(out_of_range("CHAT_REAP_INTERVAL_SECS"));
        }
        if self.idle_timeout.is_zero() {
            return Err(out_of_range("CHAT_IDLE_TIMEOUT_SECS"));
        }
        if self.receive_timeout.is_zero() {
            return Err(out_of_range("CHAT_RECEIVE_TIMEOUT_MS"));
        }

        if self.mailbox_capacity > MAX_CHANNEL_CAPACITY {
            return Err(too_large("CHAT_MAILBOX_CAPACITY"));
        }
        if self.command_buffer > MAX_CHANNEL_CAPACITY {
            return Err(too_large("CHAT_COMMAND_BUFFER"));
        }
        if self.reap_interval > MAX_DURATION {
            return Err(too_large("CHAT_REAP_INTERVAL_SECS"));
        }
        if self.idle_timeout > MAX_DURATION {
            return Err(too_large("CHAT_IDLE_TIMEOUT_SECS"));
        }
        if self.receive_timeout > MAX_DURATION {
            return Err(too_large("CHAT_RECEIVE_TIMEOUT_MS"));
        }
        Ok(())
    }
}

fn out_of_range(key: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        key,
        reason: "must be greater than zero",
    }
}

fn too_large(key: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        key,
        reason: "is too large",
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}
