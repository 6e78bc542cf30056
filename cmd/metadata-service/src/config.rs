//! Startup configuration.
//!
//! The file is line oriented, one `key: value` pair per line, in fixed order:
//!
//! ```text
//! B: 2
//! metadata: localhost:6000
//! block0: localhost:5000
//! block1: localhost:5001
//! replacement: 0
//! ```
//!
//! Keys are positional; only the shard count key and the `block<i>` keys are checked by
//! name. The replacement-policy selector is carried along but means nothing here.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected `key: value`, got {text:?}")]
    Malformed { line: usize, text: String },

    #[error("line {line}: {reason}")]
    Invalid { line: usize, reason: String },

    #[error("config ends after line {line}; expected {expected}")]
    Truncated { line: usize, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address this service binds, as `host:port`.
    pub metadata_addr: String,
    /// Shard addresses, indexed by shard number.
    pub shards: Vec<String>,
    pub replacement_policy: i64,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, text)| (i + 1, text.trim()))
            .filter(|(_, text)| !text.is_empty());

        let mut next = |expected: &str| {
            lines.next().ok_or_else(|| ConfigError::Truncated {
                line: content.lines().count(),
                expected: expected.to_string(),
            })
        };

        let (line, text) = next("the shard count")?;
        let (key, value) = split_pair(line, text)?;
        if key != "B" {
            return Err(ConfigError::Invalid {
                line,
                reason: format!("expected shard count key `B`, got `{}`", key),
            });
        }
        let shard_count: usize = value.parse().map_err(|_| ConfigError::Invalid {
            line,
            reason: format!("shard count must be a non-negative integer, got {:?}", value),
        })?;
        if shard_count == 0 {
            return Err(ConfigError::Invalid {
                line,
                reason: "at least one block shard is required".to_string(),
            });
        }

        let (line, text) = next("the metadata address")?;
        let (_, value) = split_pair(line, text)?;
        let metadata_addr = check_addr(line, value)?;

        let mut shards = Vec::with_capacity(shard_count);
        for index in 0..shard_count {
            let (line, text) = next(format!("block{}", index).as_str())?;
            let (key, value) = split_pair(line, text)?;
            if key != format!("block{}", index) {
                return Err(ConfigError::Invalid {
                    line,
                    reason: format!("expected `block{}`, got `{}`", index, key),
                });
            }
            shards.push(check_addr(line, value)?);
        }

        let (line, text) = next("the replacement policy")?;
        let (_, value) = split_pair(line, text)?;
        let replacement_policy = value.parse().map_err(|_| ConfigError::Invalid {
            line,
            reason: format!("replacement policy must be an integer, got {:?}", value),
        })?;

        Ok(Config {
            metadata_addr,
            shards,
            replacement_policy,
        })
    }
}

fn split_pair(line: usize, text: &str) -> Result<(&str, &str), ConfigError> {
    match text.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim(), value.trim()))
        }
        _ => Err(ConfigError::Malformed {
            line,
            text: text.to_string(),
        }),
    }
}

fn check_addr(line: usize, value: &str) -> Result<String, ConfigError> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(value.to_string())
        }
        _ => Err(ConfigError::Invalid {
            line,
            reason: format!("expected `host:port`, got {:?}", value),
        }),
    }
}
