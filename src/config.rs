// Economy configuration - schedule offsets and refund quorum

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Basis-point denominator (100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Refund quorum {0} bps exceeds 10000")]
    QuorumOutOfRange(u64),

    #[error("Voting window must be longer than zero seconds")]
    EmptyVotingWindow,

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// How an event's phase thresholds are derived from its date, and how many
/// refund votes open refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Sale opens this long before the event date
    pub sale_lead_secs: u64,
    /// Voting opens this long after the event date
    pub voting_delay_secs: u64,
    /// Voting stays open this long
    pub voting_duration_secs: u64,
    /// Refund votes needed, as basis points of tickets sold
    pub refund_quorum_bps: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            sale_lead_secs: 30 * DAY_SECS,
            voting_delay_secs: DAY_SECS,
            voting_duration_secs: 7 * DAY_SECS,
            refund_quorum_bps: 5_000,
        }
    }
}

impl EconomyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sale_lead(mut self, secs: u64) -> Self {
        self.sale_lead_secs = secs;
        self
    }

    pub fn with_voting_delay(mut self, secs: u64) -> Self {
        self.voting_delay_secs = secs;
        self
    }

    pub fn with_voting_duration(mut self, secs: u64) -> Self {
        self.voting_duration_secs = secs;
        self
    }

    pub fn with_refund_quorum_bps(mut self, bps: u64) -> Self {
        self.refund_quorum_bps = bps;
        self
    }

    /// Defaults overridden by `TIXMESH_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            sale_lead_secs: env_u64("TIXMESH_SALE_LEAD_SECS", defaults.sale_lead_secs)?,
            voting_delay_secs: env_u64("TIXMESH_VOTING_DELAY_SECS", defaults.voting_delay_secs)?,
            voting_duration_secs: env_u64("TIXMESH_VOTING_DURATION_SECS", defaults.voting_duration_secs)?,
            refund_quorum_bps: env_u64("TIXMESH_REFUND_QUORUM_BPS", defaults.refund_quorum_bps)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refund_quorum_bps > BPS_DENOMINATOR {
            return Err(ConfigError::QuorumOutOfRange(self.refund_quorum_bps));
        }
        if self.voting_duration_secs == 0 {
            return Err(ConfigError::EmptyVotingWindow);
        }
        Ok(())
    }
}

fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => Ok(default),
    }
}
