// Address - 32-byte account identifiers for holders, organisers and contracts

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ADDRESS_PREFIX: &str = "0x";
const ADDRESS_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid address length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Identity of an account, event, ledger or marketplace (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Generate a random address
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; ADDRESS_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a stable address from a human label ("alice", "organiser")
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"account:");
        hasher.update(label.as_bytes());
        Self::from_digest(&hasher.finalize())
    }

    /// Derive the address of a contract-like instance created by `creator`.
    ///
    /// `kind` separates ledgers from events so both can be created from the
    /// same name and nonce without colliding.
    pub fn derive(kind: &str, creator: &Address, name: &str, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(b":");
        hasher.update(creator.as_bytes());
        hasher.update(name.as_bytes());
        hasher.update(nonce.to_be_bytes());
        Self::from_digest(&hasher.finalize())
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse a `0x`-prefixed hex address
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let hex_part = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| AddressError::InvalidFormat(format!("missing '{}' prefix", ADDRESS_PREFIX)))?;

        let bytes = hex::decode(hex_part).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.as_slice().try_into().map_err(|_| {
            AddressError::InvalidLength {
                expected: ADDRESS_LEN,
                got: bytes.len(),
            }
        })?;

        Ok(Self(bytes))
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        format!("{}{}", ADDRESS_PREFIX, hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
