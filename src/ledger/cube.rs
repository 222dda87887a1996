use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{digest_hex, Address};
use super::transaction::Transaction;

/// Length of a hex encoded SHA-256 digest; no difficulty above it can be met
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur while mining a cube
#[derive(Debug, Error)]
pub enum CubeError {
    #[error("No hash with the required difficulty found after {attempts} attempts")]
    MiningExhausted { attempts: u64 },
}

/// A block in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cube {
    /// Timestamp when the cube was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Hash of the previous cube, `"0"` for the genesis cube
    pub previous_hash: String,

    /// Transactions included in this cube, in pool order
    pub transactions: Vec<Transaction>,

    /// Proof of work counter
    pub nonce: u64,

    /// Hash of this cube
    pub hash: String,

    /// Address credited with the mining reward
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner: Option<Address>,
}

impl Cube {
    /// Creates a cube with nonce 0 and its initial hash
    pub fn new(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
        miner: Option<Address>,
    ) -> Self {
        let mut cube = Cube {
            timestamp,
            previous_hash,
            transactions,
            nonce: 0,
            hash: String::new(),
            miner,
        };
        cube.hash = cube.compute_hash();
        cube
    }

    /// Calculates the SHA-256 hash of the cube
    ///
    /// Covers previous hash, timestamp, every transaction field in order,
    /// nonce and miner. The stored `hash` is not part of the input.
    pub fn compute_hash(&self) -> String {
        let cube_data = serde_json::json!({
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "nonce": self.nonce,
            "miner": self.miner,
        });

        digest_hex(cube_data.to_string().as_bytes())
    }

    /// Whether the current hash starts with `difficulty` zero characters
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    /// Increments the nonce until the hash meets `difficulty`
    ///
    /// Runs until a solution is found; a difficulty above the hash length
    /// never terminates.
    pub fn mine(&mut self, difficulty: usize) {
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// Like [`Cube::mine`] but gives up after `max_attempts` nonce increments
    pub fn mine_bounded(&mut self, difficulty: usize, max_attempts: u64) -> Result<(), CubeError> {
        let mut attempts = 0;

        while !self.meets_difficulty(difficulty) {
            if attempts == max_attempts {
                return Err(CubeError::MiningExhausted { attempts });
            }
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;
        }

        Ok(())
    }

    /// Returns false if any transaction fails validation
    ///
    /// A transfer with no signature counts as invalid here instead of
    /// aborting the scan.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(|tx| match tx.is_valid() {
            Ok(valid) => valid,
            Err(err) => {
                warn!("Transaction {} in cube {} rejected: {}", tx.id(), self.hash, err);
                false
            }
        })
    }
}

/// Whether `hash` starts with `difficulty` `'0'` characters
pub fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
