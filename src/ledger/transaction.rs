use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::crypto::{digest_hex, verify_signature, Address, DigitalSignature, KeyPair};

/// Sender written into the digest of transactions that have no sender
pub const REWARD_SENDER: &str = "0";

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Cannot sign reward transactions")]
    InvalidOperation,

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Key pair address {signer} does not match sender {sender}")]
    SenderMismatch { signer: String, sender: String },
}

/// Unsigned transaction minting value for a miner or a verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RewardTransaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Recipient of the reward
    pub to: Address,

    /// Amount minted
    pub amount: f64,

    /// Timestamp when the transaction was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Signed transfer of value between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransferTransaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Sender's address, also the public key the signature is checked against
    pub from: Address,

    /// Recipient's address
    pub to: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Amount paid to each verifier of this transaction
    ///
    /// Not covered by the signature: anyone relaying the signed transfer can
    /// change it before submission, and the sender is debited whatever value
    /// is pooled.
    #[serde(default)]
    pub verifier_reward: f64,

    /// Timestamp when the transaction was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Signature over the transaction digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

/// A transaction in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transaction {
    Reward(RewardTransaction),
    Transfer(TransferTransaction),
}

impl Transaction {
    /// Creates an unsigned reward transaction
    pub fn reward(to: Address, amount: f64) -> Self {
        Transaction::Reward(RewardTransaction {
            id: Uuid::new_v4().to_string(),
            to,
            amount,
            timestamp: Utc::now(),
        })
    }

    /// Creates an unsigned transfer with no verifier reward
    pub fn transfer(from: Address, to: Address, amount: f64) -> Self {
        Transaction::Transfer(TransferTransaction {
            id: Uuid::new_v4().to_string(),
            from,
            to,
            amount,
            verifier_reward: 0.0,
            timestamp: Utc::now(),
            signature: None,
        })
    }

    /// Sets the verifier reward of a transfer; reward transactions are returned unchanged
    pub fn with_verifier_reward(mut self, reward: f64) -> Self {
        if let Transaction::Transfer(transfer) = &mut self {
            transfer.verifier_reward = reward;
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            Transaction::Reward(tx) => &tx.id,
            Transaction::Transfer(tx) => &tx.id,
        }
    }

    /// Sender of the transaction, `None` for rewards
    pub fn from(&self) -> Option<&Address> {
        match self {
            Transaction::Reward(_) => None,
            Transaction::Transfer(tx) => Some(&tx.from),
        }
    }

    pub fn to(&self) -> &Address {
        match self {
            Transaction::Reward(tx) => &tx.to,
            Transaction::Transfer(tx) => &tx.to,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Transaction::Reward(tx) => tx.amount,
            Transaction::Transfer(tx) => tx.amount,
        }
    }

    pub fn verifier_reward(&self) -> f64 {
        match self {
            Transaction::Reward(_) => 0.0,
            Transaction::Transfer(tx) => tx.verifier_reward,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Transaction::Reward(tx) => tx.timestamp,
            Transaction::Transfer(tx) => tx.timestamp,
        }
    }

    pub fn signature(&self) -> Option<&DigitalSignature> {
        match self {
            Transaction::Reward(_) => None,
            Transaction::Transfer(tx) => tx.signature.as_ref(),
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward(_))
    }

    /// Amount the sender must hold for the transaction to be accepted
    pub fn total_amount(&self) -> f64 {
        self.amount() + self.verifier_reward()
    }

    /// Hex digest over sender, recipient, amount and timestamp
    ///
    /// This is the message that gets signed. Rewards use [`REWARD_SENDER`]
    /// in place of the missing sender. The id and the verifier reward are
    /// left out, so a signature stays valid when a relayer raises the
    /// verifier reward.
    pub fn compute_digest(&self) -> String {
        let from = self.from().map_or(REWARD_SENDER, Address::as_str);
        let data = serde_json::json!({
            "from": from,
            "to": self.to().as_str(),
            "amount": self.amount(),
            "timestamp": self.timestamp(),
        });

        digest_hex(data.to_string().as_bytes())
    }

    /// Signs the transaction digest with the sender's key pair
    pub fn sign(&mut self, keys: &KeyPair) -> Result<(), TransactionError> {
        let digest = self.compute_digest();

        let transfer = match self {
            Transaction::Reward(_) => return Err(TransactionError::InvalidOperation),
            Transaction::Transfer(transfer) => transfer,
        };

        if keys.address() != &transfer.from {
            return Err(TransactionError::SenderMismatch {
                signer: keys.address().to_string(),
                sender: transfer.from.to_string(),
            });
        }

        transfer.signature = Some(keys.sign(digest.as_bytes()));
        Ok(())
    }

    /// Checks the transaction's signature
    ///
    /// Rewards are always valid. A transfer without a signature is an error
    /// rather than merely invalid; a sender or signature that does not decode
    /// verifies as `false`.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let transfer = match self {
            Transaction::Reward(_) => return Ok(true),
            Transaction::Transfer(transfer) => transfer,
        };

        let signature = match &transfer.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = match transfer.from.to_public_key() {
            Ok(key) => key,
            Err(err) => {
                debug!("Transaction {} has undecodable sender: {}", transfer.id, err);
                return Ok(false);
            }
        };

        let digest = self.compute_digest();
        match verify_signature(digest.as_bytes(), signature, &public_key) {
            Ok(valid) => Ok(valid),
            Err(err) => {
                debug!("Transaction {} has undecodable signature: {}", transfer.id, err);
                Ok(false)
            }
        }
    }
}
