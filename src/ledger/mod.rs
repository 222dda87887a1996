// Ledger module
//
// This module contains the core ledger implementation including:
// - Cube (block) structure and proof of work
// - CubeChain (ledger) structure
// - Transaction structure
// - Cryptography utilities
// - Wallet

pub mod chain;
pub mod crypto;
pub mod cube;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use chain::{CubeChain, LedgerError};
pub use crypto::{Address, DigitalSignature, KeyPair};
pub use cube::{Cube, CubeError};
pub use transaction::{RewardTransaction, Transaction, TransactionError, TransferTransaction};
pub use wallet::Wallet;
