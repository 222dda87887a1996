//! CubeChain: a minimal proof-of-work ledger
//!
//! Cubes (blocks) of signed transfers are linked by hash and mined to a
//! configurable difficulty. Balances are derived by replaying the whole chain.
//!
//! ```no_run
//! use cubechain::ledger::{CubeChain, Wallet};
//!
//! let ledger = CubeChain::new();
//! let alice = Wallet::new(ledger.clone());
//! let bob = Wallet::new(ledger.clone());
//!
//! ledger.mine_pending_transactions(alice.address());
//! alice.send_money(50.0, bob.address()).unwrap();
//! ledger.mine_pending_transactions(alice.address());
//!
//! assert_eq!(bob.get_balance(), 50.0);
//! assert!(ledger.is_chain_valid());
//! ```

pub mod api;
pub mod config;
pub mod ledger;

pub use config::{LedgerConfig, NodeConfig};
pub use ledger::{Address, Cube, CubeChain, KeyPair, LedgerError, Transaction, Wallet};
