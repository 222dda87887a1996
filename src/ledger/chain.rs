use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::LedgerConfig;

use super::crypto::Address;
use super::cube::{Cube, CubeError};
use super::transaction::{Transaction, TransactionError};

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Cannot add invalid transaction to chain")]
    InvalidSignature,

    #[error("Transaction amount should be higher than 0, got {0}")]
    NonPositiveAmount(f64),

    #[error("Not enough balance in sender address: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Transaction {0} not found in pending transactions")]
    TransactionNotPending(String),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Mining error: {0}")]
    CubeError(#[from] CubeError),
}

/// Chain and pool, always locked together
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Cube>,
    pending_transactions: Vec<Transaction>,
}

impl LedgerState {
    fn latest_cube(&self) -> &Cube {
        // The genesis cube is pushed on construction and nothing is ever removed
        &self.chain[self.chain.len() - 1]
    }

    fn balance_of(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for cube in &self.chain {
            for tx in &cube.transactions {
                if tx.from() == Some(address) {
                    balance -= tx.amount() + tx.verifier_reward();
                }

                if tx.to() == address {
                    balance += tx.amount();
                }
            }
        }

        balance
    }

    /// Next cube holding the pool followed by the miner's reward
    fn candidate_cube(&self, miner: &Address, reward: f64) -> Cube {
        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::reward(miner.clone(), reward));

        Cube::new(
            Utc::now(),
            transactions,
            self.latest_cube().hash.clone(),
            Some(miner.clone()),
        )
    }

    fn is_valid(&self) -> bool {
        for (index, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let height = index + 1;

            if !current.has_valid_transactions() {
                warn!("Cube {} contains invalid transactions", height);
                return false;
            }

            if current.hash != current.compute_hash() {
                warn!("Cube {} hash does not match its contents", height);
                return false;
            }

            if current.previous_hash != previous.hash {
                warn!("Cube {} is not linked to cube {}", height, index);
                return false;
            }
        }

        true
    }

    fn append(&mut self, cube: Cube) {
        info!(
            "Cube {} mined by {} with {} transactions (nonce {})",
            cube.hash,
            cube.miner.as_ref().map_or("-", Address::as_str),
            cube.transactions.len(),
            cube.nonce
        );

        self.chain.push(cube);
        self.pending_transactions.clear();
    }
}

/// The ledger: a chain of cubes plus the pool of pending transactions
///
/// Cloning yields another handle onto the same ledger. Every operation takes
/// the single internal lock for its whole duration, so mining never races
/// another append.
#[derive(Debug, Clone)]
pub struct CubeChain {
    state: Arc<Mutex<LedgerState>>,
    config: LedgerConfig,
}

impl Default for CubeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl CubeChain {
    /// Creates a ledger with the default config and a fresh genesis cube
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let state = LedgerState {
            chain: vec![Self::create_genesis_cube()],
            pending_transactions: Vec::new(),
        };

        CubeChain {
            state: Arc::new(Mutex::new(state)),
            config,
        }
    }

    /// Creates the genesis cube (first cube in the chain)
    pub fn create_genesis_cube() -> Cube {
        Cube::new(Utc::now(), Vec::new(), "0".to_string(), None)
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.config.mining_reward
    }

    /// Gets the last cube in the chain
    pub fn latest_cube(&self) -> Cube {
        self.state().latest_cube().clone()
    }

    /// Snapshot of the whole chain
    pub fn chain(&self) -> Vec<Cube> {
        self.state().chain.clone()
    }

    /// Number of cubes, genesis included
    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    /// Always false: the genesis cube is never removed
    pub fn is_empty(&self) -> bool {
        self.state().chain.is_empty()
    }

    /// Snapshot of the pending pool
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state().pending_transactions.clone()
    }

    /// Finds a pending transaction by id
    pub fn pending_transaction(&self, id: &str) -> Option<Transaction> {
        self.state()
            .pending_transactions
            .iter()
            .find(|tx| tx.id() == id)
            .cloned()
    }

    /// Validates a signed transfer and adds it to the pending pool
    ///
    /// Checks run in order: sender and recipient present, signature valid,
    /// amount positive, sender balance covers amount plus verifier reward.
    /// The pool is only touched once every check has passed.
    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), LedgerError> {
        let from = match transaction.from() {
            Some(from) if !from.is_empty() && !transaction.to().is_empty() => from.clone(),
            _ => {
                warn!("Rejected transaction {}: missing address", transaction.id());
                return Err(LedgerError::MalformedTransaction(
                    "Transaction must include from and to address".to_string(),
                ));
            }
        };

        if !transaction.is_valid()? {
            warn!("Rejected transaction {}: invalid signature", transaction.id());
            return Err(LedgerError::InvalidSignature);
        }

        // Written so that NaN is rejected as well
        if !(transaction.amount() > 0.0) {
            return Err(LedgerError::NonPositiveAmount(transaction.amount()));
        }

        let verifier_reward = transaction.verifier_reward();
        if !verifier_reward.is_finite() || verifier_reward < 0.0 {
            return Err(LedgerError::MalformedTransaction(format!(
                "Verifier reward must be a non-negative number, got {}",
                verifier_reward
            )));
        }

        let mut state = self.state();

        let required = transaction.total_amount();
        let available = state.balance_of(&from);
        if available < required {
            warn!(
                "Rejected transaction {}: balance {} below {}",
                transaction.id(),
                available,
                required
            );
            return Err(LedgerError::InsufficientBalance { required, available });
        }

        debug!("Transaction {} added to pending pool", transaction.id());
        state.pending_transactions.push(transaction);

        Ok(())
    }

    /// Attests a pending transaction, pooling a reward for the verifier
    ///
    /// Each call mints another reward; the transaction itself stays pending.
    pub fn verify_transaction(
        &self,
        transaction: &Transaction,
        verifier_address: &Address,
    ) -> Result<Transaction, LedgerError> {
        let mut state = self.state();

        if !state.pending_transactions.contains(transaction) {
            return Err(LedgerError::TransactionNotPending(transaction.id().to_string()));
        }

        let reward = Transaction::reward(verifier_address.clone(), transaction.verifier_reward());
        state.pending_transactions.push(reward.clone());

        info!("Transaction {} verified by {}", transaction.id(), verifier_address);

        Ok(reward)
    }

    /// Mines the pending pool into a new cube paying the configured reward
    pub fn mine_pending_transactions(&self, miner_address: &Address) -> Cube {
        self.mine_pending_transactions_with_reward(miner_address, self.config.mining_reward)
    }

    /// Mines the pending pool into a new cube paying `reward` to the miner
    pub fn mine_pending_transactions_with_reward(&self, miner_address: &Address, reward: f64) -> Cube {
        let mut state = self.state();

        let mut cube = state.candidate_cube(miner_address, reward);
        cube.mine(self.config.difficulty);

        state.append(cube.clone());
        cube
    }

    /// Mines with at most `max_attempts` nonce increments
    ///
    /// On [`CubeError::MiningExhausted`] neither the chain nor the pool change.
    pub fn try_mine_pending_transactions(
        &self,
        miner_address: &Address,
        max_attempts: u64,
    ) -> Result<Cube, LedgerError> {
        let mut state = self.state();

        let mut cube = state.candidate_cube(miner_address, self.config.mining_reward);
        cube.mine_bounded(self.config.difficulty, max_attempts)?;

        state.append(cube.clone());
        Ok(cube)
    }

    /// Replays every transaction in the chain to compute a balance
    pub fn get_balance_of_address(&self, address: &Address) -> f64 {
        self.state().balance_of(address)
    }

    /// Validates transactions, hashes and linkage of every cube after genesis
    pub fn is_chain_valid(&self) -> bool {
        self.state().is_valid()
    }

    /// Copy of the chain together with its validity, taken under one lock
    pub fn snapshot(&self) -> (Vec<Cube>, bool) {
        let state = self.state();
        (state.chain.clone(), state.is_valid())
    }

    #[cfg(test)]
    pub(crate) fn with_chain_mut<R>(&self, f: impl FnOnce(&mut Vec<Cube>) -> R) -> R {
        f(&mut self.state().chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::crypto::KeyPair;

    fn test_config() -> LedgerConfig {
        LedgerConfig {
            difficulty: 1,
            mining_reward: 100.0,
            verifier_reward: 0.0,
        }
    }

    fn signed_transfer(sender: &KeyPair, to: &Address, amount: f64) -> Transaction {
        let mut tx = Transaction::transfer(sender.address().clone(), to.clone(), amount);
        tx.sign(sender).unwrap();
        tx
    }

    #[test]
    fn test_new_chain() {
        let ledger = CubeChain::new();
        let chain = ledger.chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].previous_hash, "0");
        assert!(chain[0].transactions.is_empty());
        assert!(chain[0].miner.is_none());
        assert_eq!(ledger.difficulty(), 2);
        assert_eq!(ledger.mining_reward(), 100.0);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_genesis_balance_is_zero() {
        let ledger = CubeChain::with_config(test_config());
        assert_eq!(ledger.get_balance_of_address(&Address::from("anyone")), 0.0);
    }

    #[test]
    fn test_mine_rewards_miner() {
        let ledger = CubeChain::with_config(test_config());
        let miner = KeyPair::generate();

        let cube = ledger.mine_pending_transactions(miner.address());

        assert_eq!(ledger.len(), 2);
        assert_eq!(cube.transactions.len(), 1);
        assert!(cube.meets_difficulty(1));
        assert_eq!(cube.miner.as_ref(), Some(miner.address()));
        assert_eq!(ledger.get_balance_of_address(miner.address()), 100.0);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_mine_with_explicit_reward() {
        let ledger = CubeChain::with_config(test_config());
        let miner = KeyPair::generate();

        ledger.mine_pending_transactions_with_reward(miner.address(), 1000.0);
        assert_eq!(ledger.get_balance_of_address(miner.address()), 1000.0);
    }

    #[test]
    fn test_add_transaction_and_mine() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let miner = KeyPair::generate();

        ledger.mine_pending_transactions(alice.address());
        ledger.add_transaction(signed_transfer(&alice, bob.address(), 50.0)).unwrap();
        assert_eq!(ledger.pending_transactions().len(), 1);

        // Pending transfers do not count yet
        assert_eq!(ledger.get_balance_of_address(bob.address()), 0.0);

        let cube = ledger.mine_pending_transactions(miner.address());
        assert_eq!(cube.transactions.len(), 2);
        assert!(cube.transactions[1].is_reward());
        assert!(ledger.pending_transactions().is_empty());

        assert_eq!(ledger.get_balance_of_address(alice.address()), 50.0);
        assert_eq!(ledger.get_balance_of_address(bob.address()), 50.0);
        assert_eq!(ledger.get_balance_of_address(miner.address()), 100.0);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_reject_reward_transaction() {
        let ledger = CubeChain::with_config(test_config());
        let result = ledger.add_transaction(Transaction::reward(Address::from("someone"), 10.0));

        assert!(matches!(result, Err(LedgerError::MalformedTransaction(_))));
    }

    #[test]
    fn test_reject_empty_recipient() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let result = ledger.add_transaction(signed_transfer(&alice, &Address::from(""), 10.0));
        assert!(matches!(result, Err(LedgerError::MalformedTransaction(_))));
    }

    #[test]
    fn test_reject_unsigned_transaction() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        let tx = Transaction::transfer(alice.address().clone(), Address::from("bob"), 10.0);

        let result = ledger.add_transaction(tx);
        assert!(matches!(
            result,
            Err(LedgerError::TransactionError(TransactionError::MissingSignature))
        ));
    }

    #[test]
    fn test_reject_invalid_signature() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let mut tx = signed_transfer(&alice, &Address::from("bob"), 10.0);
        if let Transaction::Transfer(transfer) = &mut tx {
            transfer.amount = 90.0;
        }

        assert!(matches!(ledger.add_transaction(tx), Err(LedgerError::InvalidSignature)));
    }

    #[test]
    fn test_reject_non_positive_amount() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();

        for amount in [0.0, -5.0, f64::NAN] {
            let result = ledger.add_transaction(signed_transfer(&alice, &Address::from("bob"), amount));
            assert!(matches!(result, Err(LedgerError::NonPositiveAmount(_))));
        }
    }

    #[test]
    fn test_reject_insufficient_balance() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let result = ledger.add_transaction(signed_transfer(&alice, &Address::from("bob"), 150.0));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { required, available })
                if required == 150.0 && available == 100.0
        ));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_verifier_reward_counts_against_sender() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let verifier = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        // 95 + 10 exceeds 100
        let mut tx = Transaction::transfer(alice.address().clone(), bob.address().clone(), 95.0)
            .with_verifier_reward(10.0);
        tx.sign(&alice).unwrap();
        assert!(matches!(
            ledger.add_transaction(tx),
            Err(LedgerError::InsufficientBalance { .. })
        ));

        let mut tx = Transaction::transfer(alice.address().clone(), bob.address().clone(), 40.0)
            .with_verifier_reward(10.0);
        tx.sign(&alice).unwrap();
        ledger.add_transaction(tx.clone()).unwrap();
        ledger.verify_transaction(&tx, verifier.address()).unwrap();
        ledger.mine_pending_transactions(bob.address());

        assert_eq!(ledger.get_balance_of_address(alice.address()), 50.0);
        assert_eq!(ledger.get_balance_of_address(bob.address()), 140.0);
        assert_eq!(ledger.get_balance_of_address(verifier.address()), 10.0);
    }

    #[test]
    fn test_reject_negative_verifier_reward() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let mut tx = Transaction::transfer(alice.address().clone(), Address::from("bob"), 10.0)
            .with_verifier_reward(-1.0);
        tx.sign(&alice).unwrap();

        assert!(matches!(
            ledger.add_transaction(tx),
            Err(LedgerError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_verify_transaction_mints_reward_per_call() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        let verifier = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let mut tx = Transaction::transfer(alice.address().clone(), Address::from("bob"), 10.0)
            .with_verifier_reward(2.0);
        tx.sign(&alice).unwrap();
        ledger.add_transaction(tx.clone()).unwrap();

        let reward = ledger.verify_transaction(&tx, verifier.address()).unwrap();
        assert!(reward.is_reward());
        assert_eq!(reward.to(), verifier.address());
        assert_eq!(reward.amount(), 2.0);

        let pending = ledger.pending_transactions();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.iter().filter(|p| p.to() == verifier.address()).count(), 1);

        ledger.verify_transaction(&tx, verifier.address()).unwrap();
        let pending = ledger.pending_transactions();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending.iter().filter(|p| p.to() == verifier.address()).count(), 2);
        assert!(pending.contains(&tx));
    }

    #[test]
    fn test_verify_unknown_transaction() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        let tx = signed_transfer(&alice, &Address::from("bob"), 1.0);

        let result = ledger.verify_transaction(&tx, &Address::from("verifier"));
        assert!(matches!(result, Err(LedgerError::TransactionNotPending(_))));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_pending_transaction_lookup() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());

        let tx = signed_transfer(&alice, &Address::from("bob"), 1.0);
        ledger.add_transaction(tx.clone()).unwrap();

        assert_eq!(ledger.pending_transaction(tx.id()), Some(tx));
        assert!(ledger.pending_transaction("missing").is_none());
    }

    #[test]
    fn test_try_mine_exhausted_leaves_ledger_unchanged() {
        let ledger = CubeChain::with_config(LedgerConfig {
            difficulty: 64,
            ..test_config()
        });
        let alice = KeyPair::generate();

        let result = ledger.try_mine_pending_transactions(alice.address(), 5);
        assert!(matches!(
            result,
            Err(LedgerError::CubeError(CubeError::MiningExhausted { attempts: 5 }))
        ));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_try_mine_succeeds() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();

        let cube = ledger.try_mine_pending_transactions(alice.address(), 1_000_000).unwrap();
        assert_eq!(ledger.latest_cube(), cube);
        assert_eq!(ledger.get_balance_of_address(alice.address()), 100.0);
    }

    #[test]
    fn test_chain_linkage() {
        let ledger = CubeChain::with_config(test_config());
        let miner = KeyPair::generate();
        for _ in 0..3 {
            ledger.mine_pending_transactions(miner.address());
        }

        let chain = ledger.chain();
        for pair in chain.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
            assert_eq!(pair[1].hash, pair[1].compute_hash());
        }
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_tampered_amount_invalidates_chain() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());
        assert!(ledger.is_chain_valid());

        ledger.with_chain_mut(|chain| {
            if let Transaction::Reward(reward) = &mut chain[1].transactions[0] {
                reward.amount = 1_000_000.0;
            }
        });

        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_rehashed_tampering_breaks_linkage() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());
        ledger.mine_pending_transactions(alice.address());

        ledger.with_chain_mut(|chain| {
            if let Transaction::Reward(reward) = &mut chain[1].transactions[0] {
                reward.amount = 1_000_000.0;
            }
            chain[1].hash = chain[1].compute_hash();
        });

        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_tampered_signature_invalidates_chain() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());
        ledger.add_transaction(signed_transfer(&alice, &Address::from("bob"), 10.0)).unwrap();
        ledger.mine_pending_transactions(alice.address());

        ledger.with_chain_mut(|chain| {
            if let Transaction::Transfer(transfer) = &mut chain[2].transactions[0] {
                transfer.signature = None;
            }
            chain[2].hash = chain[2].compute_hash();
        });

        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_balance_is_idempotent() {
        let ledger = CubeChain::with_config(test_config());
        let alice = KeyPair::generate();
        ledger.mine_pending_transactions(alice.address());
        ledger.add_transaction(signed_transfer(&alice, &Address::from("bob"), 30.0)).unwrap();
        ledger.mine_pending_transactions(alice.address());

        let first = ledger.get_balance_of_address(alice.address());
        assert_eq!(first, 170.0);
        assert_eq!(ledger.get_balance_of_address(alice.address()), first);
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = CubeChain::with_config(test_config());
        let handle = ledger.clone();

        handle.mine_pending_transactions(&Address::from("miner"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_snapshot_matches_chain() {
        let ledger = CubeChain::with_config(test_config());
        ledger.mine_pending_transactions(&Address::from("miner"));

        let (chain, valid) = ledger.snapshot();
        assert_eq!(chain, ledger.chain());
        assert!(valid);

        ledger.with_chain_mut(|chain| chain[1].nonce += 1);

        let (chain, valid) = ledger.snapshot();
        assert_eq!(chain.len(), 2);
        assert!(!valid);
    }
}
