use super::chain::{CubeChain, LedgerError};
use super::crypto::{Address, KeyPair};
use super::transaction::Transaction;

/// A key pair bound to the ledger it transacts against
#[derive(Debug, Clone)]
pub struct Wallet {
    keys: KeyPair,
    ledger: CubeChain,
}

impl Wallet {
    /// Creates a wallet with a freshly generated key pair
    pub fn new(ledger: CubeChain) -> Self {
        Self::from_key_pair(KeyPair::generate(), ledger)
    }

    pub fn from_key_pair(keys: KeyPair, ledger: CubeChain) -> Self {
        Wallet { keys, ledger }
    }

    pub fn address(&self) -> &Address {
        self.keys.address()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.keys
    }

    pub fn get_balance(&self) -> f64 {
        self.ledger.get_balance_of_address(self.address())
    }

    /// Signs and submits a transfer carrying the ledger's configured verifier reward
    ///
    /// Returns the pooled transaction so it can be handed to a verifier.
    pub fn send_money(&self, amount: f64, payee_address: &Address) -> Result<Transaction, LedgerError> {
        let verifier_reward = self.ledger.config().verifier_reward;
        self.send_money_with_reward(amount, payee_address, verifier_reward)
    }

    pub fn send_money_with_reward(
        &self,
        amount: f64,
        payee_address: &Address,
        verifier_reward: f64,
    ) -> Result<Transaction, LedgerError> {
        let mut transaction = Transaction::transfer(self.address().clone(), payee_address.clone(), amount)
            .with_verifier_reward(verifier_reward);
        transaction.sign(&self.keys)?;

        self.ledger.add_transaction(transaction.clone())?;
        Ok(transaction)
    }

    /// Attests a pending transaction, earning its verifier reward
    pub fn verify_transaction(&self, transaction: &Transaction) -> Result<Transaction, LedgerError> {
        self.ledger.verify_transaction(transaction, self.address())
    }
}
