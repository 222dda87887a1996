//! Random trading simulation against an in-memory ledger
//!
//! Funds a set of wallets, then runs rounds of random transfers (each
//! attested by a random verifier) and occasional mining, and finally prints
//! every balance and the chain's validity.

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use cubechain::config::LedgerConfig;
use cubechain::ledger::{CubeChain, Wallet};

const WALLETS: usize = 10;
const ROUNDS: usize = 50;
const INITIAL_FUNDS: f64 = 1000.0;
const MINE_PROBABILITY: f64 = 0.2;

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let ledger = CubeChain::with_config(LedgerConfig {
        verifier_reward: 1.0,
        ..LedgerConfig::default()
    });

    let wallets: Vec<(usize, Wallet)> = (1..=WALLETS)
        .map(|name| (name, Wallet::new(ledger.clone())))
        .collect();
    let miners: Vec<&(usize, Wallet)> = wallets
        .iter()
        .filter(|(name, _)| [1, 2, 9, 10].contains(name))
        .collect();
    let verifiers: Vec<&(usize, Wallet)> = wallets.iter().filter(|(name, _)| *name >= 3).collect();

    for (_, wallet) in &wallets {
        ledger.mine_pending_transactions_with_reward(wallet.address(), INITIAL_FUNDS);
    }

    let mut rng = rand::thread_rng();
    for _ in 0..ROUNDS {
        if rng.gen_bool(MINE_PROBABILITY) {
            if let Some((name, miner)) = miners.choose(&mut rng) {
                info!("Mining a new cube with Wallet {}", name);
                ledger.mine_pending_transactions(miner.address());
            }
            continue;
        }

        let mut pair = wallets.choose_multiple(&mut rng, 2);
        let (Some((sender_name, sender)), Some((recipient_name, recipient))) = (pair.next(), pair.next()) else {
            continue;
        };
        let Some((verifier_name, verifier)) = verifiers.choose(&mut rng) else {
            continue;
        };
        let amount = f64::from(rng.gen_range(5u32..=500));

        info!(
            "Sending {} from Wallet {} to Wallet {}, verified by Wallet {}",
            amount, sender_name, recipient_name, verifier_name
        );

        let result = sender
            .send_money(amount, recipient.address())
            .and_then(|transaction| verifier.verify_transaction(&transaction));
        if let Err(err) = result {
            warn!("Transaction failed: {}", err);
        }
    }

    println!("\nFinal Balances:");
    for (name, wallet) in &wallets {
        println!("Wallet {} balance: {}", name, wallet.get_balance());
    }

    println!("\nIs chain valid? {}", ledger.is_chain_valid());
}
