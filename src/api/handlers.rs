use actix_web::{error::BlockingError, web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{Address, Cube, CubeChain, KeyPair, LedgerError, Transaction};

/// Shared ledger handle
pub type LedgerData = web::Data<CubeChain>;

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: String) -> HttpResponse {
    builder.json(serde_json::json!({ "error": message }))
}

/// Ledger calls block on its mutex, so handlers run them on the blocking pool
fn blocking_failed(task: &str, err: BlockingError) -> HttpResponse {
    error!("{} task failed: {}", task, err);
    error_response(
        HttpResponse::InternalServerError(),
        format!("{} failed: {}", task, err),
    )
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The number of cubes in the chain
    pub length: usize,

    /// The cubes in the chain
    pub chain: Vec<Cube>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender: String,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,

    /// Reward paid to each verifier; defaults to the ledger's configured value
    #[serde(default)]
    pub verifier_reward: Option<f64>,

    /// The sender's private key (hex, for signing)
    pub private_key: String,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// The signed transaction now in the pending pool
    pub transaction: Transaction,
}

/// Request for the verify endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// The address credited with the verifier reward
    pub verifier_address: String,
}

/// Response for the verify endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub message: String,

    /// The reward transaction added to the pending pool
    pub reward: Transaction,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The miner's address
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly mined cube
    pub cube: Cube,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}

/// Get the full chain
///
/// Returns every cube and the chain's validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(ledger: LedgerData) -> impl Responder {
    let ledger = ledger.into_inner();
    match web::block(move || ledger.snapshot()).await {
        Ok((chain, is_valid)) => HttpResponse::Ok().json(ChainResponse {
            length: chain.len(),
            chain,
            is_valid,
        }),
        Err(err) => blocking_failed("Chain snapshot", err),
    }
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(ledger: LedgerData) -> impl Responder {
    let ledger = ledger.into_inner();
    match web::block(move || ledger.pending_transactions()).await {
        Ok(pending) => HttpResponse::Ok().json(pending),
        Err(err) => blocking_failed("Pending pool read", err),
    }
}

/// Create a new transaction
///
/// Signs a transfer with the given private key and adds it to the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data")
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let transaction_req = transaction_req.into_inner();

    let private_key_bytes = match hex::decode(&transaction_req.private_key) {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                HttpResponse::BadRequest(),
                "Invalid private key format. Must be a hex string.".to_string(),
            );
        }
    };

    let keys = match KeyPair::from_secret_key(&private_key_bytes) {
        Ok(keys) => keys,
        Err(err) => {
            return error_response(HttpResponse::BadRequest(), format!("Invalid private key: {}", err));
        }
    };

    let verifier_reward = transaction_req
        .verifier_reward
        .unwrap_or(ledger.config().verifier_reward);

    let mut transaction = Transaction::transfer(
        Address(transaction_req.sender),
        Address(transaction_req.recipient),
        transaction_req.amount,
    )
    .with_verifier_reward(verifier_reward);

    if let Err(err) = transaction.sign(&keys) {
        return error_response(
            HttpResponse::BadRequest(),
            format!("Failed to sign transaction: {}", err),
        );
    }

    let ledger = ledger.into_inner();
    let pooled = transaction.clone();
    match web::block(move || ledger.add_transaction(pooled)).await {
        Ok(Ok(())) => HttpResponse::Created().json(TransactionResponse {
            message: "Transaction added to pending pool".to_string(),
            transaction,
        }),
        Ok(Err(err)) => error_response(
            HttpResponse::BadRequest(),
            format!("Failed to add transaction: {}", err),
        ),
        Err(err) => blocking_failed("Add transaction", err),
    }
}

/// Verify a pending transaction
///
/// Adds a reward transaction for the verifier to the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/verify",
    params(
        ("id" = String, Path, description = "Id of the pending transaction")
    ),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Transaction verified", body = VerifyResponse),
        (status = 404, description = "Transaction is not pending")
    )
)]
pub async fn verify_transaction(
    ledger: LedgerData,
    id: web::Path<String>,
    verify_req: web::Json<VerifyRequest>,
) -> impl Responder {
    let id = id.into_inner();
    let verifier = Address(verify_req.into_inner().verifier_address);

    let ledger = ledger.into_inner();
    let lookup_id = id.clone();
    let credited = verifier.clone();
    let result = web::block(move || -> Result<Transaction, LedgerError> {
        let transaction = ledger
            .pending_transaction(&lookup_id)
            .ok_or_else(|| LedgerError::TransactionNotPending(lookup_id))?;
        // Fails again if the transaction was mined after the lookup
        ledger.verify_transaction(&transaction, &credited)
    })
    .await;

    match result {
        Ok(Ok(reward)) => HttpResponse::Ok().json(VerifyResponse {
            message: format!("Transaction verified by {}", verifier),
            reward,
        }),
        Ok(Err(LedgerError::TransactionNotPending(_))) => error_response(
            HttpResponse::NotFound(),
            format!("Transaction {} not found in pending transactions", id),
        ),
        Ok(Err(err)) => error_response(HttpResponse::BadRequest(), err.to_string()),
        Err(err) => blocking_failed("Verification", err),
    }
}

/// Mine a new cube
///
/// Packs all pending transactions plus the mining reward into a new cube
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Cube mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_cube(ledger: LedgerData, mine_req: web::Json<MineRequest>) -> impl Responder {
    let miner = Address(mine_req.into_inner().miner_address);
    if miner.is_empty() {
        return error_response(HttpResponse::BadRequest(), "Miner address must be set".to_string());
    }

    let ledger = ledger.into_inner();
    match web::block(move || ledger.mine_pending_transactions(&miner)).await {
        Ok(cube) => HttpResponse::Ok().json(MineResponse {
            message: "New Cube Mined".to_string(),
            cube,
        }),
        Err(err) => blocking_failed("Mining", err),
    }
}

/// Check if the chain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Chain validation status", body = bool)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    let ledger = ledger.into_inner();
    match web::block(move || ledger.is_chain_valid()).await {
        Ok(is_valid) => HttpResponse::Ok().json(is_valid),
        Err(err) => blocking_failed("Validation", err),
    }
}

/// Create a new wallet
///
/// Creates a new key pair; the private key must be stored by the caller
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let keys = KeyPair::generate();

    HttpResponse::Created().json(WalletResponse {
        address: keys.address().to_string(),
        private_key: hex::encode(keys.export_secret_key()),
    })
}

/// Get wallet balance
///
/// Replays the chain to compute the balance of an address
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to query")
    ),
    responses(
        (status = 200, description = "Wallet balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_wallet_balance(ledger: LedgerData, address: web::Path<String>) -> impl Responder {
    let address = Address(address.into_inner());

    let ledger = ledger.into_inner();
    let queried = address.clone();
    match web::block(move || ledger.get_balance_of_address(&queried)).await {
        Ok(balance) => HttpResponse::Ok().json(BalanceResponse {
            address: address.0,
            balance,
        }),
        Err(err) => blocking_failed("Balance replay", err),
    }
}
