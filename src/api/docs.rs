use utoipa::OpenApi;

use super::handlers;
use crate::ledger::{Address, Cube, DigitalSignature, RewardTransaction, Transaction, TransferTransaction};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::new_transaction,
        handlers::verify_transaction,
        handlers::mine_cube,
        handlers::validate_chain,
        handlers::create_wallet,
        handlers::get_wallet_balance
    ),
    components(
        schemas(
            Cube,
            Transaction,
            RewardTransaction,
            TransferTransaction,
            Address,
            DigitalSignature,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::TransactionResponse,
            handlers::VerifyRequest,
            handlers::VerifyResponse,
            handlers::MineRequest,
            handlers::MineResponse,
            handlers::WalletResponse,
            handlers::BalanceResponse
        )
    ),
    tags(
        (name = "cubechain", description = "CubeChain ledger API endpoints")
    ),
    info(
        title = "CubeChain API",
        version = "0.1.0",
        description = "A minimal proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
