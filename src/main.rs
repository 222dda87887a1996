use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cubechain::api::{self, ApiDoc};
use cubechain::ledger::{CubeChain, KeyPair};
use cubechain::NodeConfig;

const CONFIG_ENV: &str = "CUBECHAIN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "cubechain.toml";

// Mine a first cube to a fresh key pair so the node has a funded account to play with
fn create_test_wallet(ledger: &CubeChain) -> KeyPair {
    let keys = KeyPair::generate();
    info!("Created test wallet with address: {}", keys.address());
    info!("Test wallet private key: {}", hex::encode(keys.export_secret_key()));

    ledger.mine_pending_transactions(keys.address());
    info!(
        "Test wallet funded with {} coins",
        ledger.get_balance_of_address(keys.address())
    );

    keys
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = NodeConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    info!(
        "Ledger difficulty {}, mining reward {}, verifier reward {}",
        config.ledger.difficulty, config.ledger.mining_reward, config.ledger.verifier_reward
    );

    let ledger = CubeChain::with_config(config.ledger.clone());
    create_test_wallet(&ledger);
    let ledger = web::Data::new(ledger);

    let bind = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind(bind)
    .context("failed to bind HTTP server")?
    .run()
    .await?;

    Ok(())
}
