mod api;
mod blockchain;
mod config;
mod storage;
mod transaction;
mod wallet;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{info, warn};
use std::io;

use api::AppState;
use blockchain::Ledger;
use config::Config;
use wallet::Wallet;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env();
    let ledger = load_or_new_ledger(&config);
    let wallet = load_or_new_wallet(&config);
    let (host, port) = (config.host.clone(), config.port);

    println!("🏛️ Starting Archimedes chain API at http://{host}:{port}");
    println!("   miner wallet {}", wallet.address);

    let state = AppState::new(config, ledger, wallet)
        .map_err(io::Error::other)?;
    let state = web::Data::new(state);
    let server_state = state.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    state.pool.shutdown();
    save_on_exit(&state);
    Ok(())
}

fn load_or_new_ledger(config: &Config) -> Ledger {
    if !config.chain_file.exists() {
        return Ledger::new();
    }
    match storage::load_chain(&config.chain_file) {
        Ok(ledger) => {
            if ledger.is_empty() {
                info!("{} holds no blocks", config.chain_file.display());
            } else {
                info!(
                    "restored {} blocks from {}",
                    ledger.len(),
                    config.chain_file.display()
                );
            }
            if !ledger.is_valid_chain() {
                warn!("restored chain fails validation; keeping it for inspection");
            }
            ledger
        }
        Err(e) => {
            warn!("could not load {}: {e}; starting empty", config.chain_file.display());
            Ledger::new()
        }
    }
}

fn load_or_new_wallet(config: &Config) -> Wallet {
    if config.wallet_file.exists() {
        match storage::load_wallet(&config.wallet_file) {
            Ok(wallet) => return wallet,
            Err(e) => warn!(
                "could not load {}: {e}; generating a new wallet",
                config.wallet_file.display()
            ),
        }
    }
    let wallet = Wallet::generate();
    info!("generated wallet {}", wallet.address);
    wallet
}

fn save_on_exit(state: &AppState) {
    if !state.config.autosave {
        return;
    }
    let ledger = state.ledger.lock().expect("mutex poisoned");
    if let Err(e) = storage::save_chain(&ledger, &state.config.chain_file) {
        warn!("final chain save failed: {e}");
    }
    let wallet = state.wallet.lock().expect("mutex poisoned");
    if let Err(e) = storage::save_wallet(&wallet, &state.config.wallet_file) {
        warn!("final wallet save failed: {e}");
    }
}
