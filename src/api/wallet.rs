use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use log::{info, warn};

use std::path::PathBuf;

use super::models::{
    AppState, HistoryQuery, LoadWalletRequest, LoadWalletResponse, NewWalletRequest,
    NewWalletResponse, TransferRequest, TransferResponse, WalletResponse,
};
use super::optional_json;
use crate::storage;
use crate::wallet::{Wallet, WalletError, format_amount, parse_amount};

/// Entries returned by the history endpoint when `last` is not given.
const DEFAULT_HISTORY: usize = 5;

#[get("/wallet/")]
pub async fn wallet_info(state: web::Data<AppState>) -> impl Responder {
    let wallet = state.wallet.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(WalletResponse {
        address: wallet.address.clone(),
        public_key: wallet.public_key.clone(),
        balance: wallet.balance(),
        balance_display: format_amount(wallet.balance()),
        transactions: wallet.history().len(),
    })
}

#[get("/wallet/history/")]
pub async fn wallet_history(
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let wallet = state.wallet.lock().expect("mutex poisoned");
    let last = query.last.unwrap_or(DEFAULT_HISTORY);
    HttpResponse::Ok().json(wallet.recent(last))
}

/// Generate a key pair. With `replace`, it becomes the node's wallet and
/// future rewards go to it.
#[post("/wallet/new/")]
pub async fn create_wallet(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let replace = match optional_json::<NewWalletRequest>(&body) {
        Ok(req) => req.replace,
        Err(resp) => return resp,
    };
    let fresh = Wallet::generate();
    let resp = NewWalletResponse {
        private_key: fresh.secret_key_hex().to_string(),
        public_key: fresh.public_key.clone(),
        address: fresh.address.clone(),
        active: replace,
    };

    if replace {
        let mut wallet = state.wallet.lock().expect("mutex poisoned");
        info!("WALLET - replacing {} with {}", wallet.address, fresh.address);
        *wallet = fresh;
        if state.config.autosave {
            if let Err(e) = storage::save_wallet(&wallet, &state.config.wallet_file) {
                warn!("WALLET - autosave failed: {e}");
            }
        }
    }

    HttpResponse::Ok().json(resp)
}

/// Load a wallet from a hex secret key or from a wallet snapshot file
/// (the configured one when neither is given). A secret key wins over a
/// path and yields an empty history. With `replace` the loaded wallet
/// becomes the node's wallet.
#[post("/wallet/load/")]
pub async fn load_wallet(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let req: LoadWalletRequest = match optional_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    let loaded = match req.secret_key.as_deref() {
        Some(secret) => Wallet::from_secret_hex(secret).map_err(|e| e.to_string()),
        None => {
            let path = req
                .path
                .map_or_else(|| state.config.wallet_file.clone(), PathBuf::from);
            storage::load_wallet(&path).map_err(|e| format!("{}: {e}", path.display()))
        }
    };
    let loaded = match loaded {
        Ok(w) => w,
        Err(e) => {
            warn!("WALLET - load failed: {e}");
            return HttpResponse::BadRequest().body(e);
        }
    };

    let resp = LoadWalletResponse {
        address: loaded.address.clone(),
        public_key: loaded.public_key.clone(),
        balance: format_amount(loaded.balance()),
        transactions: loaded.history().len(),
        active: req.replace,
    };

    if req.replace {
        let mut wallet = state.wallet.lock().expect("mutex poisoned");
        info!("WALLET - replacing {} with loaded {}", wallet.address, loaded.address);
        *wallet = loaded;
        if state.config.autosave {
            if let Err(e) = storage::save_wallet(&wallet, &state.config.wallet_file) {
                warn!("WALLET - autosave failed: {e}");
            }
        }
    }

    HttpResponse::Ok().json(resp)
}

/// Send coins from the node's wallet. The transfer is debited now and
/// queued for the next mined block.
#[post("/wallet/transfer/")]
pub async fn transfer(
    state: web::Data<AppState>,
    req: web::Json<TransferRequest>,
) -> impl Responder {
    let amount = match parse_amount(&req.amount) {
        Ok(a) => a,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    let mut wallet = state.wallet.lock().expect("mutex poisoned");
    let tx = match wallet.transfer(&req.to, amount, Utc::now().timestamp()) {
        Ok(tx) => tx,
        Err(e @ WalletError::HistoryFull { .. }) => {
            return HttpResponse::Conflict().body(e.to_string());
        }
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    let pending = {
        let mut queue = state.pending.lock().expect("mutex poisoned");
        queue.push(tx.clone());
        queue.len()
    };
    info!(
        "WALLET - queued {} to {} (tx {}, {pending} pending)",
        format_amount(tx.amount),
        tx.to,
        tx.hash
    );

    if state.config.autosave {
        if let Err(e) = storage::save_wallet(&wallet, &state.config.wallet_file) {
            warn!("WALLET - autosave failed: {e}");
        }
    }

    HttpResponse::Ok().json(TransferResponse {
        balance: format_amount(wallet.balance()),
        transaction: tx,
        pending,
    })
}
