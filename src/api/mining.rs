use actix_web::{HttpResponse, Responder, post, web};
use log::{debug, info, warn};

use super::models::{AppState, MineRequest, MineResponse, MinedBlock};
use super::optional_json;
use crate::blockchain::LedgerError;
use crate::storage;
use crate::wallet::format_amount;

/// Upper bound on blocks mined by a single request.
pub const MAX_BLOCKS_PER_REQUEST: u32 = 32;

/// Mine one or more blocks on the worker pool.
///
/// Sessions run one at a time; concurrent requests queue up behind the
/// running one. The ledger itself is only locked while a block is mined and
/// appended, so readers get in between blocks. Each block takes the coinbase
/// first, then as many queued transfers as fit. An empty body mines one block
/// for the local wallet.
#[post("/mine/")]
pub async fn mine_blocks(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let req: MineRequest = match optional_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let blocks = req.blocks.unwrap_or(1);
    if blocks == 0 || blocks > MAX_BLOCKS_PER_REQUEST {
        return HttpResponse::BadRequest()
            .body(format!("blocks must be between 1 and {MAX_BLOCKS_PER_REQUEST}"));
    }

    let miner_address = match req.miner_address.as_deref().map(str::trim) {
        Some(addr) if !addr.is_empty() => addr.to_string(),
        _ => state.wallet.lock().expect("mutex poisoned").address.clone(),
    };

    let session_state = state.clone();
    let handle = match state
        .pool
        .spawn(move || run_session(&session_state, blocks, miner_address))
    {
        Ok(h) => h,
        Err(e) => return HttpResponse::ServiceUnavailable().body(e.to_string()),
    };

    match web::block(move || handle.join()).await {
        Ok(Ok(Ok(resp))) => HttpResponse::Ok().json(resp),
        Ok(Ok(Err(e))) => {
            warn!("MINER - session failed: {e}");
            HttpResponse::InternalServerError().body(e.to_string())
        }
        Ok(Err(e)) => HttpResponse::InternalServerError().body(e.to_string()),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

fn run_session(
    state: &AppState,
    blocks: u32,
    miner_address: String,
) -> Result<MineResponse, LedgerError> {
    let _session = state.session.lock().expect("mutex poisoned");
    let mut mined = Vec::with_capacity(blocks as usize);

    for _ in 0..blocks {
        let pending = state.pending.lock().expect("mutex poisoned").clone();
        let schedule = state.rewards.lock().expect("mutex poisoned").clone();

        let mut ledger = state.ledger.lock().expect("mutex poisoned");
        let report = ledger.mine_next(Some(miner_address.as_str()), Some(&schedule), &pending)?;
        state
            .rewards
            .lock()
            .expect("mutex poisoned")
            .set_height(ledger.len() as u64);

        {
            let mut queue = state.pending.lock().expect("mutex poisoned");
            let consumed = report.pending_consumed.min(queue.len());
            queue.drain(..consumed);
            debug!(
                "MINER - block #{} took {consumed} queued transfers, {} left",
                report.index,
                queue.len()
            );
        }

        let Some(block) = ledger.tip() else { break };
        if let Some(coinbase) = block.coinbase() {
            let mut wallet = state.wallet.lock().expect("mutex poisoned");
            if coinbase.to == wallet.address {
                if let Err(e) = wallet.record(coinbase) {
                    warn!("MINER - reward for block #{} not credited: {e}", block.index);
                }
            }
        }
        state.metrics.lock().expect("mutex poisoned").record(&report);

        mined.push(MinedBlock {
            index: block.index,
            hash: block.hash,
            nonce: block.nonce,
            difficulty: block.difficulty,
            digits: block.digit_count,
            reward: block.mining_reward,
            transactions: block.transactions.len(),
            attempts: report.attempts,
            exhausted: report.exhausted,
            mining_time_secs: report.total_time().as_secs_f64(),
        });
    }

    let (height, total_difficulty) = {
        let ledger = state.ledger.lock().expect("mutex poisoned");
        if state.config.autosave {
            if let Err(e) = storage::save_chain(&ledger, &state.config.chain_file) {
                warn!("MINER - autosave of chain failed: {e}");
            }
        }
        (ledger.len(), ledger.total_difficulty())
    };

    let wallet_balance = {
        let wallet = state.wallet.lock().expect("mutex poisoned");
        if state.config.autosave {
            if let Err(e) = storage::save_wallet(&wallet, &state.config.wallet_file) {
                warn!("MINER - autosave of wallet failed: {e}");
            }
        }
        format_amount(wallet.balance())
    };
    info!(
        "MINER - session mined {} blocks, height now {height}",
        mined.len()
    );

    Ok(MineResponse {
        miner_address,
        mined,
        height,
        total_difficulty,
        wallet_balance,
    })
}
