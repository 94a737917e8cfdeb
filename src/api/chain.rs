use actix_web::{HttpResponse, Result, get, post, web};
use log::{info, warn};

use super::models::{
    AppState, BlockDetailResponse, BlockSummary, ChainResponse, ChainSummaryResponse, DigitAudit,
    DigitsQuery, ImportResponse, ValidateResponse,
};
use super::{json_body, with_ledger};
use crate::blockchain::{Block, digits};
use crate::storage::ChainSnapshot;
use crate::wallet::format_amount;

/// Get the full blockchain (digit payloads omitted).
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> Result<HttpResponse> {
    let body = with_ledger(&state, |ledger| {
        serde_json::to_vec(&ChainResponse {
            length: ledger.len(),
            total_difficulty: ledger.total_difficulty(),
            chain: ledger.blocks(),
        })
    })
    .await??;
    Ok(json_body(body))
}

fn block_detail(block: &Block, limit: Option<usize>) -> BlockDetailResponse<'_> {
    let digits_shown = match limit {
        Some(limit) => &block.digit_sequence[..limit.min(block.digit_sequence.len())],
        None => block.digit_sequence.as_str(),
    };
    let audit = block.has_digits().then(|| DigitAudit {
        plausible: digits::is_plausible_sequence(&block.digit_sequence),
        matches_reference: digits::matches_reference(&block.digit_sequence, 0),
        proof_hash: digits::digit_proof_hash(&block.digit_sequence, block.nonce),
        proof_ok: digits::verify_digit_proof(&block.digit_sequence, block.difficulty),
    });

    BlockDetailResponse {
        block,
        digit_count: block.digit_count,
        digits: digits_shown,
        restored: !block.has_digits(),
        audit,
    }
}

/// One block with its digit payload and an audit of it.
#[get("/chain/{index}/")]
pub async fn get_block(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<DigitsQuery>,
) -> Result<HttpResponse> {
    let index = path.into_inner();
    let limit = query.limit;
    let body = with_ledger(&state, move |ledger| {
        ledger
            .at(index)
            .map(|block| serde_json::to_vec(&block_detail(block, limit)))
    })
    .await?;

    match body {
        Some(bytes) => Ok(json_body(bytes?)),
        None => Ok(HttpResponse::NotFound().body(format!("block {index} not found"))),
    }
}

/// Look a block up by its stored hash. The first match wins.
#[get("/chain/hash/{hash}/")]
pub async fn find_block_by_hash(
    state: web::Data<AppState>,
    path: web::Path<u32>,
    query: web::Query<DigitsQuery>,
) -> Result<HttpResponse> {
    let hash = path.into_inner();
    let limit = query.limit;
    let body = with_ledger(&state, move |ledger| {
        ledger
            .find_by_hash(hash)
            .map(|block| serde_json::to_vec(&block_detail(block, limit)))
    })
    .await?;

    match body {
        Some(bytes) => Ok(json_body(bytes?)),
        None => Ok(HttpResponse::NotFound().body(format!("no block with hash {hash}"))),
    }
}

/// Per-block hash, digit count and reward, with chain totals.
#[get("/chain/summary/")]
pub async fn chain_summary(state: web::Data<AppState>) -> Result<HttpResponse> {
    let summary = with_ledger(&state, |ledger| {
        let total_rewards = ledger.total_rewards();
        ChainSummaryResponse {
            length: ledger.len(),
            capacity: ledger.capacity(),
            blocks: ledger
                .blocks()
                .iter()
                .map(|b| BlockSummary {
                    index: b.index,
                    hash: b.hash,
                    digits: b.digit_count,
                    reward: b.mining_reward,
                })
                .collect(),
            total_digits: ledger.total_digits(),
            total_rewards,
            total_rewards_display: format_amount(total_rewards),
        }
    })
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> Result<HttpResponse> {
    let resp = with_ledger(&state, |ledger| {
        let first_invalid = ledger.first_invalid();
        ValidateResponse {
            valid: first_invalid.is_none(),
            length: ledger.len(),
            first_invalid,
            restored_blocks: ledger.restored_blocks(),
        }
    })
    .await?;
    Ok(HttpResponse::Ok().json(resp))
}

/// Snapshot of the chain in the on-disk format.
#[get("/chain/export/")]
pub async fn export_chain(state: web::Data<AppState>) -> Result<HttpResponse> {
    let body = with_ledger(&state, |ledger| serde_json::to_vec(&ChainSnapshot::of(ledger))).await??;
    Ok(json_body(body))
}

/// Replace the in-memory chain with a snapshot. The current chain is kept
/// if the snapshot's indices are not contiguous from 0. Waits for any
/// running mining session to finish first.
#[post("/chain/import/")]
pub async fn import_chain(
    state: web::Data<AppState>,
    body: web::Json<ChainSnapshot>,
) -> Result<HttpResponse> {
    let restored = match body.into_inner().into_ledger() {
        Ok(l) => l,
        Err(e) => {
            warn!("CHAIN - import rejected: {e}");
            return Ok(HttpResponse::BadRequest().body(e.to_string()));
        }
    };
    let imported = restored.len();
    let valid = restored.is_valid_chain();

    web::block(move || {
        let _session = state.session.lock().expect("mutex poisoned");
        let mut ledger = state.ledger.lock().expect("mutex poisoned");
        *ledger = restored;
        state
            .rewards
            .lock()
            .expect("mutex poisoned")
            .set_height(imported as u64);
    })
    .await?;
    info!("CHAIN - imported {imported} blocks (valid={valid})");

    Ok(HttpResponse::Ok().json(ImportResponse { imported, valid }))
}
