use actix_web::{HttpResponse, Result, get, web};

use super::models::{AppState, StatsResponse};
use super::with_ledger;
use crate::blockchain::miner::difficulty_for;

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (height, total_difficulty, restored_blocks) = with_ledger(&state, |ledger| {
        (
            ledger.len(),
            ledger.total_difficulty(),
            ledger.restored_blocks(),
        )
    })
    .await?;
    let rewards = state.rewards.lock().expect("mutex poisoned").clone();
    let pending_transfers = state.pending.lock().expect("mutex poisoned").len();
    let metrics = state.metrics.lock().expect("mutex poisoned").snapshot();

    let next = height as u64;
    Ok(HttpResponse::Ok().json(StatsResponse {
        height,
        total_difficulty,
        next_difficulty: difficulty_for(next),
        next_reward: rewards.reward_for(next),
        next_halving_height: rewards.next_halving_height(next),
        rewards,
        pending_transfers,
        restored_blocks,
        mining_workers: state.pool.size(),
        metrics,
    }))
}
