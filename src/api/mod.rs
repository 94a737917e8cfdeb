mod chain;
mod health;
mod mining;
pub mod models;
mod stats;
mod wallet;

use actix_web::HttpResponse;
use actix_web::error::BlockingError;
use actix_web::http::header::ContentType;
use actix_web::web::{self, ServiceConfig};
use serde::de::DeserializeOwned;

use crate::blockchain::Ledger;

pub use models::AppState;

/// Parse a JSON body that may be left out. An empty body gives the defaults;
/// anything else has to deserialize or the request is answered with 400.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, HttpResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| HttpResponse::BadRequest().body(format!("invalid request body: {e}")))
}

/// Run `f` against the ledger on the blocking thread pool. A mining session
/// keeps the ledger locked while it seals a block.
async fn with_ledger<T, F>(state: &web::Data<AppState>, f: F) -> Result<T, BlockingError>
where
    F: FnOnce(&Ledger) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    web::block(move || {
        let ledger = state.ledger.lock().expect("mutex poisoned");
        f(&ledger)
    })
    .await
}

fn json_body(bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(bytes)
}

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            // before get_block, which would claim "export" as an index
            .service(chain::export_chain)
            .service(chain::import_chain)
            .service(chain::chain_summary)
            .service(chain::get_block)
            .service(chain::find_block_by_hash)
            .service(chain::validate_chain)
            .service(mining::mine_blocks)
            .service(wallet::wallet_info)
            .service(wallet::wallet_history)
            .service(wallet::create_wallet)
            .service(wallet::load_wallet)
            .service(wallet::transfer)
            .service(stats::get_stats),
    );
}
