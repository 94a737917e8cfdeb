use actix_web::{HttpResponse, Responder, get, web};

use super::models::AppState;

#[get("/health/")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    if !state.pool.is_running() {
        return HttpResponse::ServiceUnavailable().body("mining workers are shut down");
    }
    HttpResponse::Ok().body("Archimedes chain is up and mining π 🦀")
}
