use actix_web::HttpResponse;
use chrono::Utc;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}

/// GET /api/test/ping
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "message": "Bloodwave API is alive",
        "utc": Utc::now(),
    }))
}
