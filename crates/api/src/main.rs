//! Process entry point wiring [`ai_plane_core::config::AppConfig`], the
//! AI-plane singletons, and the cleanup worker together for lifecycle.
//! Concrete HTTP route handlers, multipart parsing, text extraction, the
//! Postgres repositories, and the job queue transport are Non-goals of
//! this crate — see `ai_plane::boundary` for the contracts a full
//! deployment wires in here instead.

use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use ai_plane::AiPlane;
use ai_plane_core::config::AppConfig;
use ai_plane_core::observability::init_observability;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[get("/healthz")]
async fn healthz(plane: web::Data<Arc<AiPlane>>) -> impl Responder {
    let embedding = plane.embedding_cache.stats();
    let response = plane.response_cache.stats();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "embedding_cache": {
            "size": plane.embedding_cache.len(),
            "hit_rate": embedding.hit_rate,
        },
        "response_cache": {
            "size": plane.response_cache.len(),
            "capacity": plane.response_cache.capacity(),
            "hit_rate": response.hit_rate,
        },
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_observability(&config.observability.service_name)?;

    let plane = Arc::new(AiPlane::new(&config));
    let cleanup_handle = plane.spawn_cleanup_worker();

    let hostname = config.server.hostname.clone();
    let port = config.server.port;
    info!(hostname = %hostname, port, "starting ai-cv-evaluator-api");

    let plane_data = plane.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(plane_data.clone()))
            .service(healthz)
    })
    .bind((hostname.as_str(), port))?
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        ai_plane_core::lifecycle::shutdown_signal().await;
        server_handle.stop(true).await;
    });

    server.await?;

    plane.shutdown();
    let _ = tokio::time::timeout(config.server.shutdown_timeout, cleanup_handle).await;

    Ok(())
}
