//! Actix Web HTTP server.
//!
//! Exposes:
//! - `POST /process-fix`
//! - `GET /health`
//!
//! CORS is fully open; the endpoint carries no credentials of its own.

use crate::pipeline::{FixPipeline, SetupError};
use crate::types::FixRequest;
use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, web};
use codefix_core::config::Config;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registers the relay's routes. The app must carry a `web::Data<FixPipeline>`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/process-fix", web::post().to(process_fix));
}

pub async fn serve(config: Config) -> Result<(), ServerError> {
    let pipeline = web::Data::new(FixPipeline::from_config(&config)?);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pipeline.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))?;

    for addr in server.addrs() {
        info!("codefix relay listening on {addr}");
    }
    server.run().await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn process_fix(
    pipeline: web::Data<FixPipeline>,
    body: web::Json<FixRequest>,
) -> HttpResponse {
    HttpResponse::Ok().json(pipeline.run(body.into_inner()).await)
}
