use std::{net::SocketAddr, sync::Arc};

use axum::{Json, Router, extract::State, routing::get};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::domain::{
    error::OperatorError,
    health::{entities::ProbeReport, ports::HealthService},
};

async fn probes_handler<H>(State(service): State<Arc<H>>) -> Json<ProbeReport>
where
    H: HealthService,
{
    Json(service.probes())
}

pub fn health_routes<H>(service: Arc<H>) -> Router
where
    H: HealthService + 'static,
{
    Router::new()
        .route("/healthz", get(probes_handler::<H>))
        .with_state(service)
}

pub async fn serve_health<H>(addr: SocketAddr, service: Arc<H>) -> Result<(), OperatorError>
where
    H: HealthService + 'static,
{
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("unable to bind health endpoint on {}: {:?}", addr, e);
        OperatorError::InternalServerError {
            message: format!("health endpoint bind error: {e}"),
        }
    })?;

    info!("health probes listening on {}", addr);

    axum::serve(listener, health_routes(service))
        .await
        .map_err(|e| OperatorError::InternalServerError {
            message: e.to_string(),
        })
}
