//! `ownwatch serve`: the scheduler plus a small HTTP trigger surface.
//!
//! Routes (user keys are URL-encoded profile URLs):
//! - `POST /users/{key}/sync/newer` - catch up on new watches (first page)
//! - `POST /users/{key}/sync/older` - backfill older history (all pages)
//! - `POST /users/{key}/reset` - discard sync history
//! - `GET /users/{key}/status` - run state, last outcome, watermark
//! - `GET /health`

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ownwatch::sync::{Direction, Scheduler, ServiceError, SyncService};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::shared::build_service;
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Build the trigger router over `service`.
pub(crate) fn router(service: SyncService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users/{key}/status", get(status))
        .route("/users/{key}/sync/newer", post(sync_newer))
        .route("/users/{key}/sync/older", post(sync_older))
        .route("/users/{key}/reset", post(reset))
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

async fn sync_newer(State(service): State<SyncService>, Path(key): Path<String>) -> Response {
    start(&service, &key, Direction::Newer, false).await
}

async fn sync_older(State(service): State<SyncService>, Path(key): Path<String>) -> Response {
    start(&service, &key, Direction::Older, true).await
}

/// Accept the run and return immediately; the outcome shows up in the logs
/// and in the status route.
async fn start(
    service: &SyncService,
    key: &str,
    direction: Direction,
    continue_paging: bool,
) -> Response {
    match service.trigger(key, direction, continue_paging).await {
        Ok(_run) => {
            tracing::info!(user = %key, direction = %direction, "Sync accepted");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "user": key, "direction": direction })),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn reset(State(service): State<SyncService>, Path(key): Path<String>) -> Response {
    match service.reset(&key).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn status(State(service): State<SyncService>, Path(key): Path<String>) -> Response {
    match service.status(&key).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::AlreadyRunning(_) => StatusCode::CONFLICT,
        ServiceError::NotEligible(_) => StatusCode::PRECONDITION_FAILED,
        ServiceError::Store(_) | ServiceError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ServiceError) -> Response {
    let status = error_status(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

pub(crate) async fn handle_serve(
    config: &Config,
    database_url: &str,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = ownwatch::connect_and_migrate(database_url).await?;
    let service = build_service(config, db, ProgressReporter::logging().into_callback())?;
    let fatal = service.fatal_token();

    let scheduler_task = if config.scheduler.enabled {
        let scheduler = Scheduler::new(service.clone()).with_interval(config.schedule_interval());
        let cancel = shutdown.clone();
        Some(tokio::spawn(async move { scheduler.run(cancel).await }))
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Trigger server listening");

    let stop = {
        let shutdown = shutdown.clone();
        let fatal = fatal.clone();
        async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = fatal.cancelled() => {}
            }
        }
    };
    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(stop)
        .await?;

    // A fatal error stops the scheduler too.
    shutdown.cancel();
    if let Some(task) = scheduler_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    tracing::info!("Waiting for in-flight syncs to finish");
    service.drain().await;

    if service.has_failed_fatally() {
        return Err("a sync run could not persist its progress; see the log for details".into());
    }
    Ok(())
}
