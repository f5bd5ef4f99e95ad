//! HTTP surface of the agent.

use std::sync::Arc;
use std::time::UNIX_EPOCH;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use crate::metrics::MetricsCollector;
use crate::protocol::{
    ErrorBody, FileEntry, FilesResponse, HealthResponse, MetricsResponse, ProcessesResponse,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    collector: Arc<MetricsCollector>,
}

pub fn build_router() -> Router {
    let state = AppState {
        collector: Arc::new(MetricsCollector::new()),
    };

    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/files", get(get_files))
        .route("/processes", get(get_processes))
        .route("/execute", post(post_execute))
        .with_state(state)
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

async fn get_metrics(
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, StatusCode> {
    let collector = Arc::clone(&state.collector);
    tokio::task::spawn_blocking(move || collector.collect())
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_processes(
    State(state): State<AppState>,
) -> Result<Json<ProcessesResponse>, StatusCode> {
    let collector = Arc::clone(&state.collector);
    tokio::task::spawn_blocking(move || collector.processes())
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    path: Option<String>,
}

async fn get_files(
    Query(query): Query<FilesQuery>,
) -> Result<Json<FilesResponse>, (StatusCode, Json<ErrorBody>)> {
    let path = query.path.unwrap_or_else(|| "/".to_string());
    debug!("listing {}", path);
    match list_files(&path) {
        Ok(files) => Ok(Json(FilesResponse { path, files })),
        Err(e) => Err((StatusCode::NOT_FOUND, Json(ErrorBody::new(e.to_string())))),
    }
}

/// Command execution is refused unconditionally; the agent is telemetry-only.
async fn post_execute() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody::new("command execution disabled by policy")),
    )
}

/// Lists a directory, name-sorted. Entries whose metadata cannot be read
/// (broken symlinks, permission walls) are skipped rather than failing the
/// whole listing.
fn list_files(path: &str) -> std::io::Result<Vec<FileEntry>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)?.flatten() {
        let Ok(metadata) = std::fs::metadata(entry.path()) else {
            continue;
        };
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: if metadata.is_dir() { "directory" } else { "file" },
            size: metadata.len(),
            modified,
        });
    }
    files.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok_and_version() {
        let Json(health) = get_health().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, VERSION);
    }

    #[tokio::test]
    async fn execute_is_always_refused() {
        let (status, Json(body)) = post_execute().await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "command execution disabled by policy");
    }

    #[tokio::test]
    async fn files_route_lists_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let query = FilesQuery {
            path: Some(dir.path().to_string_lossy().into_owned()),
        };
        let Json(listing) = get_files(Query(query)).await.unwrap();

        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.files[0].name, "a");
        assert_eq!(listing.files[0].kind, "directory");
        assert_eq!(listing.files[1].name, "b.txt");
        assert_eq!(listing.files[1].kind, "file");
        assert_eq!(listing.files[1].size, 5);
        assert!(listing.files[1].modified > 0);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let query = FilesQuery {
            path: Some("/definitely/not/a/real/path".to_string()),
        };
        let err = get_files(Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn file_entry_kind_serializes_as_type() {
        let entry = FileEntry {
            name: "etc".to_string(),
            kind: "directory",
            size: 4096,
            modified: 1,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "directory");
        assert!(value.get("kind").is_none());
    }
}
