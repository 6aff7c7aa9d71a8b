// Review snapshot routes: a thin wrapper around `review::{take_snapshot,
// get_changes}`. Not named in SPEC_FULL §6's endpoint list, but the data
// model (`ReviewSnapshotMeta`) and the module it backs are — this exposes
// the one hand-off the IDE-review UI actually needs over the wire, in the
// teacher's handler idiom, rather than leaving a fully-built module with no
// route reachable at all.

use std::path::PathBuf;

use axum::Json;
use serde::Deserialize;

use crate::error::Result;
use crate::model::ReviewSnapshotMeta;
use crate::review::{self, FileDiff};

#[derive(Debug, Deserialize)]
pub struct RepoPathRequest {
    pub repo_path: String,
}

pub async fn take_snapshot(Json(request): Json<RepoPathRequest>) -> Result<Json<ReviewSnapshotMeta>> {
    let repo_path = PathBuf::from(request.repo_path);
    let meta = tokio::task::spawn_blocking(move || review::take_snapshot(&repo_path))
        .await
        .map_err(|e| crate::error::Error::Internal(e.into()))??;
    Ok(Json(meta))
}

pub async fn get_changes(Json(request): Json<RepoPathRequest>) -> Result<Json<Vec<FileDiff>>> {
    let repo_path = PathBuf::from(request.repo_path);
    let diffs = tokio::task::spawn_blocking(move || review::get_changes(&repo_path))
        .await
        .map_err(|e| crate::error::Error::Internal(e.into()))??;
    Ok(Json(diffs))
}
