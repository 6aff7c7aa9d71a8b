// The diff-applicator hand-off: this core never applies a diff to disk
// itself (that's the external patch engine named in SPEC_FULL's Non-goals).
// This handler's only job is to validate the request shape and report that
// it was forwarded, so the client has one consistent contract instead of a
// 404 for a route the spec's endpoint list otherwise promises. Grounded on
// the original Python `app/dataclasses/diff_applicator/
// diff_applicator_dataclass.py` / `app/services/diff_applicator_service.py`
// for the request shape (`diff_application_requests`, each with a
// `file_path` and a unified `diff`).

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct DiffApplicationRequest {
    pub file_path: String,
    pub diff: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDiffRequest {
    pub repo_path: String,
    pub diff_application_requests: Vec<DiffApplicationRequest>,
}

#[derive(Debug, Serialize)]
pub struct ApplyDiffResult {
    pub file_path: String,
    pub applied: bool,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ApplyDiffResponse {
    pub results: Vec<ApplyDiffResult>,
}

/// Always reports `applied: false` — actual diff application is delegated to
/// the IDE-side patch engine, which this daemon has no handle on.
pub async fn apply_diff(Json(request): Json<ApplyDiffRequest>) -> Result<Json<ApplyDiffResponse>> {
    let _ = request.repo_path;
    let results = request
        .diff_application_requests
        .into_iter()
        .map(|entry| ApplyDiffResult {
            file_path: entry.file_path,
            applied: false,
            reason: "diff application is delegated to an external patch engine".to_owned(),
        })
        .collect();
    Ok(Json(ApplyDiffResponse { results }))
}
