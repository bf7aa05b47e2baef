// routes.rs — HTTP surface over the workspace registry.
//
// Handlers are thin: parse the path and body, hand the blocking engine call
// to the blocking pool, serialize the result. Bodies are decoded from raw
// bytes so clients need not send a JSON content type.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gw_changeset::ChangeSet;
use gw_vcs::Identity;
use gw_workspace::{CommitRequest, Registry, RemoteMap, WorkspaceError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/{user}", get(list_workspaces))
        .route(
            "/{user}/{repo}",
            get(workspace_info)
                .post(create_workspace)
                .put(replace_remotes)
                .delete(delete_workspace),
        )
        .route("/{user}/{repo}/status", get(status))
        .route("/{user}/{repo}/commit", post(commit))
        .route("/{user}/{repo}/push/{remote}", post(push))
        .route("/{user}/{repo}/pull/{remote}", post(pull))
        .route("/{user}/{repo}/ahead/{remote}", get(ahead))
        .route(
            "/{user}/{repo}/file/{*path}",
            get(read_file)
                .post(create_file)
                .put(update_file)
                .delete(delete_file),
        )
        .route("/{user}/{repo}/tree", get(tree_root))
        .route("/{user}/{repo}/tree/{*subdir}", get(tree_subdir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run an engine call on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Registry) -> Result<T, WorkspaceError> + Send + 'static,
{
    let registry = Arc::clone(&state.registry);
    let result = tokio::task::spawn_blocking(move || f(&registry)).await?;
    Ok(result?)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, WorkspaceError> {
    serde_json::from_slice(body)
        .map_err(|e| WorkspaceError::InvalidRequest(format!("malformed body: {}", e)))
}

fn empty_object() -> Json<serde_json::Value> {
    Json(json!({}))
}

// ---- Workspaces ----

async fn list_workspaces(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let listing = blocking(&state, move |reg| reg.list(&user)).await?;
    Ok(Json(listing).into_response())
}

async fn workspace_info(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let info = blocking(&state, move |reg| reg.open(&user, &repo)?.info()).await?;
    Ok(Json(info).into_response())
}

async fn create_workspace(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| {
        // An existing workspace wins over a bad payload.
        match reg.open(&user, &repo) {
            Ok(_) => {
                return Err(WorkspaceError::AlreadyExists {
                    owner: user,
                    name: repo,
                })
            }
            Err(WorkspaceError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let remotes: RemoteMap = parse_body(&body)?;
        reg.create(&user, &repo, &remotes).map(|_| ())
    })
    .await?;
    Ok((StatusCode::CREATED, empty_object()).into_response())
}

async fn replace_remotes(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| {
        let workspace = reg.open(&user, &repo)?;
        let remotes: RemoteMap = parse_body(&body)?;
        workspace.set_remotes(&remotes)
    })
    .await?;
    Ok(empty_object().into_response())
}

async fn delete_workspace(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| reg.delete(&user, &repo)).await?;
    Ok(empty_object().into_response())
}

// ---- Changes and history ----

async fn status(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
) -> Result<Json<ChangeSet>, ApiError> {
    let changes = blocking(&state, move |reg| reg.open(&user, &repo)?.status()).await?;
    Ok(Json(changes))
}

/// Wire form of a commit request.
#[derive(Debug, Deserialize)]
struct CommitBody {
    #[serde(rename = "A")]
    add: Vec<String>,
    #[serde(rename = "R")]
    remove: Vec<String>,
    msg: String,
    // Present but null is accepted and treated as empty.
    #[serde(deserialize_with = "nullable_string")]
    name: String,
    #[serde(deserialize_with = "nullable_string")]
    email: String,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<CommitBody> for CommitRequest {
    fn from(body: CommitBody) -> Self {
        CommitRequest {
            add: body.add,
            remove: body.remove,
            message: body.msg,
            author: Identity::new(body.name, body.email),
        }
    }
}

#[derive(Debug, Serialize)]
struct CommitResponse {
    commit: String,
}

async fn commit(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = blocking(&state, move |reg| {
        let workspace = reg.open(&user, &repo)?;
        let request: CommitRequest = parse_body::<CommitBody>(&body)?.into();
        workspace.commit(&request)
    })
    .await?;
    Ok(Json(CommitResponse {
        commit: id.to_string(),
    })
    .into_response())
}

async fn push(
    State(state): State<AppState>,
    Path((user, repo, remote)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| reg.open(&user, &repo)?.push(&remote)).await?;
    Ok(empty_object().into_response())
}

async fn pull(
    State(state): State<AppState>,
    Path((user, repo, remote)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let outcome = blocking(&state, move |reg| reg.open(&user, &repo)?.pull(&remote)).await?;
    Ok(Json(outcome).into_response())
}

async fn ahead(
    State(state): State<AppState>,
    Path((user, repo, remote)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let divergence =
        blocking(&state, move |reg| reg.open(&user, &repo)?.divergence(&remote)).await?;
    Ok(Json(json!({
        "ahead": divergence.ahead_count(),
        "divergence": divergence,
    }))
    .into_response())
}

// ---- Files ----

#[derive(Debug, Deserialize)]
struct FileBody {
    data: String,
}

async fn read_file(
    State(state): State<AppState>,
    Path((user, repo, path)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let data = blocking(&state, move |reg| reg.open(&user, &repo)?.read_file(&path)).await?;
    Ok(Json(json!({ "data": data })).into_response())
}

async fn create_file(
    State(state): State<AppState>,
    Path((user, repo, path)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| {
        reg.open(&user, &repo)?
            .create_file_with(&path, || Ok(parse_body::<FileBody>(&body)?.data))
    })
    .await?;
    Ok((StatusCode::CREATED, empty_object()).into_response())
}

async fn update_file(
    State(state): State<AppState>,
    Path((user, repo, path)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| {
        reg.open(&user, &repo)?
            .update_file_with(&path, || Ok(parse_body::<FileBody>(&body)?.data))
    })
    .await?;
    Ok(empty_object().into_response())
}

async fn delete_file(
    State(state): State<AppState>,
    Path((user, repo, path)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    blocking(&state, move |reg| reg.open(&user, &repo)?.delete_file(&path)).await?;
    Ok(empty_object().into_response())
}

async fn tree_root(
    State(state): State<AppState>,
    Path((user, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let tree = blocking(&state, move |reg| reg.open(&user, &repo)?.tree(None)).await?;
    Ok(Json(tree).into_response())
}

async fn tree_subdir(
    State(state): State<AppState>,
    Path((user, repo, subdir)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let tree = blocking(&state, move |reg| {
        reg.open(&user, &repo)?.tree(Some(&subdir))
    })
    .await?;
    Ok(Json(tree).into_response())
}
