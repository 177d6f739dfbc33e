//! Resource REST routes: listing, inspection, and the lock lifecycle.
//!
//! Handlers are thin translators over the engine operations; every state
//! decision lives in `rentabot-core`.

use axum::{
    extract::{Path, Query, RawQuery, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    types::{
        ExtendParams, ExtendResponse, LockRequest, LockResponse, MessageResponse,
        ResourceResponse, ResourcesListResponse, UnlockParams,
    },
};
use rentabot_core::{Resource, ResourceId, DEFAULT_LOCK_TTL};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/resources - List all resources
#[utoipa::path(
    get,
    path = "/api/v1/resources",
    tag = "Resources",
    responses(
        (status = 200, description = "All catalog resources", body = ResourcesListResponse),
    ),
)]
pub async fn list_resources(State(state): State<AppState>) -> Json<ResourcesListResponse> {
    let resources = state
        .catalog
        .snapshot_resources()
        .into_iter()
        .map(Into::into)
        .collect();
    Json(ResourcesListResponse { resources })
}

/// GET /api/v1/resources/{id} - Get one resource
#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}",
    tag = "Resources",
    params(("id" = u32, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Resource details", body = ResourceResponse),
        (status = 404, description = "Resource not found", body = ApiError),
    ),
)]
pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Json<ResourceResponse>> {
    let resource = state.catalog.get_resource(ResourceId(id))?;
    Ok(Json(ResourceResponse {
        resource: resource.into(),
    }))
}

/// POST /api/v1/resources/{id}/lock - Lock a resource by id
#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/lock",
    tag = "Resources",
    params(("id" = u32, Path, description = "Resource id")),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Resource locked", body = LockResponse),
        (status = 400, description = "TTL exceeds the maximum lock duration", body = ApiError),
        (status = 403, description = "Resource already locked", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError),
    ),
)]
pub async fn lock_resource(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    body: Option<Json<LockRequest>>,
) -> ApiResult<Json<LockResponse>> {
    let ttl = requested_ttl(body);
    let (token, resource) = state.catalog.lock(ResourceId(id), ttl)?;
    Ok(Json(lock_payload(token, resource)?))
}

/// POST /api/v1/resources/{id}/unlock - Unlock a resource
#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/unlock",
    tag = "Resources",
    params(
        ("id" = u32, Path, description = "Resource id"),
        UnlockParams,
    ),
    responses(
        (status = 200, description = "Resource unlocked", body = MessageResponse),
        (status = 403, description = "Already unlocked or token mismatch", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError),
    ),
)]
pub async fn unlock_resource(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(params): Query<UnlockParams>,
) -> ApiResult<Json<MessageResponse>> {
    let token = params.lock_token.unwrap_or_default();
    state.catalog.unlock(ResourceId(id), &token)?;
    Ok(Json(MessageResponse {
        message: "Resource unlocked".to_string(),
    }))
}

/// POST /api/v1/resources/{id}/extend - Refresh a lock's deadline
#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/extend",
    tag = "Resources",
    params(
        ("id" = u32, Path, description = "Resource id"),
        ExtendParams,
    ),
    responses(
        (status = 200, description = "Lock deadline refreshed", body = ExtendResponse),
        (status = 400, description = "Missing or out-of-bounds TTL", body = ApiError),
        (status = 403, description = "Already unlocked or token mismatch", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError),
    ),
)]
pub async fn extend_lock(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(params): Query<ExtendParams>,
) -> ApiResult<Json<ExtendResponse>> {
    let additional_ttl = params
        .additional_ttl
        .ok_or_else(|| ApiError::missing_field("additional-ttl"))?;
    let token = params.lock_token.unwrap_or_default();

    let resource = state
        .catalog
        .extend(ResourceId(id), &token, additional_ttl)?;
    let lock = resource
        .lock
        .ok_or_else(|| ApiError::internal_error("lock state missing after extend"))?;

    Ok(Json(ExtendResponse {
        message: "Lock extended".to_string(),
        new_expires_at: lock.expires_at,
        total_lock_duration: (lock.expires_at - lock.acquired_at).num_seconds(),
    }))
}

/// POST /api/v1/resources/lock - Lock one resource by id, name or tags
#[utoipa::path(
    post,
    path = "/api/v1/resources/lock",
    tag = "Resources",
    params(
        ("id" = Option<u32>, Query, description = "Resource id"),
        ("name" = Option<String>, Query, description = "Resource name"),
        ("tag" = Option<Vec<String>>, Query, description = "Required tag, repeatable"),
    ),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Resource locked", body = LockResponse),
        (status = 400, description = "No criterion supplied", body = ApiError),
        (status = 403, description = "Matching resources are all locked", body = ApiError),
        (status = 404, description = "No resource matches the criterion", body = ApiError),
    ),
)]
pub async fn lock_by_criteria(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Option<Json<LockRequest>>,
) -> ApiResult<Json<LockResponse>> {
    let criteria = LockCriteria::parse(query.as_deref().unwrap_or(""))?;
    let ttl = requested_ttl(body);

    let (token, resource) = match criteria {
        LockCriteria::Id(id) => state.catalog.lock(id, ttl)?,
        LockCriteria::Name(name) => state.catalog.lock_by_name(&name, ttl)?,
        LockCriteria::Tags(tags) => state.catalog.lock_first_available(&tags, ttl)?,
    };
    Ok(Json(lock_payload(token, resource)?))
}

// ============================================================================
// CRITERIA PARSING
// ============================================================================

/// The lock criterion of `POST /resources/lock`, in priority order:
/// id, then name, then tags.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LockCriteria {
    Id(ResourceId),
    Name(String),
    Tags(Vec<String>),
}

impl LockCriteria {
    /// Parse the raw query string. The `tag` key is repeatable, which rules
    /// out the plain `Query` extractor.
    fn parse(query: &str) -> ApiResult<Self> {
        let mut id = None;
        let mut name = None;
        let mut tags = Vec::new();

        for (key, value) in query_pairs(query) {
            match key.as_str() {
                "id" => {
                    let parsed: u32 = value.parse().map_err(|_| {
                        ApiError::invalid_input(format!("Invalid resource id: {}", value))
                    })?;
                    id = Some(ResourceId(parsed));
                }
                "name" => name = Some(value),
                "tag" if !value.is_empty() => tags.push(value),
                _ => {}
            }
        }

        if let Some(id) = id {
            Ok(LockCriteria::Id(id))
        } else if let Some(name) = name {
            Ok(LockCriteria::Name(name))
        } else if !tags.is_empty() {
            Ok(LockCriteria::Tags(tags))
        } else {
            Err(ApiError::invalid_input(
                "Provide an id, name or tag criterion",
            ))
        }
    }
}

/// Split a query string into decoded key/value pairs.
fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

/// Minimal application/x-www-form-urlencoded decoding: `+` as space and
/// `%XX` escapes.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' => {
                match bytes
                    .get(index + 1..index + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        decoded.push(byte);
                        index += 3;
                    }
                    None => {
                        decoded.push(b'%');
                        index += 1;
                    }
                }
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

// ============================================================================
// HELPERS & ROUTER
// ============================================================================

fn requested_ttl(body: Option<Json<LockRequest>>) -> u64 {
    body.and_then(|Json(request)| request.ttl)
        .unwrap_or(DEFAULT_LOCK_TTL)
}

fn lock_payload(token: String, resource: Resource) -> ApiResult<LockResponse> {
    let lock = resource
        .lock
        .clone()
        .ok_or_else(|| ApiError::internal_error("lock state missing after lock"))?;
    Ok(LockResponse {
        message: "Resource locked".to_string(),
        lock_token: token,
        resource: resource.into(),
        locked_at: lock.acquired_at,
        expires_at: lock.expires_at,
    })
}

/// Create the resource routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_resources))
        .route("/lock", post(lock_by_criteria))
        .route("/:id", get(get_resource))
        .route("/:id/lock", post(lock_resource))
        .route("/:id/unlock", post(unlock_resource))
        .route("/:id/extend", post(extend_lock))
}
