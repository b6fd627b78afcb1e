//! Read-only HTTP surface over the inscription and bridge stores, plus the
//! operator-facing retry endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use deadpool_postgres::Pool;
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::core::bridge::BridgeService;
use crate::db::inscriptions_pg;
use crate::db::models::{ClaimStatus, DbBurnClaim, DbInscription};
use crate::utils::Context;
use crate::{try_error, try_info};
use ordbridge_postgres::pg_pool_client;

pub struct RestApi {
    pg_pool: Pool,
    bridge: Option<Arc<BridgeService>>,
    ctx: Context,
}

type SharedState = Arc<RestApi>;

/// User-visible errors. Internal error text is logged, never returned.
enum ApiError {
    NotFound,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

fn capped_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(0, max)
}

impl RestApi {
    pub fn new(pg_pool: Pool, bridge: Option<Arc<BridgeService>>, ctx: Context) -> Self {
        RestApi {
            pg_pool,
            bridge,
            ctx,
        }
    }

    pub fn into_router(self) -> Router {
        let mut router = Router::new()
            .route("/health", get(get_health))
            .route("/inscription/:id", get(get_inscription))
            .route("/content/:id", get(get_content))
            .route("/inscriptions/owner/:address", get(get_inscriptions_by_owner))
            .route("/inscriptions/latest", get(get_latest_inscriptions))
            .route("/inscriptions/type/:content_type", get(get_inscriptions_by_type))
            .route("/stats", get(get_stats));
        if self.bridge.is_some() {
            router = router
                .route("/bridge/stats", get(get_bridge_stats))
                .route("/bridge/claim/:id", get(get_bridge_claim))
                .route("/bridge/claims/sender/:address", get(get_bridge_claims_by_sender))
                .route("/bridge/collection", get(get_bridge_collection))
                .route("/bridge/collection/check/:id", get(check_collection_inscription))
                .route("/bridge/collection/token/:token_id", get(get_collection_token))
                .route("/bridge/retry-failed", post(retry_failed_claims));
        }
        router
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self))
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, ApiError> {
        pg_pool_client(&self.pg_pool)
            .await
            .map_err(|e| self.internal(e))
    }

    fn internal(&self, e: String) -> ApiError {
        try_error!(self.ctx, "API error: {e}");
        ApiError::Internal
    }

    fn bridge(&self) -> Result<&Arc<BridgeService>, ApiError> {
        self.bridge.as_ref().ok_or(ApiError::NotFound)
    }
}

pub async fn start_api_server(
    api: RestApi,
    port: u16,
    mut stop_receiver: watch::Receiver<bool>,
    ctx: &Context,
) -> Result<(), String> {
    let router = api.into_router();
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| format!("unable to bind API port {port}: {e}"))?;
    try_info!(ctx, "API server listening on port {port}");
    let inner_ctx = ctx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = stop_receiver.changed().await;
            try_info!(inner_ctx, "Stop signal received, API server is shutting down");
        })
        .await
        .map_err(|e| format!("API server failed: {e}"))
}

fn inscription_json(inscription: &DbInscription) -> serde_json::Value {
    json!({
        "id": inscription.id,
        "content_type": inscription.content_type,
        "content": BASE64.encode(&inscription.content),
        "size": inscription.content.len(),
        "block_height": inscription.block_height,
        "block_hash": inscription.block_hash,
        "txid": inscription.txid,
        "vout": inscription.vout,
        "owner": inscription.owner,
        "timestamp": inscription.timestamp,
        "inscription_number": inscription.inscription_number,
    })
}

fn claim_json(claim: &DbBurnClaim, min_fee_sats: u64) -> serde_json::Value {
    let mut value = json!({
        "inscription_id": claim.inscription_id,
        "collection_name": claim.collection_name,
        "token_id": claim.token_id,
        "sender_address": claim.sender_address,
        "burn_txid": claim.burn_txid,
        "burn_block_height": claim.burn_block_height,
        "burn_block_hash": claim.burn_block_hash,
        "status": claim.status,
        "attest_txid": claim.attest_txid,
        "created_at": claim.created_at,
        "updated_at": claim.updated_at,
    });
    if claim.status == ClaimStatus::Underpaid {
        value["message"] = json!(format!(
            "burn transaction paid less than the required oracle fee of {min_fee_sats} sats; \
            the claim will not be bridged"
        ));
    }
    value
}

async fn get_health(State(api): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    let mut health = json!({ "status": "ok" });
    if let Ok(client) = pg_pool_client(&api.pg_pool).await {
        if let Ok(Some(height)) = inscriptions_pg::get_indexed_block_height(&**client).await {
            health["block_height"] = json!(height);
        }
    }
    Ok(Json(health))
}

async fn get_inscription(
    State(api): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = api.client().await?;
    let inscription = inscriptions_pg::get_inscription(&id, &**client)
        .await
        .map_err(|e| api.internal(e))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(inscription_json(&inscription)))
}

async fn get_content(
    State(api): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let client = api.client().await?;
    let inscription = inscriptions_pg::get_inscription(&id, &**client)
        .await
        .map_err(|e| api.internal(e))?
        .ok_or(ApiError::NotFound)?;
    let content_type = HeaderValue::from_str(&inscription.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            // Inscriptions are immutable, cache them as such.
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=31536000, immutable"),
            ),
        ],
        inscription.content,
    )
        .into_response())
}

async fn get_inscriptions_by_owner(
    State(api): State<SharedState>,
    Path(address): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = api.client().await?;
    let inscriptions = inscriptions_pg::get_inscriptions_by_owner(
        &address,
        capped_limit(pagination.limit, 100, inscriptions_pg::MAX_QUERY_LIMIT),
        pagination.offset.unwrap_or(0).max(0),
        &**client,
    )
    .await
    .map_err(|e| api.internal(e))?;
    Ok(Json(json!({
        "owner": address,
        "inscriptions": inscriptions.iter().map(inscription_json).collect::<Vec<_>>(),
    })))
}

async fn get_latest_inscriptions(
    State(api): State<SharedState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = api.client().await?;
    let inscriptions = inscriptions_pg::get_latest_inscriptions(
        capped_limit(pagination.limit, 20, inscriptions_pg::MAX_LATEST_LIMIT),
        &**client,
    )
    .await
    .map_err(|e| api.internal(e))?;
    Ok(Json(json!({
        "inscriptions": inscriptions.iter().map(inscription_json).collect::<Vec<_>>(),
    })))
}

async fn get_inscriptions_by_type(
    State(api): State<SharedState>,
    Path(content_type): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = api.client().await?;
    let inscriptions = inscriptions_pg::get_inscriptions_by_content_type(
        &content_type,
        capped_limit(pagination.limit, 100, inscriptions_pg::MAX_QUERY_LIMIT),
        &**client,
    )
    .await
    .map_err(|e| api.internal(e))?;
    Ok(Json(json!({
        "content_type": content_type,
        "inscriptions": inscriptions.iter().map(inscription_json).collect::<Vec<_>>(),
    })))
}

async fn get_stats(State(api): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    let client = api.client().await?;
    let stats = inscriptions_pg::get_inscription_stats(&**client)
        .await
        .map_err(|e| api.internal(e))?;
    Ok(Json(json!(stats)))
}

async fn get_bridge_stats(
    State(api): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    let client = api.client().await?;
    let stats = bridge
        .stats(&**client)
        .await
        .map_err(|e| api.internal(e))?;
    Ok(Json(json!(stats)))
}

async fn get_bridge_claim(
    State(api): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    let client = api.client().await?;
    let claim = bridge
        .get_claim(&id, &**client)
        .await
        .map_err(|e| api.internal(e))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(claim_json(&claim, bridge.config().min_fee_sats)))
}

async fn get_bridge_claims_by_sender(
    State(api): State<SharedState>,
    Path(address): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    let client = api.client().await?;
    let claims = bridge
        .get_claims_by_sender(
            &address,
            capped_limit(pagination.limit, 100, inscriptions_pg::MAX_QUERY_LIMIT),
            pagination.offset.unwrap_or(0).max(0),
            &**client,
        )
        .await
        .map_err(|e| api.internal(e))?;
    let min_fee_sats = bridge.config().min_fee_sats;
    Ok(Json(json!({
        "sender_address": address,
        "claims": claims.iter().map(|claim| claim_json(claim, min_fee_sats)).collect::<Vec<_>>(),
    })))
}

async fn get_bridge_collection(
    State(api): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    Ok(Json(json!({
        "name": bridge.config().collection_name,
        "symbol": bridge.config().collection_symbol,
        "size": bridge.registry().len(),
        "burn_address": bridge.config().burn_address,
    })))
}

async fn check_collection_inscription(
    State(api): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    Ok(Json(json!({
        "inscription_id": id,
        "in_collection": bridge.registry().contains(&id),
        "token_id": bridge.registry().token_id_for(&id),
    })))
}

async fn get_collection_token(
    State(api): State<SharedState>,
    Path(token_id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    let item = bridge
        .registry()
        .item_by_token_id(token_id)
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!(item)))
}

async fn retry_failed_claims(
    State(api): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bridge = api.bridge()?;
    let client = api.client().await?;
    let retried = bridge
        .retry_failed(&**client)
        .await
        .map_err(|e| api.internal(e))?;
    Ok(Json(json!({ "retried": retried })))
}
