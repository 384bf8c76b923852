//! REST API for a ChainDrug node
//!
//! The peer-facing routes keep the established paths and JSON shapes:
//! `/transactions/new`, `/broadcast`, `/mine`, `/mineBroadcast`, `/chain`,
//! `/nodes/resolve` and `/viewUser/:party`, plus `/health`,
//! `/transactions/pending` and `/viewUser/:party/pending`.
//!
//! Party ids, amounts and drug ids are non-negative integers. A submission
//! with a fractional or negative `amount` is answered with "Missing values",
//! and a peer chain holding such a transaction fails to parse and is skipped
//! during conflict resolution.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use crate::blockchain::Block;
use crate::consensus::PeerChain;
use crate::error::ChainError;
use crate::node::Node;
use crate::transaction::{Transaction, TransactionRequest};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    MissingValues,
    InvalidInput(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingValues => (StatusCode::BAD_REQUEST, "Missing values".to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidInput(_)
            | ChainError::InvalidChain(_)
            | ChainError::InvalidBlock(_)
            | ChainError::SerializationError(_) => ApiError::InvalidInput(err.to_string()),
            ChainError::AuthenticationFailed(_) | ChainError::UnknownIdentity(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            ChainError::MiningCancelled | ChainError::MiningRace(_) => {
                ApiError::Conflict(err.to_string())
            }
            ChainError::NetworkError(_) | ChainError::ConfigError(_) | ChainError::IoError(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::MissingValues
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub index: u64,
    pub delivered: usize,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Summary of a freshly forged block.
#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers_notified: Option<usize>,
}

impl MineResponse {
    fn forged(block: Block, peers_notified: Option<usize>) -> Self {
        Self {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
            peers_notified,
        }
    }
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub count: usize,
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_index = node.node_index(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/chain", get(full_chain))
        .route("/viewUser/:party", get(view_user))
        .route("/viewUser/:party/pending", get(view_user_pending))
        .route("/nodes/resolve", get(resolve))
        // Transaction endpoints
        .route("/transactions/new", post(new_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/broadcast", post(verify_transaction))
        // Mining endpoints
        .route("/mine", get(mine))
        .route("/mineBroadcast", get(mine_broadcast))
        // System endpoints
        .route("/health", get(health_check))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Bind the configured address and serve until ctrl-c.
pub async fn run_api_server(node: Arc<Node>) -> Result<(), ChainError> {
    let addr = format!("{}:{}", node.config().node.host, node.config().node.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    let app = build_api_router(node.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(node))
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal(node: Arc<Node>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    node.shutdown();
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn not_found(req: Request) -> ApiError {
    ApiError::NotFound(format!("No route for {} {}", req.method(), req.uri().path()))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let chain = node.blockchain.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "node_index": node.node_index(),
        "chain_length": chain.len(),
        "pending": chain.pending_transactions().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn full_chain(State(node): State<Arc<Node>>) -> Json<PeerChain> {
    let chain = node.blockchain.read().await;
    Json(PeerChain::from_blocks(chain.blocks().to_vec()))
}

fn parse_party(party: &str) -> Result<u64, ApiError> {
    party
        .parse()
        .map_err(|_| ApiError::InvalidInput(format!("Invalid party id: {}", party)))
}

async fn view_user(
    State(node): State<Arc<Node>>,
    Path(party): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let party = parse_party(&party)?;
    let chain = node.blockchain.read().await;
    Ok(Json(chain.transactions_for(party)))
}

async fn view_user_pending(
    State(node): State<Arc<Node>>,
    Path(party): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let party = parse_party(&party)?;
    let chain = node.blockchain.read().await;
    Ok(Json(chain.pending_transactions_for(party)))
}

async fn pending_transactions(State(node): State<Arc<Node>>) -> Json<PendingResponse> {
    let chain = node.blockchain.read().await;
    let transactions = chain.mempool.get_all_transactions();
    Json(PendingResponse {
        count: transactions.len(),
        transactions,
    })
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = payload?;
    let outcome = node.submit_transaction(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Transaction broadcasted to all nodes for verification.".to_string(),
            index: outcome.index,
            delivered: outcome.delivered,
        }),
    ))
}

async fn verify_transaction(
    State(node): State<Arc<Node>>,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(tx) = payload?;

    match node.receive_transaction(tx).await {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "Transaction is added to the block.".to_string(),
            }),
        )),
        Err(ChainError::AuthenticationFailed(_)) | Err(ChainError::UnknownIdentity(_)) => Err(
            ApiError::Unauthorized("Fraudulent Transaction discarded.".to_string()),
        ),
        Err(e) => Err(e.into()),
    }
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let (block, notified) = node.mine_with_peers().await?;
    Ok(Json(MineResponse::forged(block, Some(notified))))
}

async fn mine_broadcast(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine().await?;
    Ok(Json(MineResponse::forged(block, None)))
}

async fn resolve(State(node): State<Arc<Node>>) -> Json<ResolveResponse> {
    let replaced = node.resolve_conflicts().await;
    let message = if replaced {
        "Current chain was replaced"
    } else {
        "Current chain is authoritative"
    };
    let chain = node.blockchain.read().await.blocks().to_vec();

    Json(ResolveResponse {
        message: message.to_string(),
        replaced,
        chain,
    })
}
