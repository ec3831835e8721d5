//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/status`                     | Chain height and admission summary |
//! | POST   | `/requestValidation`          | Issue a signing challenge          |
//! | POST   | `/message-signature/validate` | Check a challenge signature        |
//! | POST   | `/block`                      | Register a star (authorized)       |
//! | GET    | `/block/:height`              | Record by height                   |
//! | GET    | `/stars/hash/:hash`           | Record by hash                     |
//! | GET    | `/stars/address/:address`     | All records of a wallet address    |
//! | GET    | `/chain/validate`             | Full chain validation report       |
//!
//! Records are returned with the stored hex `story` plus a `storyDecoded`
//! copy in plain text.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use notary_protocol::admission::{AdmissionController, AdmissionError};
use notary_protocol::config::unix_now;
use notary_protocol::storage::{
    Block, BlockBody, ChainEngine, ChainError, ChainValidation, Star, StarSubmission,
};

use crate::error::ApiError;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The ledger.
    pub engine: Arc<ChainEngine>,
    /// Write-admission gate in front of the ledger.
    pub admission: Arc<AdmissionController>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Admission bookkeeping only. Counting records walks the whole tree,
    /// so `chain_height` is set where the height is already known.
    fn refresh_pending(&self) {
        self.metrics
            .pending_admissions
            .set(self.admission.len() as i64);
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/requestValidation", post(request_validation_handler))
        .route("/message-signature/validate", post(validate_signature_handler))
        .route("/block", post(register_star_handler))
        .route("/block/:height", get(block_by_height_handler))
        .route("/stars/hash/:hash", get(star_by_hash_handler))
        .route("/stars/address/:address", get(stars_by_address_handler))
        .route("/chain/validate", get(validate_chain_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationChallenge {
    pub wallet_address: String,
    pub request_time_stamp: u64,
    pub message: String,
    /// Seconds left to sign and register.
    pub validation_window: u64,
}

#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub address: String,
    pub request_time_stamp: u64,
    pub message: String,
    pub validation_window: u64,
    /// `"valid"` or `"invalid"`.
    pub message_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureValidation {
    /// Whether the address may now register one star.
    pub register_star: bool,
    pub status: SignatureStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub chain_height: u64,
    pub pending_admissions: usize,
    pub validation_window_secs: u64,
    pub timestamp: String,
}

/// A record as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub hash: String,
    pub height: u64,
    pub body: BodyView,
    pub time: u64,
    pub previous_block_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BodyView {
    Registration { address: String, star: StarView },
    Note(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarView {
    #[serde(flatten)]
    pub star: Star,
    /// `None` when the stored story is not valid hex UTF-8.
    pub story_decoded: Option<String>,
}

impl From<Block> for BlockView {
    fn from(block: Block) -> Self {
        let body = match block.body {
            BlockBody::Registration(registration) => {
                let story_decoded = match registration.star.decoded_story() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        tracing::warn!(height = block.height, error = %e, "undecodable story");
                        None
                    }
                };
                BodyView::Registration {
                    address: registration.address,
                    star: StarView {
                        star: registration.star,
                        story_decoded,
                    },
                }
            }
            BlockBody::Note(text) => BodyView::Note(text),
        };

        Self {
            hash: block.hash,
            height: block.height,
            body,
            time: block.time,
            previous_block_hash: block.previous_block_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` - returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` - chain height and admission summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let chain_height = state.engine.height();
    state.metrics.chain_height.set(chain_height as i64);
    state.refresh_pending();
    Json(StatusResponse {
        version: state.version.clone(),
        chain_height,
        pending_admissions: state.admission.len(),
        validation_window_secs: state.admission.config().window_secs,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /requestValidation` - issue (or repeat) the challenge for an address.
async fn request_validation_handler(
    State(state): State<AppState>,
    Json(req): Json<ValidationRequest>,
) -> Result<Json<ValidationChallenge>, ApiError> {
    let address = req.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("`address` is required".into()));
    }

    let now = unix_now();
    let entry = state.admission.request_challenge(address, now);
    state.metrics.admission_requests_total.inc();
    state.refresh_pending();

    Ok(Json(ValidationChallenge {
        wallet_address: entry.identity.clone(),
        request_time_stamp: entry.requested_at,
        validation_window: entry.remaining_window(now),
        message: entry.challenge_message,
    }))
}

/// `POST /message-signature/validate` - check the wallet's signature over
/// its challenge.
async fn validate_signature_handler(
    State(state): State<AppState>,
    Json(req): Json<SignatureRequest>,
) -> Result<Json<SignatureValidation>, ApiError> {
    let address = req.address.trim();
    if address.is_empty() || req.signature.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "`address` and `signature` are required".into(),
        ));
    }

    let result = state
        .admission
        .validate_signature(address, &req.signature, unix_now())
        .map_err(|e| {
            if matches!(e, AdmissionError::SignatureInvalid(_)) {
                state.metrics.signatures_rejected_total.inc();
            }
            e
        })?;

    if result.valid {
        state.metrics.signatures_validated_total.inc();
    } else {
        state.metrics.signatures_rejected_total.inc();
    }

    Ok(Json(SignatureValidation {
        register_star: result.valid,
        status: SignatureStatus {
            address: result.entry.identity,
            request_time_stamp: result.entry.requested_at,
            message: result.entry.challenge_message,
            validation_window: result.remaining_window,
            message_signature: if result.valid { "valid" } else { "invalid" }.to_string(),
        },
    }))
}

/// `POST /block` - register a star for an address holding a validated
/// challenge. The authorization is spent on success and put back if the
/// append itself fails.
async fn register_star_handler(
    State(state): State<AppState>,
    Json(submission): Json<StarSubmission>,
) -> Result<Json<BlockView>, ApiError> {
    // Reject bad payloads before touching the authorization.
    let body = submission.into_body()?;
    let identity = body.identity().unwrap_or_default().to_string();

    let now = unix_now();
    let authorization = state.admission.take_authorization(&identity, now)?;

    let started = Instant::now();
    let appended = state.engine.append(body);
    state
        .metrics
        .append_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match appended {
        Ok(block) => {
            state.metrics.records_appended_total.inc();
            state.metrics.chain_height.set((block.height + 1) as i64);
            state.refresh_pending();
            Ok(Json(block.into()))
        }
        Err(e) => {
            if matches!(e, ChainError::ConcurrentAppendConflict(_)) {
                state.metrics.append_conflicts_total.inc();
            }
            let restored = state.admission.reinstate(authorization, unix_now());
            tracing::warn!(identity = %identity, restored, error = %e, "append failed");
            state.refresh_pending();
            Err(e.into())
        }
    }
}

/// `GET /block/:height` - record by height.
async fn block_by_height_handler(
    Path(height): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<BlockView>, ApiError> {
    Ok(Json(state.engine.get_by_height(height)?.into()))
}

/// `GET /stars/hash/:hash` - record by hash.
async fn star_by_hash_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BlockView>, ApiError> {
    Ok(Json(state.engine.get_by_hash(&hash)?.into()))
}

/// `GET /stars/address/:address` - every record registered by an address,
/// oldest first. An unknown address yields an empty list.
async fn stars_by_address_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<BlockView>>, ApiError> {
    let blocks = state.engine.find_by_identity(&address)?;
    Ok(Json(blocks.into_iter().map(BlockView::from).collect()))
}

/// `GET /chain/validate` - validate every record in height order.
async fn validate_chain_handler(
    State(state): State<AppState>,
) -> Result<Json<ChainValidation>, ApiError> {
    Ok(Json(state.engine.validate_chain()?))
}

// ---------------------------------------------------------------------------
// Background Maintenance
// ---------------------------------------------------------------------------

/// Drop expired admission entries and record how many went.
pub fn sweep_expired_admissions(state: &AppState, now: u64) -> usize {
    let removed = state.admission.purge_expired(now);
    state
        .metrics
        .admissions_expired_total
        .inc_by(removed as u64);
    state.refresh_pending();
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use notary_protocol::admission::AdmissionConfig;
    use notary_protocol::crypto::keys::{Network, WalletKey};
    use notary_protocol::crypto::message::sign_message;
    use notary_protocol::storage::ChainStore;
    use serde_json::json;
    use tower::ServiceExt;

    /// Creates a test AppState backed by a temporary database with genesis.
    fn test_app_state() -> AppState {
        let store = ChainStore::open_temporary().expect("temp store");
        let engine = Arc::new(ChainEngine::open(store).expect("genesis"));
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().expect("metrics"));

        AppState {
            version: "0.1.0-test".into(),
            engine,
            admission,
            metrics,
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    fn json_of(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    fn star_payload(address: &str) -> serde_json::Value {
        json!({
            "address": address,
            "star": {
                "dec": "68° 52' 56.9",
                "ra": "16h 29m 1.0s",
                "story": "Found star using https://www.google.com/sky/"
            }
        })
    }

    /// Runs request + sign + validate for a fresh key over HTTP.
    async fn authorize(router: &Router) -> WalletKey {
        let key = WalletKey::generate(Network::Mainnet);
        let (status, body) = post_json(
            router,
            "/requestValidation",
            json!({ "address": key.address() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let challenge: ValidationChallenge = serde_json::from_slice(&body).unwrap();

        let signature = sign_message(&key, &challenge.message);
        let (status, body) = post_json(
            router,
            "/message-signature/validate",
            json!({ "address": key.address(), "signature": signature }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let validation: SignatureValidation = serde_json::from_slice(&body).unwrap();
        assert!(validation.register_star);
        key
    }

    // -- 1. Liveness and status ----------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_genesis_height() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["chain_height"], 1);
        assert_eq!(json["pending_admissions"], 0);
        assert_eq!(json["validation_window_secs"], 300);
    }

    // -- 2. Record reads -----------------------------------------------------

    #[tokio::test]
    async fn block_endpoint_returns_genesis() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/block/0").await;

        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["height"], 0);
        assert_eq!(json["previousBlockHash"], "");
        assert_eq!(json["body"], "First Block Genesis Block");
        assert_eq!(json["hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn block_endpoint_returns_404_for_missing() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/block/999").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let json = json_of(&body);
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["recoverable"], false);
    }

    #[tokio::test]
    async fn hash_lookup_returns_404_for_unknown() {
        let router = create_router(test_app_state());
        let (status, _) = get(&router, "/stars/hash/deadbeef").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // -- 3. Admission --------------------------------------------------------

    #[tokio::test]
    async fn request_validation_is_idempotent() {
        let router = create_router(test_app_state());
        let payload = json!({ "address": "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH" });

        let (status, first) = post_json(&router, "/requestValidation", payload.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = post_json(&router, "/requestValidation", payload).await;

        let first: ValidationChallenge = serde_json::from_slice(&first).unwrap();
        let second: ValidationChallenge = serde_json::from_slice(&second).unwrap();
        assert_eq!(first.message, second.message);
        assert!(first
            .message
            .starts_with("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH:"));
        assert!(first.message.ends_with(":starRegistry"));
        assert!(first.validation_window <= 300);
    }

    #[tokio::test]
    async fn request_validation_requires_address() {
        let router = create_router(test_app_state());
        let (status, body) = post_json(&router, "/requestValidation", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn validate_without_request_is_window_expired() {
        let router = create_router(test_app_state());
        let key = WalletKey::generate(Network::Mainnet);
        let signature = sign_message(&key, "anything");
        let (status, body) = post_json(
            &router,
            "/message-signature/validate",
            json!({ "address": key.address(), "signature": signature }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json = json_of(&body);
        assert_eq!(json["code"], "WINDOW_EXPIRED");
        assert_eq!(json["recoverable"], true);
    }

    #[tokio::test]
    async fn wrong_signer_is_reported_invalid() {
        let router = create_router(test_app_state());
        let owner = WalletKey::generate(Network::Mainnet);
        let intruder = WalletKey::generate(Network::Mainnet);

        let (_, body) = post_json(
            &router,
            "/requestValidation",
            json!({ "address": owner.address() }),
        )
        .await;
        let challenge: ValidationChallenge = serde_json::from_slice(&body).unwrap();

        let forged = sign_message(&intruder, &challenge.message);
        let (status, body) = post_json(
            &router,
            "/message-signature/validate",
            json!({ "address": owner.address(), "signature": forged }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["registerStar"], false);
        assert_eq!(json["status"]["messageSignature"], "invalid");
    }

    #[tokio::test]
    async fn malformed_signature_is_rejected() {
        let router = create_router(test_app_state());
        let key = WalletKey::generate(Network::Mainnet);
        post_json(
            &router,
            "/requestValidation",
            json!({ "address": key.address() }),
        )
        .await;

        let (status, body) = post_json(
            &router,
            "/message-signature/validate",
            json!({ "address": key.address(), "signature": "not-a-signature" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "SIGNATURE_INVALID");
    }

    // -- 4. Registration -----------------------------------------------------

    #[tokio::test]
    async fn full_registration_flow() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let key = authorize(&router).await;

        let (status, body) = post_json(&router, "/block", star_payload(&key.address())).await;
        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["height"], 1);
        assert_eq!(json["body"]["address"], key.address());
        assert_eq!(
            json["body"]["star"]["storyDecoded"],
            "Found star using https://www.google.com/sky/"
        );
        let genesis = state.engine.get_by_height(0).unwrap();
        assert_eq!(json["previousBlockHash"], genesis.hash);

        // One authorization, one record.
        let (status, body) = post_json(&router, "/block", star_payload(&key.address())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "NOT_AUTHORIZED");
        assert_eq!(state.engine.height(), 2);
    }

    #[tokio::test]
    async fn padded_address_registers_under_trimmed_identity() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let key = authorize(&router).await;

        let padded = format!("  {} ", key.address());
        let (status, body) = post_json(&router, "/block", star_payload(&padded)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["body"]["address"], key.address());

        let (status, body) = get(&router, &format!("/stars/address/{}", key.address())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body).as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chain_height_gauge_moves_only_on_append() {
        let state = test_app_state();
        let router = create_router(state.clone());
        state.metrics.chain_height.set(-1);

        let key = authorize(&router).await;
        assert_eq!(state.metrics.chain_height.get(), -1);
        assert_eq!(state.metrics.pending_admissions.get(), 1);

        let (status, _) = post_json(&router, "/block", star_payload(&key.address())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.metrics.chain_height.get(), 2);
        assert_eq!(state.metrics.pending_admissions.get(), 0);
    }

    #[tokio::test]
    async fn registration_without_validation_is_refused() {
        let router = create_router(test_app_state());
        let (status, body) = post_json(
            &router,
            "/block",
            star_payload("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "NOT_AUTHORIZED");
    }

    #[tokio::test]
    async fn invalid_payload_keeps_authorization() {
        let router = create_router(test_app_state());
        let key = authorize(&router).await;

        let mut payload = star_payload(&key.address());
        payload["star"]["ra"] = json!("");
        let (status, body) = post_json(&router, "/block", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "INVALID_PAYLOAD");

        let (status, _) = post_json(&router, "/block", star_payload(&key.address())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_story_is_rejected() {
        let router = create_router(test_app_state());
        let key = authorize(&router).await;

        let mut payload = star_payload(&key.address());
        payload["star"]["story"] = json!("x".repeat(251));
        let (status, body) = post_json(&router, "/block", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["code"], "INVALID_PAYLOAD");
    }

    // -- 5. Lookups and validation -------------------------------------------

    #[tokio::test]
    async fn lookups_by_hash_and_address() {
        let router = create_router(test_app_state());
        let key = authorize(&router).await;
        let (_, body) = post_json(&router, "/block", star_payload(&key.address())).await;
        let hash = json_of(&body)["hash"].as_str().unwrap().to_string();

        let (status, body) = get(&router, &format!("/stars/hash/{hash}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["height"], 1);

        let (status, body) = get(&router, &format!("/stars/address/{}", key.address())).await;
        assert_eq!(status, StatusCode::OK);
        let list = json_of(&body);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["hash"], hash.as_str());

        let (status, body) = get(&router, "/stars/address/1Nobody").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!([]));
    }

    #[tokio::test]
    async fn chain_validation_detects_tampering() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let key = authorize(&router).await;
        post_json(&router, "/block", star_payload(&key.address())).await;

        let (status, body) = get(&router, "/chain/validate").await;
        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["valid"], true);
        assert_eq!(json["checked"], 2);
        assert!(json["firstBadHeight"].is_null());

        let mut genesis = state.engine.get_by_height(0).unwrap();
        genesis.time += 1;
        state.engine.store().put(0, &genesis).unwrap();

        let (_, body) = get(&router, "/chain/validate").await;
        let json = json_of(&body);
        assert_eq!(json["valid"], false);
        assert_eq!(json["firstBadHeight"], 0);
        assert_eq!(json["fault"], "hash_mismatch");
    }

    #[tokio::test]
    async fn corrupt_record_is_500() {
        let state = test_app_state();
        let router = create_router(state.clone());
        state.engine.store().put_raw(0, b"\xff\xfe").unwrap();

        let (status, body) = get(&router, "/block/0").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body)["code"], "CORRUPT_RECORD");
    }

    // -- 6. Maintenance ------------------------------------------------------

    #[test]
    fn sweep_removes_expired_admissions() {
        let state = test_app_state();
        state.admission.request_challenge("a", 1_000);
        state.admission.request_challenge("b", 2_000);

        assert_eq!(sweep_expired_admissions(&state, 1_500), 1);
        assert_eq!(state.admission.len(), 1);
        assert_eq!(state.metrics.admissions_expired_total.get(), 1);
        assert_eq!(state.metrics.pending_admissions.get(), 1);
    }
}
