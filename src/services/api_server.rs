// src/services/api_server.rs
//! API Server for the access-control service
//!
//! The API is built using Axum and includes endpoints for:
//! - Session issuance from relayed JWEs
//! - Session verification, optionally for a role
//! - Proof-gated role granting and cached role lookup
//! - Policy publication
//! - Access-context creation and resource registration
//! - Static files of the configured file store
//!
//! When bearer-token checks are enabled, guarded routes require an
//! `Authorization: Bearer <session token>` header carrying a verified session.
//! The file store is always mounted behind that check.

use crate::error::AccessError;
use crate::models::context::StoredAccessContext;
use crate::models::policy::CreatePolicyResponse;
use crate::models::session::{Role, StoredSession};
use crate::services::access_control::AccessControlService;
use crate::services::context_registrar::{RegisterResourceRequest, RegisterResourceResponse};
use crate::services::policy_publisher::CreatePolicyRequest;
use crate::services::role_granter::{GrantRoleRequest, GrantRoleResponse};
use crate::services::session_issuer::CreateSessionRequest;
use crate::services::session_verifier::{VerifySessionOutput, VerifySessionRequest};
use axum::{
    extract::{Json, Path, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use log::{debug, error, info};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

impl AccessError {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::Validation(_) | AccessError::MalformedToken(_) => StatusCode::BAD_REQUEST,
            AccessError::Decryption(_) | AccessError::SignatureVerification { .. } | AccessError::SessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::ChainRpc(_) | AccessError::TransactionSubmission(_) | AccessError::ArtifactStore(_) => {
                StatusCode::BAD_GATEWAY
            }
            AccessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared handler state
struct ApiState {
    service: AccessControlService,
    use_auth_token: bool,
}

/// API server of the access-control service
pub struct ApiServer {
    state: Arc<ApiState>,
    filestore: Option<PathBuf>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `service` - Access-control service handling every request
    /// * `use_auth_token` - Whether guarded routes require a verified bearer session
    pub fn new(service: AccessControlService, use_auth_token: bool) -> Self {
        ApiServer {
            state: Arc::new(ApiState { service, use_auth_token }),
            filestore: None,
        }
    }

    /// Serves the files under `dir` at `/files/*path`, behind the bearer check
    pub fn with_filestore(mut self, dir: impl Into<PathBuf>) -> Self {
        self.filestore = Some(dir.into());
        self
    }

    /// Builds the router with all routes and middleware
    pub fn router(&self) -> Router {
        let mut guarded = Router::new().route("/v1/roles/:id", get(Self::get_role_handler));
        if let Some(dir) = &self.filestore {
            guarded = guarded.nest_service("/files", ServeDir::new(dir));
        }
        let guarded = guarded.route_layer(middleware::from_fn_with_state(self.state.clone(), Self::auth_middleware));

        Router::new()
            .route("/health", get(Self::health_handler))
            .route("/v1/sessions", post(Self::create_session_handler))
            .route("/v1/sessions/verification", put(Self::verify_session_handler))
            .route("/v1/roles", post(Self::grant_role_handler))
            .route("/v1/policies", post(Self::create_policy_handler))
            .route("/v1/contexts", post(Self::create_context_handler))
            .route("/v1/resources", post(Self::register_resource_handler))
            .merge(guarded)
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    /// Rejects requests without a verified bearer session when auth is enabled
    ///
    /// Every rejection looks the same: 401 `{"error":"unauthorized"}`.
    async fn auth_middleware(State(state): State<Arc<ApiState>>, request: Request, next: Next) -> Response {
        if !state.use_auth_token {
            return next.run(request).await;
        }

        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(String::from);

        let Some(jwt) = token else {
            return unauthorized();
        };
        let outcome = state
            .service
            .verify_session(VerifySessionRequest {
                jwt,
                ..Default::default()
            })
            .await;
        if !outcome.verified {
            debug!("rejected bearer session: {}", outcome.reason.unwrap_or_default());
            return unauthorized();
        }
        next.run(request).await
    }

    /// Liveness check
    ///
    /// # Endpoint
    /// GET /health
    async fn health_handler() -> impl IntoResponse {
        Json(json!({ "status": "ok" }))
    }

    /// Issues a session from a relayed JWE
    ///
    /// # Endpoint
    /// POST /v1/sessions
    ///
    /// # Responses
    /// - 200 OK: Returns the stored session
    /// - 400 Bad Request: Empty JWE or malformed token
    /// - 401 Unauthorized: Decryption or signature verification failed
    async fn create_session_handler(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<CreateSessionRequest>,
    ) -> Result<Json<StoredSession>, AccessError> {
        state.service.create_session(payload).await.map(Json)
    }

    /// Verifies a session token
    ///
    /// # Endpoint
    /// PUT /v1/sessions/verification
    ///
    /// # Responses
    /// - 200 OK: Always; `verified` and `reason` carry the outcome
    async fn verify_session_handler(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<VerifySessionRequest>,
    ) -> Json<VerifySessionOutput> {
        Json(state.service.verify_session(payload).await)
    }

    /// Grants a role with zero-knowledge proofs
    ///
    /// # Endpoint
    /// POST /v1/roles
    ///
    /// # Responses
    /// - 200 OK: Returns the cached role and transaction hash
    /// - 400 Bad Request: Incomplete request
    /// - 502 Bad Gateway: Submission failed
    async fn grant_role_handler(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<GrantRoleRequest>,
    ) -> Result<Json<GrantRoleResponse>, AccessError> {
        state.service.grant_role(payload).await.map(Json)
    }

    /// Returns a cached role
    ///
    /// # Endpoint
    /// GET /v1/roles/:id
    async fn get_role_handler(
        State(state): State<Arc<ApiState>>,
        Path(id): Path<String>,
    ) -> Result<Json<Role>, AccessError> {
        state.service.get_role(&id).await.map(Json)
    }

    /// Publishes and registers a policy
    ///
    /// # Endpoint
    /// POST /v1/policies
    ///
    /// # Responses
    /// - 200 OK: Returns contract address, artifact URIs and registration transaction
    /// - 400 Bad Request: Incomplete request or no deployable contract
    /// - 404 Not Found: Unknown presentation definition
    /// - 502 Bad Gateway: Artifact store or chain failure
    async fn create_policy_handler(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<CreatePolicyRequest>,
    ) -> Result<Json<CreatePolicyResponse>, AccessError> {
        state.service.create_policy(payload).await.map(Json)
    }

    /// Returns the wallet's access context, creating it on first use
    ///
    /// # Endpoint
    /// POST /v1/contexts
    ///
    /// # Responses
    /// - 200 OK: Returns context id and instance address
    /// - 502 Bad Gateway: Creation was rejected or not mined
    async fn create_context_handler(State(state): State<Arc<ApiState>>) -> Result<Json<StoredAccessContext>, AccessError> {
        state.service.create_access_context().await.map(Json)
    }

    /// Registers a resource with its role and policy
    ///
    /// # Endpoint
    /// POST /v1/resources
    ///
    /// # Responses
    /// - 200 OK: Returns role, policy, permission and registration transaction
    /// - 400 Bad Request: Missing role or resource, or invalid policy contract
    /// - 502 Bad Gateway: Submission failed
    async fn register_resource_handler(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<RegisterResourceRequest>,
    ) -> Result<Json<RegisterResourceResponse>, AccessError> {
        state.service.register_resource(payload).await.map(Json)
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sealed_session, signed_token, test_service};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(router: Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn session_jwt(key: &crate::test_support::TestKey) -> String {
        signed_token(
            key,
            "did:example:abc#key-1",
            json!({"iss": "did:example:abc", "sub": "did:example:xyz", "jti": "sess-1", "aud": ["svc"]}),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);
        let request = HttpRequest::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(server.router(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_session_issue_then_verify() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);
        let jwt = session_jwt(&t.key);

        let (status, body) = send(
            server.router(),
            json_request("POST", "/v1/sessions", json!({ "jwe": sealed_session(&jwt, "kid-1") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "sess-1");

        let (status, body) = send(
            server.router(),
            json_request("PUT", "/v1/sessions/verification", json!({ "jwt": jwt })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], true);
    }

    #[tokio::test]
    async fn test_empty_jwe_is_bad_request() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);

        let (status, body) = send(server.router(), json_request("POST", "/v1/sessions", json!({ "jwe": "" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("session JWE is required"));
    }

    #[tokio::test]
    async fn test_guarded_route_requires_verified_bearer() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), true);

        let missing = HttpRequest::builder().uri("/v1/roles/reader").body(Body::empty()).unwrap();
        let (status, body) = send(server.router(), missing).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "unauthorized" }));

        let unknown = HttpRequest::builder()
            .uri("/v1/roles/reader")
            .header("authorization", format!("Bearer {}", session_jwt(&t.key)))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(server.router(), unknown).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_guarded_route_with_verified_bearer() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), true);
        let jwt = session_jwt(&t.key);
        t.service
            .create_session(CreateSessionRequest { jwe: sealed_session(&jwt, "kid-1") })
            .await
            .unwrap();

        let request = HttpRequest::builder()
            .uri("/v1/roles/reader")
            .header("authorization", format!("Bearer {}", jwt))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(server.router(), request).await;

        // authorized, but the role was never granted
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_grant_is_bad_request() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);

        let (status, _) = send(
            server.router(),
            json_request("POST", "/v1/roles", json!({ "role_id": "", "context_id": "ctx", "policies": [] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_context_then_resource_registration() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);

        let (status, context) = send(server.router(), json_request("POST", "/v1/contexts", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(context["address"].as_str().unwrap().starts_with("0x"));

        let (status, again) = send(server.router(), json_request("POST", "/v1/contexts", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again, context);

        let (status, body) = send(
            server.router(),
            json_request(
                "POST",
                "/v1/resources",
                json!({
                    "role": "reader",
                    "policy_contract": "0x00000000000000000000000000000000000000aa",
                    "resource": "/reports/q3.pdf"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["operations"], json!([0, 1]));
        assert!(body["resource"].as_str().unwrap().ends_with(";/reports/q3.pdf"));
    }

    #[tokio::test]
    async fn test_resource_without_role_is_bad_request() {
        let t = test_service();
        let server = ApiServer::new(t.service.clone(), false);

        let (status, _) = send(
            server.router(),
            json_request(
                "POST",
                "/v1/resources",
                json!({ "role": "", "policy_contract": "0x00000000000000000000000000000000000000aa", "resource": "/a" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_store_requires_verified_bearer() {
        let dir = std::env::temp_dir().join(format!("oac-files-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("report.txt"), "quarterly numbers").unwrap();

        let t = test_service();
        let server = ApiServer::new(t.service.clone(), true).with_filestore(&dir);

        let anonymous = HttpRequest::builder().uri("/files/report.txt").body(Body::empty()).unwrap();
        let (status, body) = send(server.router(), anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "unauthorized" }));

        let jwt = session_jwt(&t.key);
        t.service
            .create_session(CreateSessionRequest { jwe: sealed_session(&jwt, "kid-1") })
            .await
            .unwrap();
        let request = HttpRequest::builder()
            .uri("/files/report.txt")
            .header("authorization", format!("Bearer {}", jwt))
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"quarterly numbers");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(AccessError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AccessError::signature("d", "k", "r").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::SessionExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AccessError::ChainRpc("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AccessError::Storage(crate::storage::StorageError::Backend("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
