//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::DappError;
use crate::ledger::Ledger;
use crate::model::TaskKey;
use crate::present::{FundingView, PoolView, ProjectPage, TaskCard, TaskPage, TaskStatusView};
use crate::service::{ActionOutcome, Dapp};
use crate::wallet::Wallet;

/// How long clients should keep an error notice on screen.
const NOTICE_TTL_MS: u64 = 5_000;

pub struct ApiState<L, W> {
    pub dapp: Dapp<L, W>,
    /// "live" or "demo", reported by `/health`.
    pub data_source: &'static str,
}

type Shared<L, W> = State<Arc<ApiState<L, W>>>;

pub fn router<L: Ledger, W: Wallet>(state: Arc<ApiState<L, W>>) -> Router {
    Router::new()
        .route("/health", get(health::<L, W>))
        .route("/projects/:id", get(get_project::<L, W>))
        .route("/projects/:id/refresh", post(refresh_project::<L, W>))
        .route("/projects/:id/fund", post(fund_project::<L, W>))
        .route("/projects/:id/tasks", get(get_project_tasks::<L, W>))
        .route("/projects/:id/tasks/:task_id", get(get_task::<L, W>))
        .route("/projects/:id/tasks/:task_id/status", get(get_task_status::<L, W>))
        .route("/projects/:id/tasks/:task_id/apply", post(apply::<L, W>))
        .route("/projects/:id/tasks/:task_id/start", post(start::<L, W>))
        .route("/projects/:id/tasks/:task_id/complete", post(complete::<L, W>))
        .route("/funding/total", get(get_pool::<L, W>))
        .route("/funding/deposit", post(deposit::<L, W>))
        .route("/wallet", get(get_wallet::<L, W>))
        .route("/wallet/connect", post(connect_wallet::<L, W>))
        .route("/wallet/disconnect", post(disconnect_wallet::<L, W>))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub data_source: &'static str,
}

/// A token quantity as the user typed it, e.g. `"1.5"`.
#[derive(Deserialize)]
pub struct AmountRequest {
    pub amount: String,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub connected: bool,
    pub address: Option<String>,
    pub short_address: Option<String>,
}

/// A transient, dismissible message for the page to show.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub level: &'static str,
    pub message: String,
    pub dismissible: bool,
    pub ttl_ms: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub notice: Notice,
}

fn error_kind(err: &DappError) -> (StatusCode, &'static str) {
    match err {
        DappError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DappError::QueryFailed(_) => (StatusCode::BAD_GATEWAY, "query_failed"),
        DappError::SignatureDeclined => (StatusCode::FORBIDDEN, "signature_declined"),
        DappError::SubmissionFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, "submission_failed"),
        DappError::ConfirmationTimeout { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, "confirmation_timeout")
        }
        DappError::WalletNotConnected => (StatusCode::CONFLICT, "wallet_not_connected"),
        DappError::Abandoned { .. } => (StatusCode::SERVICE_UNAVAILABLE, "abandoned"),
        DappError::WalletUnavailable(_) => (StatusCode::BAD_GATEWAY, "wallet_unavailable"),
        DappError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
        DappError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
    }
}

impl IntoResponse for DappError {
    fn into_response(self) -> Response {
        let (status, kind) = error_kind(&self);
        let level = match &self {
            DappError::SignatureDeclined
            | DappError::WalletNotConnected
            | DappError::InvalidAmount(_)
            | DappError::ConfirmationTimeout { .. } => "warning",
            _ => "error",
        };
        if status.is_server_error() {
            error!("{kind}: {self}");
        } else {
            warn!("{kind}: {self}");
        }
        let body = ErrorResponse {
            error: kind,
            notice: Notice {
                level,
                message: self.to_string(),
                dismissible: true,
                ttl_ms: NOTICE_TTL_MS,
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, DappError>;

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health<L: Ledger, W: Wallet>(State(state): Shared<L, W>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        data_source: state.data_source,
    })
}

/// `GET /projects/:id`
pub async fn get_project<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path(id): Path<u64>,
) -> ApiResult<ProjectPage> {
    Ok(Json(state.dapp.project_page(id).await?))
}

/// `POST /projects/:id/refresh`: drop cached data for the project and re-read it.
pub async fn refresh_project<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path(id): Path<u64>,
) -> ApiResult<ProjectPage> {
    Ok(Json(state.dapp.refresh_project(id).await?))
}

/// `GET /projects/:id/tasks`
pub async fn get_project_tasks<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<TaskCard>> {
    Ok(Json(state.dapp.task_cards(id).await?))
}

/// `GET /projects/:id/tasks/:task_id`
pub async fn get_task<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path((id, task_id)): Path<(u64, u64)>,
) -> ApiResult<TaskPage> {
    Ok(Json(state.dapp.task_page(TaskKey::new(id, task_id)).await?))
}

/// `GET /projects/:id/tasks/:task_id/status`
pub async fn get_task_status<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path((id, task_id)): Path<(u64, u64)>,
) -> ApiResult<TaskStatusView> {
    Ok(Json(state.dapp.task_status(TaskKey::new(id, task_id)).await?))
}

/// `GET /funding/total`
pub async fn get_pool<L: Ledger, W: Wallet>(State(state): Shared<L, W>) -> ApiResult<PoolView> {
    Ok(Json(state.dapp.pool_view().await?))
}

/// `POST /projects/:id/fund`
///
/// Contributes `amount` to the project and returns the confirmed receipt
/// with the refreshed funding view (`null` when the re-read failed).
pub async fn fund_project<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path(id): Path<u64>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<ActionOutcome<FundingView>> {
    let amount = state
        .dapp
        .coin()
        .decimals
        .parse(&req.amount)
        .map_err(|e| DappError::InvalidAmount(e.to_string()))?;
    Ok(Json(state.dapp.fund_project(id, amount).await?))
}

/// `POST /funding/deposit`
pub async fn deposit<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<ActionOutcome<PoolView>> {
    let amount = state
        .dapp
        .coin()
        .decimals
        .parse(&req.amount)
        .map_err(|e| DappError::InvalidAmount(e.to_string()))?;
    Ok(Json(state.dapp.deposit(amount).await?))
}

/// `POST /projects/:id/tasks/:task_id/apply`
pub async fn apply<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path((id, task_id)): Path<(u64, u64)>,
) -> ApiResult<ActionOutcome<TaskPage>> {
    Ok(Json(state.dapp.apply(TaskKey::new(id, task_id)).await?))
}

/// `POST /projects/:id/tasks/:task_id/start`
pub async fn start<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path((id, task_id)): Path<(u64, u64)>,
) -> ApiResult<ActionOutcome<TaskPage>> {
    Ok(Json(state.dapp.start(TaskKey::new(id, task_id)).await?))
}

/// `POST /projects/:id/tasks/:task_id/complete`
pub async fn complete<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
    Path((id, task_id)): Path<(u64, u64)>,
) -> ApiResult<ActionOutcome<TaskPage>> {
    Ok(Json(state.dapp.complete(TaskKey::new(id, task_id)).await?))
}

/// `GET /wallet`
pub async fn get_wallet<L: Ledger, W: Wallet>(State(state): Shared<L, W>) -> ApiResult<WalletResponse> {
    let account = state.dapp.account().await?;
    Ok(Json(WalletResponse {
        connected: account.is_some(),
        address: account.map(|a| a.to_hex_literal()),
        short_address: account.map(|a| a.shorten()),
    }))
}

/// `POST /wallet/connect`
pub async fn connect_wallet<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
) -> ApiResult<WalletResponse> {
    let account = state.dapp.connect_wallet().await?;
    Ok(Json(WalletResponse {
        connected: true,
        address: Some(account.to_hex_literal()),
        short_address: Some(account.shorten()),
    }))
}

/// `POST /wallet/disconnect`
pub async fn disconnect_wallet<L: Ledger, W: Wallet>(
    State(state): Shared<L, W>,
) -> ApiResult<WalletResponse> {
    state.dapp.disconnect_wallet().await?;
    Ok(Json(WalletResponse {
        connected: false,
        address: None,
        short_address: None,
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use reqwest::Client;
    use serde_json::{json, Value};

    use super::*;
    use crate::entry::{ModuleConfig, TaskArgs};
    use crate::fixtures::FixtureLedger;
    use crate::service::DappSettings;
    use crate::tx::TxSettings;
    use crate::wallet::{DemoWallet, DEMO_ACCOUNT};

    async fn spawn() -> (String, Arc<DemoWallet>) {
        let module = ModuleConfig::new("0xcafe".parse().unwrap(), "mock_crowfunding")
            .with_task_args(TaskArgs::ProjectAndTask);
        let ledger = Arc::new(FixtureLedger::new(module.clone(), Utc::now()));
        let wallet = Arc::new(DemoWallet::new());
        let settings = DappSettings {
            coin_type: "0xcafe::test_usdc::FaucetCoin".into(),
            coin_symbol: "USDC".into(),
            coin_decimals: None,
            tx: TxSettings {
                confirmation_timeout: Duration::from_millis(500),
                poll_interval: Duration::from_millis(5),
                ..TxSettings::default()
            },
        };
        let dapp = Dapp::bootstrap(ledger, wallet.clone(), module, settings)
            .await
            .unwrap();
        let app = router(Arc::new(ApiState {
            dapp,
            data_source: "demo",
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), wallet)
    }

    #[tokio::test]
    async fn health_reports_data_source() {
        let (base, _) = spawn().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["data_source"], "demo");
    }

    #[tokio::test]
    async fn project_page_and_missing_project() {
        let (base, _) = spawn().await;
        let resp = reqwest::get(format!("{base}/projects/2")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["title"], "GenomeGuard");
        assert_eq!(body["funding"]["progress_percent"], 50);

        let resp = reqwest::get(format!("{base}/projects/99")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["notice"]["dismissible"], true);
        assert_eq!(body["notice"]["ttl_ms"], NOTICE_TTL_MS);
    }

    #[tokio::test]
    async fn refresh_rereads_the_project() {
        let (base, _) = spawn().await;
        let client = Client::new();
        let resp = client
            .post(format!("{base}/projects/3/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["title"], "PhishZap");

        let resp = client
            .post(format!("{base}/projects/99/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn apply_requires_a_connected_wallet() {
        let (base, _) = spawn().await;
        let client = Client::new();
        let url = format!("{base}/projects/1/tasks/3/apply");

        let resp = client.post(&url).send().await.unwrap();
        assert_eq!(resp.status(), 409);

        let wallet: Value = client
            .post(format!("{base}/wallet/connect"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(wallet["address"], DEMO_ACCOUNT.to_hex_literal());

        let resp = client.post(&url).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["view"]["status"], "Assigned");
        assert_eq!(body["view"]["actions"], json!(["start"]));
        assert_eq!(body["receipt"]["phases"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn declined_signature_is_forbidden() {
        let (base, wallet) = spawn().await;
        wallet.connect().await.unwrap();
        wallet.set_declining(true);

        let resp = Client::new()
            .post(format!("{base}/projects/1/fund"))
            .json(&json!({ "amount": "10" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["notice"]["level"], "warning");
    }

    #[tokio::test]
    async fn funding_round_trip() {
        let (base, wallet) = spawn().await;
        wallet.connect().await.unwrap();
        let client = Client::new();

        let resp = client
            .post(format!("{base}/projects/5/fund"))
            .json(&json!({ "amount": "140000" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["view"]["progress_percent"], 70);
        assert_eq!(body["view"]["raised"], "490,000");

        let resp = client
            .post(format!("{base}/projects/5/fund"))
            .json(&json!({ "amount": "lots" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn closed_funding_is_unprocessable() {
        let (base, wallet) = spawn().await;
        wallet.connect().await.unwrap();
        let resp = Client::new()
            .post(format!("{base}/projects/4/fund"))
            .json(&json!({ "amount": "1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        assert!(body["notice"]["message"]
            .as_str()
            .unwrap()
            .contains("E_FUNDING_CLOSED"));
    }
}
