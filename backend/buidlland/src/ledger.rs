//! Ledger node client: view calls, account reads, submission and
//! transaction lookup against a Move node's REST API.
//!
//! ## Resilience
//!
//! * Reads (`/view`, `/accounts`, `/transactions/by_hash`) are retried with
//!   exponential back-off on rate limiting and transport errors, at most
//!   [`MAX_READ_ATTEMPTS`] times; the last error is returned to the caller.
//! * Submission is never retried: a signed payload is sent exactly once.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::address::AccountAddress;
use crate::entry::{EntryFunctionPayload, ViewRequest};
use crate::errors::LedgerError;

const MAX_READ_ATTEMPTS: u32 = 4;
const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 4_000;

// ─────────────────────────────────────────────────────────
// Transaction shapes
// ─────────────────────────────────────────────────────────

/// An unsigned transaction, handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub sender: AccountAddress,
    #[serde(with = "u64_string")]
    pub sequence_number: u64,
    #[serde(with = "u64_string")]
    pub max_gas_amount: u64,
    #[serde(with = "u64_string")]
    pub gas_unit_price: u64,
    #[serde(with = "u64_string")]
    pub expiration_timestamp_secs: u64,
    pub payload: EntryFunctionPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSignature {
    #[serde(rename = "type")]
    pub kind: String,
    pub public_key: String,
    pub signature: String,
}

/// Body of `POST /transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub raw: RawTransaction,
    pub signature: TransactionSignature,
}

/// The ledger's acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
}

/// What the ledger currently knows about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not (yet) visible to the node.
    Unknown,
    /// In the mempool.
    Pending,
    /// Executed and committed at `version`; `success` is false when the
    /// module aborted.
    Committed {
        version: u64,
        success: bool,
        vm_status: String,
    },
}

// ─────────────────────────────────────────────────────────
// The collaborator seam
// ─────────────────────────────────────────────────────────

/// Anything that can answer view calls and accept signed transactions: the
/// live node ([`HttpLedger`]) or the fixture set
/// ([`crate::fixtures::FixtureLedger`]).
pub trait Ledger: Send + Sync + 'static {
    /// Execute a view function and return its raw result values.
    fn view(
        &self,
        request: &ViewRequest,
    ) -> impl Future<Output = Result<Vec<Value>, LedgerError>> + Send;

    /// Current sequence number (next nonce) of `account`.
    fn sequence_number(
        &self,
        account: &AccountAddress,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn submit(
        &self,
        txn: &SignedTransaction,
    ) -> impl Future<Output = Result<PendingTransaction, LedgerError>> + Send;

    fn transaction_status(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<TxStatus, LedgerError>> + Send;
}

// ─────────────────────────────────────────────────────────
// REST response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NodeError {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(with = "u64_string")]
    sequence_number: u64,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
}

// ─────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: Client,
    base_url: String,
}

impl HttpLedger {
    /// `base_url` is the node's versioned root, e.g.
    /// `https://fullnode.testnet.aptoslabs.com/v1`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an idempotent read, retrying transient failures.
    async fn read<F>(&self, what: &str, build: F) -> Result<Response, LedgerError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 1;

        loop {
            match build(&self.client).send().await {
                Err(e) if attempt < MAX_READ_ATTEMPTS && (e.is_connect() || e.is_timeout()) => {
                    warn!("{what} failed (attempt {attempt}, retrying in {backoff}ms): {e}");
                }
                Err(e) => return Err(e.into()),
                Ok(resp) if attempt < MAX_READ_ATTEMPTS && is_throttled(resp.status()) => {
                    warn!(
                        "{what} throttled with {} (attempt {attempt}, retrying in {backoff}ms)",
                        resp.status()
                    );
                }
                Ok(resp) => return Ok(resp),
            }

            tokio::time::sleep(Duration::from_millis(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_MS);
            attempt += 1;
        }
    }
}

fn is_throttled(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Turn a non-success response into a [`LedgerError`].
async fn error_from(resp: Response) -> LedgerError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let parsed: Option<NodeError> = serde_json::from_str(&body).ok();
    let (code, message) = match parsed {
        Some(err) => (
            err.error_code.unwrap_or_else(|| status.as_u16().to_string()),
            err.message,
        ),
        None => (status.as_u16().to_string(), body),
    };

    if status == StatusCode::NOT_FOUND {
        LedgerError::NotFound(message)
    } else {
        LedgerError::Rejected { code, message }
    }
}

impl Ledger for HttpLedger {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, LedgerError> {
        let url = self.url("/view");
        let resp = self
            .read("view call", |c| c.post(&url).json(request))
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let values: Vec<Value> = resp.json().await?;
        debug!("{} returned {} value(s)", request.function, values.len());
        Ok(values)
    }

    async fn sequence_number(&self, account: &AccountAddress) -> Result<u64, LedgerError> {
        let url = self.url(&format!("/accounts/{account}"));
        let resp = self.read("account read", |c| c.get(&url)).await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let data: AccountData = resp.json().await?;
        Ok(data.sequence_number)
    }

    async fn submit(&self, txn: &SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        let resp = self
            .client
            .post(self.url("/transactions"))
            .json(txn)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let pending: PendingTransaction = resp.json().await?;
        debug!("Submitted transaction {}", pending.hash);
        Ok(pending)
    }

    async fn transaction_status(&self, hash: &str) -> Result<TxStatus, LedgerError> {
        let url = self.url(&format!("/transactions/by_hash/{hash}"));
        let resp = self.read("transaction lookup", |c| c.get(&url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(TxStatus::Unknown);
        }
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let data: TransactionData = resp.json().await?;
        parse_status(data)
    }
}

fn parse_status(data: TransactionData) -> Result<TxStatus, LedgerError> {
    if data.kind == "pending_transaction" {
        return Ok(TxStatus::Pending);
    }
    let version = data
        .version
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| LedgerError::Unexpected(format!("{} without version", data.kind)))?;
    let success = data
        .success
        .ok_or_else(|| LedgerError::Unexpected(format!("{} without success flag", data.kind)))?;
    Ok(TxStatus::Committed {
        version,
        success,
        vm_status: data.vm_status.unwrap_or_default(),
    })
}

/// The node encodes `u64` as a decimal string.
pub mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
