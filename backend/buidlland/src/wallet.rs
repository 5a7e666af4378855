//! Wallet collaborator.
//!
//! The bridge never holds keys. A [`Wallet`] reports the connected account
//! and signs raw transactions on request; the transaction adapter submits
//! what comes back.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::address::AccountAddress;
use crate::errors::WalletError;
use crate::ledger::{RawTransaction, SignedTransaction, TransactionSignature};

/// EIP-1193 "user rejected request", also used by Aptos wallet adapters.
const USER_REJECTED_CODE: i64 = 4001;

pub trait Wallet: Send + Sync + 'static {
    /// The connected account, if any.
    fn account(&self) -> impl Future<Output = Result<Option<AccountAddress>, WalletError>> + Send;

    fn connect(&self) -> impl Future<Output = Result<AccountAddress, WalletError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Ask the account holder to sign `txn`. A refusal is
    /// [`WalletError::Declined`].
    fn sign(
        &self,
        txn: &RawTransaction,
    ) -> impl Future<Output = Result<SignedTransaction, WalletError>> + Send;
}

// ─────────────────────────────────────────────────────────
// Wallet-adapter bridge over HTTP
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AccountResponse {
    address: Option<AccountAddress>,
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    transaction: &'a RawTransaction,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: TransactionSignature,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Talks to a local wallet-adapter bridge which owns the user's keys and
/// prompts them for approval.
#[derive(Debug, Clone)]
pub struct BridgeWallet {
    client: Client,
    base_url: String,
}

impl BridgeWallet {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn bridge_error(resp: reqwest::Response) -> WalletError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let parsed: Option<BridgeError> = serde_json::from_str(&body).ok();

    if status == StatusCode::FORBIDDEN
        || parsed.as_ref().and_then(|e| e.code) == Some(USER_REJECTED_CODE)
    {
        return WalletError::Declined;
    }
    if status == StatusCode::UNAUTHORIZED {
        return WalletError::NotConnected;
    }
    let message = parsed.map(|e| e.message).unwrap_or(body);
    WalletError::Bridge(format!("{status}: {message}"))
}

impl Wallet for BridgeWallet {
    async fn account(&self) -> Result<Option<AccountAddress>, WalletError> {
        let resp = self.client.get(self.url("/account")).send().await?;
        if !resp.status().is_success() {
            return Err(bridge_error(resp).await);
        }
        let body: AccountResponse = resp.json().await?;
        Ok(body.address)
    }

    async fn connect(&self) -> Result<AccountAddress, WalletError> {
        let resp = self.client.post(self.url("/connect")).send().await?;
        if !resp.status().is_success() {
            return Err(bridge_error(resp).await);
        }
        let body: AccountResponse = resp.json().await?;
        let address = body
            .address
            .ok_or_else(|| WalletError::Bridge("connect returned no account".to_string()))?;
        info!("Wallet connected: {}", address.shorten());
        Ok(address)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        let resp = self.client.post(self.url("/disconnect")).send().await?;
        if !resp.status().is_success() {
            return Err(bridge_error(resp).await);
        }
        info!("Wallet disconnected");
        Ok(())
    }

    async fn sign(&self, txn: &RawTransaction) -> Result<SignedTransaction, WalletError> {
        let resp = self
            .client
            .post(self.url("/sign"))
            .json(&SignRequest { transaction: txn })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(bridge_error(resp).await);
        }
        let body: SignResponse = resp.json().await?;
        debug!(
            "Wallet signed {} (seq {})",
            txn.payload.function, txn.sequence_number
        );
        Ok(SignedTransaction {
            raw: txn.clone(),
            signature: body.signature,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Demo wallet
// ─────────────────────────────────────────────────────────

/// The identity demo mode signs as.
pub const DEMO_ACCOUNT: AccountAddress = AccountAddress::new([
    0x70, 0x99, 0x79, 0x70, 0xc5, 0x18, 0x12, 0xdc, 0x3a, 0x01, 0x0c, 0x7d, 0x01, 0xb5, 0x0e, 0x0d,
    0x17, 0xdc, 0x79, 0xc8, 0x5c, 0x3f, 0x8e, 0x5b, 0x41, 0x27, 0x2e, 0x90, 0x6d, 0x1c, 0x0a, 0x42,
]);

/// Signs everything with a placeholder signature; the fixture ledger does
/// not verify signatures. Can be told to decline, for tests and demos of
/// the decline path.
#[derive(Debug)]
pub struct DemoWallet {
    identity: AccountAddress,
    connected: RwLock<Option<AccountAddress>>,
    decline: AtomicBool,
    signed: AtomicU32,
}

impl DemoWallet {
    /// A wallet holding [`DEMO_ACCOUNT`], initially disconnected.
    pub fn new() -> Self {
        Self::with_identity(DEMO_ACCOUNT)
    }

    pub fn with_identity(identity: AccountAddress) -> Self {
        Self {
            identity,
            connected: RwLock::new(None),
            decline: AtomicBool::new(false),
            signed: AtomicU32::new(0),
        }
    }

    /// Make every later signature request fail as declined (or stop doing so).
    pub fn set_declining(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn signatures(&self) -> u32 {
        self.signed.load(Ordering::SeqCst)
    }
}

impl Default for DemoWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet for DemoWallet {
    async fn account(&self) -> Result<Option<AccountAddress>, WalletError> {
        Ok(*self.connected.read().await)
    }

    async fn connect(&self) -> Result<AccountAddress, WalletError> {
        *self.connected.write().await = Some(self.identity);
        info!("Demo wallet connected as {}", self.identity.shorten());
        Ok(self.identity)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        *self.connected.write().await = None;
        Ok(())
    }

    async fn sign(&self, txn: &RawTransaction) -> Result<SignedTransaction, WalletError> {
        let connected = *self.connected.read().await;
        if connected != Some(txn.sender) {
            return Err(WalletError::NotConnected);
        }
        if self.decline.load(Ordering::SeqCst) {
            return Err(WalletError::Declined);
        }
        self.signed.fetch_add(1, Ordering::SeqCst);
        Ok(SignedTransaction {
            raw: txn.clone(),
            signature: TransactionSignature {
                kind: "ed25519_signature".to_string(),
                public_key: format!("0x{}", hex::encode([0u8; 32])),
                signature: format!("0x{}", hex::encode([0u8; 64])),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode as AxumStatus, routing::{get, post}, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::entry::EntryFunctionPayload;

    fn raw(sender: AccountAddress) -> RawTransaction {
        RawTransaction {
            sender,
            sequence_number: 3,
            max_gas_amount: 2000,
            gas_unit_price: 100,
            expiration_timestamp_secs: 1_700_000_060,
            payload: EntryFunctionPayload {
                kind: "entry_function_payload".into(),
                function: "0x1::m::assign_task".into(),
                type_arguments: vec![],
                arguments: vec![json!("1"), json!("2")],
            },
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn demo_wallet_requires_connection() {
        let wallet = DemoWallet::new();
        assert_eq!(wallet.account().await.unwrap(), None);
        assert!(matches!(
            wallet.sign(&raw(DEMO_ACCOUNT)).await,
            Err(WalletError::NotConnected)
        ));

        let addr = wallet.connect().await.unwrap();
        assert_eq!(addr, DEMO_ACCOUNT);
        let signed = wallet.sign(&raw(DEMO_ACCOUNT)).await.unwrap();
        assert_eq!(signed.raw.sequence_number, 3);
        assert_eq!(wallet.signatures(), 1);

        wallet.disconnect().await.unwrap();
        assert_eq!(wallet.account().await.unwrap(), None);
    }

    #[tokio::test]
    async fn demo_wallet_can_decline() {
        let wallet = DemoWallet::new();
        wallet.connect().await.unwrap();
        wallet.set_declining(true);
        assert!(matches!(
            wallet.sign(&raw(DEMO_ACCOUNT)).await,
            Err(WalletError::Declined)
        ));
        assert_eq!(wallet.signatures(), 0);
    }

    #[tokio::test]
    async fn bridge_maps_user_rejection() {
        let app = Router::new()
            .route(
                "/account",
                get(|| async { Json(json!({"address": "0xabc"})) }),
            )
            .route(
                "/sign",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["transaction"]["sequence_number"], "3");
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({"code": 4001, "message": "User rejected the request."})),
                    )
                }),
            );
        let base = spawn(app).await;
        let wallet = BridgeWallet::new(Client::new(), &base);

        let account = wallet.account().await.unwrap().unwrap();
        assert_eq!(account, "0xabc".parse().unwrap());
        assert!(matches!(
            wallet.sign(&raw(account)).await,
            Err(WalletError::Declined)
        ));
    }

    #[tokio::test]
    async fn bridge_returns_signed_transaction() {
        let app = Router::new().route(
            "/sign",
            post(|| async {
                Json(json!({
                    "signature": {
                        "type": "ed25519_signature",
                        "public_key": "0x01",
                        "signature": "0x02"
                    }
                }))
            }),
        );
        let base = spawn(app).await;
        let wallet = BridgeWallet::new(Client::new(), &base);
        let sender: AccountAddress = "0xabc".parse().unwrap();
        let signed = wallet.sign(&raw(sender)).await.unwrap();
        assert_eq!(signed.raw, raw(sender));
        assert_eq!(signed.signature.signature, "0x02");
    }

    #[tokio::test]
    async fn bridge_unauthorised_means_not_connected() {
        let app = Router::new().route(
            "/connect",
            post(|| async { (AxumStatus::UNAUTHORIZED, Json(json!({"message": "locked"}))) }),
        );
        let base = spawn(app).await;
        let wallet = BridgeWallet::new(Client::new(), &base);
        assert!(matches!(
            wallet.connect().await,
            Err(WalletError::NotConnected)
        ));
    }
}
