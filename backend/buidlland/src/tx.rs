//! Transaction adapter: build, sign, submit, await confirmation.
//!
//! ```text
//! Building ──► AwaitingSignature ──► Submitted ──► Confirmed
//!    │                │                  ├──────► Rejected
//!    └────────────────┴──► Rejected      └──────► TimedOut
//! ```
//!
//! Every call reads a fresh sequence number, so a caller that retries after
//! a failure gets a new transaction rather than a replay. Nothing here
//! retries on its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::AccountAddress;
use crate::entry::{EntryFunctionPayload, EntryPoint, ModuleConfig};
use crate::errors::{DappError, Result};
use crate::ledger::{Ledger, RawTransaction, TxStatus};
use crate::wallet::Wallet;

#[derive(Debug, Clone)]
pub struct TxSettings {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    /// Lifetime of a signed transaction on the ledger.
    pub expiration: Duration,
    /// Upper bound on waiting for confirmation.
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            max_gas_amount: 200_000,
            gas_unit_price: 100,
            expiration: Duration::from_secs(60),
            confirmation_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPhase {
    Building,
    AwaitingSignature,
    Submitted,
    Confirmed,
    Rejected,
    TimedOut,
}

impl TxPhase {
    pub fn can_advance_to(self, next: TxPhase) -> bool {
        use TxPhase::*;
        matches!(
            (self, next),
            (Building, AwaitingSignature | Rejected)
                | (AwaitingSignature, Submitted | Rejected)
                | (Submitted, Confirmed | Rejected | TimedOut)
        )
    }
}

/// One transaction's walk through [`TxPhase`].
#[derive(Debug)]
struct Progress {
    entry: EntryPoint,
    phase: TxPhase,
    history: Vec<TxPhase>,
}

impl Progress {
    fn start(entry: EntryPoint) -> Self {
        Self {
            entry,
            phase: TxPhase::Building,
            history: vec![TxPhase::Building],
        }
    }

    fn advance(&mut self, next: TxPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transaction phase change {:?} -> {:?}",
            self.phase,
            next
        );
        match next {
            TxPhase::Rejected | TxPhase::TimedOut => {
                warn!("{:?}: {:?} -> {:?}", self.entry, self.phase, next)
            }
            _ => debug!("{:?}: {:?} -> {:?}", self.entry, self.phase, next),
        }
        self.phase = next;
        self.history.push(next);
    }

    fn fail(&mut self, next: TxPhase, err: DappError) -> DappError {
        self.advance(next);
        err
    }
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub hash: String,
    pub version: u64,
    pub sender: AccountAddress,
    pub phases: Vec<TxPhase>,
}

pub struct TransactionAdapter<L, W> {
    ledger: Arc<L>,
    wallet: Arc<W>,
    module: ModuleConfig,
    settings: TxSettings,
}

impl<L: Ledger, W: Wallet> TransactionAdapter<L, W> {
    pub fn new(ledger: Arc<L>, wallet: Arc<W>, module: ModuleConfig, settings: TxSettings) -> Self {
        Self {
            ledger,
            wallet,
            module,
            settings,
        }
    }

    /// Run `entry` as a transaction from the connected account.
    ///
    /// Cancelling `cancel` while waiting for confirmation yields
    /// [`DappError::Abandoned`]; the transaction may still commit.
    pub async fn execute(
        &self,
        entry: EntryPoint,
        args: Vec<Value>,
        type_args: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt> {
        let mut progress = Progress::start(entry);

        let sender = match self.wallet.account().await {
            Ok(Some(sender)) => sender,
            Ok(None) => return Err(progress.fail(TxPhase::Rejected, DappError::WalletNotConnected)),
            Err(e) => return Err(progress.fail(TxPhase::Rejected, e.into())),
        };
        let sequence_number = match self.ledger.sequence_number(&sender).await {
            Ok(seq) => seq,
            Err(e) => {
                let err = DappError::QueryFailed(format!("sequence number of {sender}: {e}"));
                return Err(progress.fail(TxPhase::Rejected, err));
            }
        };

        let function = self.module.function(entry);
        let raw = RawTransaction {
            sender,
            sequence_number,
            max_gas_amount: self.settings.max_gas_amount,
            gas_unit_price: self.settings.gas_unit_price,
            expiration_timestamp_secs: Utc::now().timestamp().max(0) as u64
                + self.settings.expiration.as_secs(),
            payload: EntryFunctionPayload::new(&function, args, type_args),
        };

        progress.advance(TxPhase::AwaitingSignature);
        let signed = match self.wallet.sign(&raw).await {
            Ok(signed) => signed,
            Err(e) => return Err(progress.fail(TxPhase::Rejected, e.into())),
        };

        let pending = match self.ledger.submit(&signed).await {
            Ok(pending) => pending,
            Err(e) => {
                let err = DappError::SubmissionFailed(format!("{function}: {e}"));
                return Err(progress.fail(TxPhase::Rejected, err));
            }
        };
        progress.advance(TxPhase::Submitted);
        info!("{function} submitted as {} (seq {sequence_number})", pending.hash);

        let watched = pending.hash.clone();
        let version = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stopped waiting for {}", pending.hash);
                return Err(DappError::Abandoned { hash: pending.hash });
            }
            outcome = tokio::time::timeout(
                self.settings.confirmation_timeout,
                self.poll_until_committed(&watched),
            ) => match outcome {
                Ok(Ok(version)) => version,
                Ok(Err(vm_status)) => {
                    let err = DappError::SubmissionFailed(format!("{function}: {vm_status}"));
                    return Err(progress.fail(TxPhase::Rejected, err));
                }
                Err(_) => {
                    let err = DappError::ConfirmationTimeout { hash: pending.hash };
                    return Err(progress.fail(TxPhase::TimedOut, err));
                }
            }
        };

        progress.advance(TxPhase::Confirmed);
        info!("{} confirmed at version {version}", pending.hash);
        Ok(TxReceipt {
            hash: pending.hash,
            version,
            sender,
            phases: progress.history,
        })
    }

    /// Poll until the transaction commits. `Err` carries the VM status of a
    /// committed-but-aborted transaction.
    async fn poll_until_committed(&self, hash: &str) -> std::result::Result<u64, String> {
        loop {
            match self.ledger.transaction_status(hash).await {
                Ok(TxStatus::Committed {
                    version,
                    success: true,
                    ..
                }) => return Ok(version),
                Ok(TxStatus::Committed { vm_status, .. }) => return Err(vm_status),
                Ok(TxStatus::Pending | TxStatus::Unknown) => {}
                Err(e) => warn!("Lookup of {hash} failed, still waiting: {e}"),
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
