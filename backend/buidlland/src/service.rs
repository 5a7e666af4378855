//! Composition root: caches, adapters and the page/action operations the
//! HTTP layer exposes.
//!
//! Reads go cache-first, then through the view adapter, and populate the
//! cache. Actions run through the transaction adapter and, once confirmed,
//! re-fetch the affected entity exactly once, overwriting its cache entry.
//! When the outcome is unknown (timeout, abandoned wait) the entry is
//! invalidated instead, so the next read goes back to the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::address::AccountAddress;
use crate::amount::{Amount, Decimals};
use crate::cache::EntityCache;
use crate::entry::{arg_amount, arg_u64, EntryPoint, ModuleConfig};
use crate::errors::{DappError, Result};
use crate::ledger::Ledger;
use crate::model::{FundingInfo, Project, Task, TaskKey};
use crate::present::{
    CoinDisplay, FundingView, PoolView, ProjectPage, TaskCard, TaskPage, TaskStatusView,
};
use crate::tx::{TransactionAdapter, TxReceipt, TxSettings};
use crate::view::ViewAdapter;
use crate::wallet::Wallet;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DappSettings {
    /// Move type of the coin used for funding, e.g. `0x1::aptos_coin::AptosCoin`.
    pub coin_type: String,
    pub coin_symbol: String,
    /// Overrides the decimal count the ledger declares for `coin_type`.
    pub coin_decimals: Option<u8>,
    pub tx: TxSettings,
}

/// Per-entity caches. Invalidating a project drops its funding, its task
/// list and every cached task of that project.
#[derive(Clone)]
pub struct Caches {
    pub projects: EntityCache<u64, Project>,
    pub funding: EntityCache<u64, FundingInfo>,
    pub task_ids: EntityCache<u64, Vec<u64>>,
    pub tasks: EntityCache<TaskKey, Task>,
    pub pool: EntityCache<(), Amount>,
}

impl Caches {
    pub fn new() -> Self {
        let caches = Self {
            projects: EntityCache::new("projects"),
            funding: EntityCache::new("funding"),
            task_ids: EntityCache::new("task_ids"),
            tasks: EntityCache::new("tasks"),
            pool: EntityCache::new("pool"),
        };
        let funding = caches.funding.clone();
        let task_ids = caches.task_ids.clone();
        let tasks = caches.tasks.clone();
        caches.projects.on_invalidate(move |id| {
            funding.invalidate(id);
            task_ids.invalidate(id);
            tasks.invalidate_where(|key| key.project_id == *id);
        });
        caches
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new()
    }
}

/// A confirmed action and the refreshed view of what it changed.
///
/// `view` is `None` when the re-read after confirmation failed. The
/// transaction still committed; the stale entry has been dropped so the
/// next read goes back to the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome<V> {
    pub receipt: TxReceipt,
    pub view: Option<V>,
}

/// What a transaction touches, for cache maintenance.
#[derive(Debug, Clone, Copy)]
enum Affected {
    Funding(u64),
    Pool,
    Task(TaskKey),
}

pub struct Dapp<L, W> {
    views: ViewAdapter<L>,
    tx: TransactionAdapter<L, W>,
    wallet: Arc<W>,
    caches: Caches,
    coin: CoinDisplay,
    coin_type: String,
    clock: Clock,
    shutdown: CancellationToken,
}

impl<L: Ledger, W: Wallet> Dapp<L, W> {
    /// Wire the adapters and resolve the coin's decimal count, from the
    /// settings when overridden and from the ledger otherwise.
    pub async fn bootstrap(
        ledger: Arc<L>,
        wallet: Arc<W>,
        module: ModuleConfig,
        settings: DappSettings,
    ) -> Result<Self> {
        let views = ViewAdapter::new(ledger.clone(), module.clone());
        let raw_decimals = match settings.coin_decimals {
            Some(decimals) => decimals,
            None => views.coin_decimals(&settings.coin_type).await?,
        };
        let decimals =
            Decimals::new(raw_decimals).map_err(|e| DappError::Config(e.to_string()))?;
        info!(
            "{} ({}) uses {} decimals",
            settings.coin_symbol,
            settings.coin_type,
            decimals.get()
        );

        Ok(Self {
            views,
            tx: TransactionAdapter::new(ledger, wallet.clone(), module, settings.tx),
            wallet,
            caches: Caches::new(),
            coin: CoinDisplay {
                symbol: settings.coin_symbol,
                decimals,
            },
            coin_type: settings.coin_type,
            clock: Arc::new(Utc::now),
            shutdown: CancellationToken::new(),
        })
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn coin(&self) -> &CoinDisplay {
        &self.coin
    }

    /// Cancelling this token stops every in-flight confirmation wait.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // ── fetch-through ───────────────────────────────────

    async fn project(&self, id: u64) -> Result<Project> {
        if let Some(project) = self.caches.projects.get(&id) {
            return Ok(project);
        }
        let project = self.views.project(id).await?;
        self.caches.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn funding(&self, id: u64) -> Result<FundingInfo> {
        match self.caches.funding.get(&id) {
            Some(info) => Ok(info),
            None => self.refresh_funding(id).await,
        }
    }

    async fn task_ids(&self, id: u64) -> Result<Vec<u64>> {
        if let Some(ids) = self.caches.task_ids.get(&id) {
            return Ok(ids);
        }
        let ids = self.views.project_task_ids(id).await?;
        self.caches.task_ids.insert(id, ids.clone());
        Ok(ids)
    }

    async fn task(&self, key: TaskKey) -> Result<Task> {
        match self.caches.tasks.get(&key) {
            Some(task) => Ok(task),
            None => self.refresh_task(key).await,
        }
    }

    async fn pool(&self) -> Result<Amount> {
        match self.caches.pool.get(&()) {
            Some(total) => Ok(total),
            None => self.refresh_pool().await,
        }
    }

    async fn refresh_funding(&self, id: u64) -> Result<FundingInfo> {
        let info = self.views.funding_info(id).await?;
        self.caches.funding.insert(id, info.clone());
        Ok(info)
    }

    async fn refresh_task(&self, key: TaskKey) -> Result<Task> {
        let task = self.views.task(key).await?;
        self.caches.tasks.insert(key, task.clone());
        Ok(task)
    }

    async fn refresh_pool(&self) -> Result<Amount> {
        let total = self.views.crowd_funding().await?;
        self.caches.pool.insert((), total);
        Ok(total)
    }

    /// The connected account, or `None` when the wallet cannot say. A page
    /// still renders without a viewer.
    async fn viewer(&self) -> Option<AccountAddress> {
        match self.wallet.account().await {
            Ok(account) => account,
            Err(e) => {
                warn!("Wallet account lookup failed: {e}");
                None
            }
        }
    }

    // ── pages ───────────────────────────────────────────

    pub async fn project_page(&self, id: u64) -> Result<ProjectPage> {
        let project = self.project(id).await?;
        let funding = match self.funding(id).await {
            Ok(info) => Some(info),
            Err(DappError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let task_count = self.task_ids(id).await?.len();
        Ok(ProjectPage::build(
            &project,
            funding.as_ref(),
            task_count,
            &self.coin,
            self.now(),
        ))
    }

    pub async fn task_cards(&self, project_id: u64) -> Result<Vec<TaskCard>> {
        let now = self.now();
        let mut cards = Vec::new();
        for task_id in self.task_ids(project_id).await? {
            let task = self.task(TaskKey::new(project_id, task_id)).await?;
            cards.push(TaskCard::build(&task, &self.coin, now));
        }
        Ok(cards)
    }

    pub async fn task_page(&self, key: TaskKey) -> Result<TaskPage> {
        let task = self.task(key).await?;
        let viewer = self.viewer().await;
        Ok(TaskPage::build(&task, viewer.as_ref(), &self.coin, self.now()))
    }

    /// Read the status straight from the ledger and drop the cached task if
    /// it has moved on.
    pub async fn task_status(&self, key: TaskKey) -> Result<TaskStatusView> {
        let status = self.views.task_state(key).await?;
        let stale = self
            .caches
            .tasks
            .get(&key)
            .is_some_and(|task| task.status != status);
        if stale {
            info!("Task {key} is now {}; dropping cached copy", status.label());
            self.caches.tasks.invalidate(&key);
        }
        Ok(TaskStatusView {
            status: status.label(),
            code: status.code(),
            stale,
        })
    }

    pub async fn pool_view(&self) -> Result<PoolView> {
        let total = self.pool().await?;
        Ok(PoolView::build(total, &self.coin))
    }

    // ── actions ─────────────────────────────────────────

    pub async fn fund_project(&self, id: u64, amount: Amount) -> Result<ActionOutcome<FundingView>> {
        if amount.is_zero() {
            return Err(DappError::InvalidAmount("contribution must be positive".to_string()));
        }
        let receipt = self
            .run(
                EntryPoint::ContributeFunding,
                vec![arg_u64(id), arg_amount(amount)],
                vec![self.coin_type.clone()],
                Affected::Funding(id),
            )
            .await?;
        let refreshed = self.refresh_funding(id).await;
        // The pool total moved too; let the next read pick it up.
        self.caches.pool.invalidate(&());
        let view = self
            .settle(&receipt, Affected::Funding(id), refreshed)
            .map(|info| FundingView::build(&info, &self.coin, self.now()));
        Ok(ActionOutcome { receipt, view })
    }

    pub async fn deposit(&self, amount: Amount) -> Result<ActionOutcome<PoolView>> {
        if amount.is_zero() {
            return Err(DappError::InvalidAmount("deposit must be positive".to_string()));
        }
        let receipt = self
            .run(
                EntryPoint::DepositFunding,
                vec![arg_amount(amount)],
                vec![self.coin_type.clone()],
                Affected::Pool,
            )
            .await?;
        let refreshed = self.refresh_pool().await;
        let view = self
            .settle(&receipt, Affected::Pool, refreshed)
            .map(|total| PoolView::build(total, &self.coin));
        Ok(ActionOutcome { receipt, view })
    }

    /// Apply for (be assigned) an open task.
    pub async fn apply(&self, key: TaskKey) -> Result<ActionOutcome<TaskPage>> {
        self.task_action(EntryPoint::AssignTask, key).await
    }

    pub async fn start(&self, key: TaskKey) -> Result<ActionOutcome<TaskPage>> {
        self.task_action(EntryPoint::StartTask, key).await
    }

    pub async fn complete(&self, key: TaskKey) -> Result<ActionOutcome<TaskPage>> {
        self.task_action(EntryPoint::CompleteTask, key).await
    }

    async fn task_action(&self, entry: EntryPoint, key: TaskKey) -> Result<ActionOutcome<TaskPage>> {
        let receipt = self
            .run(
                entry,
                self.views.module().task_args.encode(key),
                vec![self.coin_type.clone()],
                Affected::Task(key),
            )
            .await?;
        let refreshed = self.refresh_task(key).await;
        let view = self
            .settle(&receipt, Affected::Task(key), refreshed)
            .map(|task| TaskPage::build(&task, Some(&receipt.sender), &self.coin, self.now()));
        Ok(ActionOutcome { receipt, view })
    }

    /// Keep the post-confirmation re-read if it worked. Otherwise drop the
    /// affected entry; the receipt still goes back to the caller.
    fn settle<T>(&self, receipt: &TxReceipt, affected: Affected, refreshed: Result<T>) -> Option<T> {
        match refreshed {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "{} committed at version {} but the re-read failed: {e}",
                    receipt.hash, receipt.version
                );
                self.invalidate(affected);
                None
            }
        }
    }

    async fn run(
        &self,
        entry: EntryPoint,
        args: Vec<Value>,
        type_args: Vec<String>,
        affected: Affected,
    ) -> Result<TxReceipt> {
        let cancel = self.shutdown.child_token();
        let result = self.tx.execute(entry, args, type_args, &cancel).await;
        if let Err(DappError::ConfirmationTimeout { .. } | DappError::Abandoned { .. }) = &result {
            self.invalidate(affected);
        }
        result
    }

    fn invalidate(&self, affected: Affected) {
        match affected {
            Affected::Funding(id) => {
                self.caches.funding.invalidate(&id);
                self.caches.pool.invalidate(&());
            }
            Affected::Pool => {
                self.caches.pool.invalidate(&());
            }
            Affected::Task(key) => {
                self.caches.tasks.invalidate(&key);
            }
        }
    }

    // ── wallet ──────────────────────────────────────────

    pub async fn account(&self) -> Result<Option<AccountAddress>> {
        Ok(self.wallet.account().await?)
    }

    pub async fn connect_wallet(&self) -> Result<AccountAddress> {
        Ok(self.wallet.connect().await?)
    }

    pub async fn disconnect_wallet(&self) -> Result<()> {
        Ok(self.wallet.disconnect().await?)
    }

    /// Drop the project with its funding and task list, then read it again.
    pub async fn refresh_project(&self, id: u64) -> Result<ProjectPage> {
        self.caches.projects.invalidate(&id);
        self.project_page(id).await
    }
}
