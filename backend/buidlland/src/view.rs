//! View-call adapter.
//!
//! One generic [`ViewAdapter::call`] serves every read. Each result type
//! declares its wire schema through [`Decode`]; a value that does not match
//! is a [`DappError::QueryFailed`], never a silently defaulted field.
//!
//! Functions that may not find their entity return a Move `Option`, which
//! the node encodes as `{"vec": []}` / `{"vec": [value]}`. The empty form
//! and HTTP 404 both surface as [`DappError::NotFound`].

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::address::AccountAddress;
use crate::amount::Amount;
use crate::entry::{arg_u64, EntryPoint, ModuleConfig, ViewRequest, COIN_DECIMALS_FUNCTION};
use crate::errors::{DappError, LedgerError, Result};
use crate::ledger::Ledger;
use crate::model::{FundingInfo, Project, ProjectMetadata, ProjectStatus, Task, TaskKey, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(String);

impl DecodeError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Schema for one view function's return value.
pub trait Decode: Sized {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError>;
}

// ─────────────────────────────────────────────────────────
// Field helpers
// ─────────────────────────────────────────────────────────

fn field<'a>(value: &'a Value, name: &str) -> std::result::Result<&'a Value, DecodeError> {
    value
        .get(name)
        .ok_or_else(|| DecodeError::new(format!("missing field `{name}`")))
}

fn as_u64(value: &Value, what: &str) -> std::result::Result<u64, DecodeError> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
    .ok_or_else(|| DecodeError::new(format!("`{what}` is not a u64: {value}")))
}

fn as_u8(value: &Value, what: &str) -> std::result::Result<u8, DecodeError> {
    let wide = as_u64(value, what)?;
    u8::try_from(wide).map_err(|_| DecodeError::new(format!("`{what}` out of u8 range: {wide}")))
}

fn as_timestamp(value: &Value, what: &str) -> std::result::Result<i64, DecodeError> {
    let secs = as_u64(value, what)?;
    i64::try_from(secs).map_err(|_| DecodeError::new(format!("`{what}` out of range: {secs}")))
}

fn as_string(value: &Value, what: &str) -> std::result::Result<String, DecodeError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| DecodeError::new(format!("`{what}` is not a string")))
}

fn as_bool(value: &Value, what: &str) -> std::result::Result<bool, DecodeError> {
    value
        .as_bool()
        .ok_or_else(|| DecodeError::new(format!("`{what}` is not a bool")))
}

fn as_address(value: &Value, what: &str) -> std::result::Result<AccountAddress, DecodeError> {
    as_string(value, what)?
        .parse()
        .map_err(|e| DecodeError::new(format!("`{what}`: {e}")))
}

fn as_strings(value: &Value, what: &str) -> std::result::Result<Vec<String>, DecodeError> {
    value
        .as_array()
        .ok_or_else(|| DecodeError::new(format!("`{what}` is not an array")))?
        .iter()
        .map(|v| as_string(v, what))
        .collect()
}

/// Strip a Move `Option` wrapper. `None` means the option was empty.
fn unwrap_option(value: &Value) -> Option<&Value> {
    match value.as_object() {
        Some(map) if map.len() == 1 => match map.get("vec").and_then(Value::as_array) {
            Some(items) => items.first(),
            None => Some(value),
        },
        _ => Some(value),
    }
}

// ─────────────────────────────────────────────────────────
// Schemas
// ─────────────────────────────────────────────────────────

impl Decode for u8 {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        as_u8(value, "u8")
    }
}

impl Decode for Amount {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        match value {
            Value::String(s) => s.parse::<u128>().ok(),
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        }
        .map(Amount::from_base_units)
        .ok_or_else(|| DecodeError::new(format!("not an amount: {value}")))
    }
}

impl Decode for TaskStatus {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        as_u64(value, "status").map(TaskStatus::from_code)
    }
}

impl Decode for Vec<u64> {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        value
            .as_array()
            .ok_or_else(|| DecodeError::new("task ids are not an array"))?
            .iter()
            .map(|v| as_u64(v, "task id"))
            .collect()
    }
}

impl Decode for ProjectMetadata {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        Ok(ProjectMetadata {
            ai_evaluation: as_string(field(value, "ai_evaluation")?, "ai_evaluation")?,
            market_score: as_u8(field(value, "market_score")?, "market_score")?,
            tech_feasibility: as_string(field(value, "tech_feasibility")?, "tech_feasibility")?,
            min_valuation: as_u64(field(value, "min_valuation")?, "min_valuation")?,
            max_valuation: as_u64(field(value, "max_valuation")?, "max_valuation")?,
        })
    }
}

impl Decode for Project {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        Ok(Project {
            id: as_u64(field(value, "id")?, "id")?,
            creator: as_address(field(value, "creator")?, "creator")?,
            title: as_string(field(value, "title")?, "title")?,
            description: as_string(field(value, "description")?, "description")?,
            tags: as_strings(field(value, "tags")?, "tags")?,
            metadata: ProjectMetadata::decode(field(value, "metadata")?)?,
            status: ProjectStatus::from_code(as_u64(field(value, "status")?, "status")?),
            created_at: as_timestamp(field(value, "created_at")?, "created_at")?,
            updated_at: as_timestamp(field(value, "updated_at")?, "updated_at")?,
        })
    }
}

impl Decode for FundingInfo {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        Ok(FundingInfo {
            funding_goal: Amount::decode(field(value, "funding_goal")?)?,
            raised_amount: Amount::decode(field(value, "raised_amount")?)?,
            start_time: as_timestamp(field(value, "start_time")?, "start_time")?,
            end_time: as_timestamp(field(value, "end_time")?, "end_time")?,
            has_met_funding_goal: as_bool(
                field(value, "has_met_funding_goal")?,
                "has_met_funding_goal",
            )?,
            payment_token: as_address(field(value, "payment_token")?, "payment_token")?,
        })
    }
}

impl Decode for Task {
    fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        let estimated_hours = as_u64(field(value, "estimated_hours")?, "estimated_hours")?;
        Ok(Task {
            key: TaskKey::new(
                as_u64(field(value, "project_id")?, "project_id")?,
                as_u64(field(value, "id")?, "id")?,
            ),
            title: as_string(field(value, "title")?, "title")?,
            description: as_string(field(value, "description")?, "description")?,
            reward: Amount::decode(field(value, "reward")?)?,
            deadline: as_timestamp(field(value, "deadline")?, "deadline")?,
            status: TaskStatus::decode(field(value, "status")?)?,
            required_skills: as_strings(field(value, "required_skills")?, "required_skills")?,
            estimated_hours: u32::try_from(estimated_hours)
                .map_err(|_| DecodeError::new("`estimated_hours` out of range"))?,
            assignee: as_address(field(value, "assignee")?, "assignee")?,
            created_at: as_timestamp(field(value, "created_at")?, "created_at")?,
            completed_at: as_timestamp(field(value, "completed_at")?, "completed_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────

pub struct ViewAdapter<L> {
    ledger: Arc<L>,
    module: ModuleConfig,
}

impl<L: Ledger> ViewAdapter<L> {
    pub fn new(ledger: Arc<L>, module: ModuleConfig) -> Self {
        Self { ledger, module }
    }

    pub fn module(&self) -> &ModuleConfig {
        &self.module
    }

    /// Call `entry` with `args` and decode its first return value as `T`.
    pub async fn call<T: Decode>(
        &self,
        entry: EntryPoint,
        args: Vec<Value>,
        type_args: Vec<String>,
    ) -> Result<T> {
        let function = self.module.function(entry).to_string();
        self.call_function(function, args, type_args).await
    }

    async fn call_function<T: Decode>(
        &self,
        function: String,
        args: Vec<Value>,
        type_args: Vec<String>,
    ) -> Result<T> {
        let request = ViewRequest {
            function,
            type_arguments: type_args,
            arguments: args,
        };
        debug!("view {} {:?}", request.function, request.arguments);

        let values = self.ledger.view(&request).await.map_err(|e| match e {
            LedgerError::NotFound(msg) => {
                DappError::NotFound(format!("{}: {msg}", request.function))
            }
            other => DappError::QueryFailed(format!("{}: {other}", request.function)),
        })?;

        let first = values.first().ok_or_else(|| {
            DappError::QueryFailed(format!("{} returned no values", request.function))
        })?;
        let inner = unwrap_option(first).ok_or_else(|| {
            DappError::NotFound(format!("{} {:?}", request.function, request.arguments))
        })?;
        T::decode(inner)
            .map_err(|e| DappError::QueryFailed(format!("decoding {}: {e}", request.function)))
    }

    pub async fn task_state(&self, key: TaskKey) -> Result<TaskStatus> {
        self.call(
            EntryPoint::GetTaskState,
            self.module.task_args.encode(key),
            vec![],
        )
        .await
    }

    /// Total held by the aggregate crowd-funding pool.
    pub async fn crowd_funding(&self) -> Result<Amount> {
        self.call(EntryPoint::GetCrowdFunding, vec![], vec![]).await
    }

    pub async fn project(&self, id: u64) -> Result<Project> {
        self.call(EntryPoint::GetProject, vec![arg_u64(id)], vec![])
            .await
    }

    pub async fn funding_info(&self, id: u64) -> Result<FundingInfo> {
        self.call(EntryPoint::GetFundingInfo, vec![arg_u64(id)], vec![])
            .await
    }

    pub async fn task(&self, key: TaskKey) -> Result<Task> {
        self.call(
            EntryPoint::GetTask,
            vec![arg_u64(key.project_id), arg_u64(key.task_id)],
            vec![],
        )
        .await
    }

    pub async fn project_task_ids(&self, id: u64) -> Result<Vec<u64>> {
        self.call(EntryPoint::GetProjectTaskIds, vec![arg_u64(id)], vec![])
            .await
    }

    /// Decimal count the ledger declares for `coin_type`.
    pub async fn coin_decimals(&self, coin_type: &str) -> Result<u8> {
        self.call_function(
            COIN_DECIMALS_FUNCTION.to_string(),
            vec![],
            vec![coin_type.to_string()],
        )
        .await
    }
}
