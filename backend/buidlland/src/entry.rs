//! Entry-point descriptors for the crowdfunding module.
//!
//! Every call the bridge makes, read or write, is described by an
//! [`EntryPoint`] resolved against the configured module into a fully
//! qualified function id (`<address>::<module>::<function>`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::AccountAddress;
use crate::amount::Amount;
use crate::errors::DappError;
use crate::model::TaskKey;

/// `0x1::coin::decimals<CoinType>`; answers the authoritative decimal count.
pub const COIN_DECIMALS_FUNCTION: &str = "0x1::coin::decimals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    // Transactions
    ContributeFunding,
    DepositFunding,
    AssignTask,
    StartTask,
    CompleteTask,
    // Views
    GetTaskState,
    GetCrowdFunding,
    GetProject,
    GetFundingInfo,
    GetTask,
    GetProjectTaskIds,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 11] = [
        Self::ContributeFunding,
        Self::DepositFunding,
        Self::AssignTask,
        Self::StartTask,
        Self::CompleteTask,
        Self::GetTaskState,
        Self::GetCrowdFunding,
        Self::GetProject,
        Self::GetFundingInfo,
        Self::GetTask,
        Self::GetProjectTaskIds,
    ];

    pub fn default_name(self) -> &'static str {
        match self {
            Self::ContributeFunding => "contribute_funding",
            Self::DepositFunding => "deposit_funding",
            Self::AssignTask => "assign_task",
            Self::StartTask => "start_task",
            Self::CompleteTask => "complete_task",
            Self::GetTaskState => "get_task_state",
            Self::GetCrowdFunding => "get_crowd_funding",
            Self::GetProject => "get_project",
            Self::GetFundingInfo => "get_funding_info",
            Self::GetTask => "get_task",
            Self::GetProjectTaskIds => "get_project_task_ids",
        }
    }

    /// Suffix of the `FN_*` environment variable that renames this entry point.
    pub fn env_key(self) -> String {
        format!("FN_{}", self.default_name().to_ascii_uppercase())
    }

    pub fn is_view(self) -> bool {
        !matches!(
            self,
            Self::ContributeFunding
                | Self::DepositFunding
                | Self::AssignTask
                | Self::StartTask
                | Self::CompleteTask
        )
    }
}

/// A fully qualified Move function id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId {
    pub address: AccountAddress,
    pub module: String,
    pub name: String,
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)
    }
}

/// How a task is identified in the arguments of the task entry functions
/// and `get_task_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskArgs {
    /// `[task_id]`: the deployed module numbers tasks globally.
    #[default]
    TaskId,
    /// `[project_id, task_id]`: task ids restart in every project.
    ProjectAndTask,
}

impl TaskArgs {
    pub fn encode(self, key: TaskKey) -> Vec<Value> {
        match self {
            Self::TaskId => vec![arg_u64(key.task_id)],
            Self::ProjectAndTask => vec![arg_u64(key.project_id), arg_u64(key.task_id)],
        }
    }
}

impl std::str::FromStr for TaskArgs {
    type Err = DappError;

    fn from_str(s: &str) -> Result<Self, DappError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task_id" => Ok(Self::TaskId),
            "project_task" => Ok(Self::ProjectAndTask),
            other => Err(DappError::Config(format!(
                "Invalid TASK_ARGS {other:?} (expected \"task_id\" or \"project_task\")"
            ))),
        }
    }
}

/// The configured module and the function names it exports.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub address: AccountAddress,
    pub module: String,
    pub task_args: TaskArgs,
    /// Indexed like [`EntryPoint::ALL`].
    names: Vec<String>,
}

impl ModuleConfig {
    pub fn new(address: AccountAddress, module: impl Into<String>) -> Self {
        Self {
            address,
            module: module.into(),
            task_args: TaskArgs::default(),
            names: EntryPoint::ALL
                .iter()
                .map(|e| e.default_name().to_string())
                .collect(),
        }
    }

    pub fn with_task_args(mut self, task_args: TaskArgs) -> Self {
        self.task_args = task_args;
        self
    }

    pub fn rename(&mut self, entry: EntryPoint, name: impl Into<String>) {
        if let Some(pos) = EntryPoint::ALL.iter().position(|e| *e == entry) {
            self.names[pos] = name.into();
        }
    }

    pub fn function(&self, entry: EntryPoint) -> FunctionId {
        let pos = EntryPoint::ALL
            .iter()
            .position(|e| *e == entry)
            .unwrap_or_default();
        FunctionId {
            address: self.address,
            module: self.module.clone(),
            name: self.names[pos].clone(),
        }
    }

    /// Reverse lookup used by the fixture ledger to dispatch calls.
    pub fn resolve(&self, function: &str) -> Option<EntryPoint> {
        EntryPoint::ALL
            .into_iter()
            .find(|e| self.function(*e).to_string() == function)
    }
}

// ─────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────

/// Body of a `POST /view` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

/// The call a transaction carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: &FunctionId, args: Vec<Value>, type_args: Vec<String>) -> Self {
        Self {
            kind: "entry_function_payload".to_string(),
            function: function.to_string(),
            type_arguments: type_args,
            arguments: args,
        }
    }
}

// The ledger's JSON encoding wants 64/128-bit integers as strings.

pub fn arg_u64(value: u64) -> Value {
    Value::String(value.to_string())
}

pub fn arg_amount(value: Amount) -> Value {
    Value::String(value.base_units().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> ModuleConfig {
        ModuleConfig::new("0xcafe".parse().unwrap(), "mock_crowfunding")
    }

    #[test]
    fn function_ids_are_fully_qualified() {
        let id = module().function(EntryPoint::AssignTask);
        assert_eq!(
            id.to_string(),
            "0x000000000000000000000000000000000000000000000000000000000000cafe::mock_crowfunding::assign_task"
        );
    }

    #[test]
    fn renamed_entry_points_resolve() {
        let mut m = module();
        m.rename(EntryPoint::GetCrowdFunding, "total_raised");
        let id = m.function(EntryPoint::GetCrowdFunding);
        assert_eq!(id.name, "total_raised");
        assert_eq!(m.resolve(&id.to_string()), Some(EntryPoint::GetCrowdFunding));
        assert_eq!(m.resolve("0x1::coin::decimals"), None);
    }

    #[test]
    fn env_keys_follow_default_names() {
        assert_eq!(EntryPoint::DepositFunding.env_key(), "FN_DEPOSIT_FUNDING");
        assert!(EntryPoint::GetTask.is_view());
        assert!(!EntryPoint::StartTask.is_view());
    }

    #[test]
    fn task_arguments_follow_the_configured_shape() {
        let key = TaskKey::new(4, 2);
        assert_eq!(TaskArgs::default().encode(key), vec![Value::from("2")]);
        assert_eq!(
            TaskArgs::ProjectAndTask.encode(key),
            vec![Value::from("4"), Value::from("2")]
        );
        assert_eq!("project_task".parse::<TaskArgs>().unwrap(), TaskArgs::ProjectAndTask);
        assert!("both".parse::<TaskArgs>().is_err());
    }

    #[test]
    fn payload_serialises_in_ledger_dialect() {
        let id = module().function(EntryPoint::ContributeFunding);
        let payload = EntryFunctionPayload::new(
            &id,
            vec![arg_u64(1), arg_amount(Amount::from_base_units(500))],
            vec!["0x1::aptos_coin::AptosCoin".into()],
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "entry_function_payload");
        assert_eq!(json["arguments"], serde_json::json!(["1", "500"]));
        assert_eq!(json["type_arguments"][0], "0x1::aptos_coin::AptosCoin");
    }
}
