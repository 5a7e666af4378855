//! Entities read from the crowdfunding module.
//!
//! ## Status codes
//!
//! Both status enums travel as small integer codes. Codes outside the known range are
//! kept as `Unknown(code)` instead of failing the whole read, so a module
//! upgrade that adds a state still renders (as "Unknown").
//!
//! Task lifecycle, as enforced on-chain:
//!
//! ```text
//! Open ──► Assigned ──► InProgress ──► Completed ──► Verified
//!   │          │            │
//!   └──────────┴────────────┴──► Cancelled
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::AccountAddress;
use crate::amount::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    Draft,
    Funding,
    InProgress,
    Completed,
    Cancelled,
    Unknown(u64),
}

impl ProjectStatus {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Draft,
            1 => Self::Funding,
            2 => Self::InProgress,
            3 => Self::Completed,
            4 => Self::Cancelled,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u64 {
        match self {
            Self::Draft => 0,
            Self::Funding => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Funding => "Funding",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Unknown(_) => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Verified,
    Cancelled,
    Unknown(u64),
}

impl TaskStatus {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Open,
            1 => Self::Assigned,
            2 => Self::InProgress,
            3 => Self::Completed,
            4 => Self::Verified,
            5 => Self::Cancelled,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u64 {
        match self {
            Self::Open => 0,
            Self::Assigned => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
            Self::Verified => 4,
            Self::Cancelled => 5,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Verified => "Verified",
            Self::Cancelled => "Cancelled",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Whether the module accepts a move from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Open, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (Completed, Verified)
                | (Open | Assigned | InProgress, Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Off-chain evaluation attached to a project at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub ai_evaluation: String,
    pub market_score: u8,
    pub tech_feasibility: String,
    pub min_valuation: u64,
    pub max_valuation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub creator: AccountAddress,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub metadata: ProjectMetadata,
    pub status: ProjectStatus,
    /// Unix seconds.
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingInfo {
    pub funding_goal: Amount,
    pub raised_amount: Amount,
    pub start_time: i64,
    pub end_time: i64,
    pub has_met_funding_goal: bool,
    pub payment_token: AccountAddress,
}

/// Identity of a task: task ids are only unique within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub project_id: u64,
    pub task_id: u64,
}

impl TaskKey {
    pub fn new(project_id: u64, task_id: u64) -> Self {
        Self {
            project_id,
            task_id,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project_id, self.task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub key: TaskKey,
    pub title: String,
    pub description: String,
    pub reward: Amount,
    pub deadline: i64,
    pub status: TaskStatus,
    pub required_skills: Vec<String>,
    pub estimated_hours: u32,
    pub assignee: AccountAddress,
    pub created_at: i64,
    /// Zero until the assignee marks the task completed.
    pub completed_at: i64,
}

impl Task {
    pub fn is_assigned_to(&self, account: &AccountAddress) -> bool {
        !self.assignee.is_zero() && self.assignee == *account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_codes_round_trip_known_values() {
        for code in 0..=5u64 {
            let status = TaskStatus::from_code(code);
            assert!(!matches!(status, TaskStatus::Unknown(_)));
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn out_of_range_codes_fall_back_to_unknown() {
        assert_eq!(TaskStatus::from_code(6), TaskStatus::Unknown(6));
        assert_eq!(TaskStatus::from_code(255).label(), "Unknown");
        assert_eq!(TaskStatus::from_code(70_000), TaskStatus::Unknown(70_000));
        assert_eq!(ProjectStatus::from_code(9).label(), "Unknown");
        assert_eq!(ProjectStatus::from_code(9).code(), 9);
    }

    #[test]
    fn labels_match_pages() {
        assert_eq!(ProjectStatus::Funding.label(), "Funding");
        assert_eq!(ProjectStatus::InProgress.label(), "In Progress");
        assert_eq!(TaskStatus::Verified.to_string(), "Verified");
    }

    #[test]
    fn task_lifecycle_moves_forward_only() {
        use TaskStatus::*;
        assert!(Open.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Verified));
        assert!(Open.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));

        assert!(!Assigned.can_transition_to(Open));
        assert!(!Open.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Verified.can_transition_to(Cancelled));
        assert!(!Unknown(9).can_transition_to(Assigned));
    }

    #[test]
    fn zero_assignee_is_nobody() {
        let task = Task {
            key: TaskKey::new(1, 1),
            title: String::new(),
            description: String::new(),
            reward: Amount::ZERO,
            deadline: 0,
            status: TaskStatus::Open,
            required_skills: vec![],
            estimated_hours: 0,
            assignee: AccountAddress::ZERO,
            created_at: 0,
            completed_at: 0,
        };
        assert!(!task.is_assigned_to(&AccountAddress::ZERO));
    }
}
