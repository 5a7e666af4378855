//! View models for the project, funding and task pages.
//!
//! Pure functions of ledger entities, the coin display settings, the viewer
//! and the current time. Nothing here talks to the ledger.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::address::AccountAddress;
use crate::amount::{Amount, Decimals};
use crate::model::{FundingInfo, Project, Task, TaskStatus};

/// Skills listed on a task card before the "+N" overflow.
pub const SKILLS_SHOWN: usize = 3;

/// How amounts of the configured coin are rendered.
#[derive(Debug, Clone)]
pub struct CoinDisplay {
    pub symbol: String,
    pub decimals: Decimals,
}

impl CoinDisplay {
    pub fn format(&self, amount: Amount) -> String {
        self.decimals.format(amount)
    }
}

/// Whole days from `now` until `at`, truncated toward zero.
fn days_until(at: i64, now: DateTime<Utc>) -> i64 {
    match DateTime::<Utc>::from_timestamp(at, 0) {
        Some(at) => at.signed_duration_since(now).num_days(),
        None => 0,
    }
}

fn date(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|d| d.format("%Y-%m-%d").to_string())
}

// ─────────────────────────────────────────────────────────
// Funding
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FundingView {
    pub goal: String,
    pub raised: String,
    pub symbol: String,
    pub goal_units: Amount,
    pub raised_units: Amount,
    pub progress_percent: u8,
    /// Present while the funding window is still open.
    pub days_left: Option<i64>,
    pub end_time: i64,
    pub is_closed: bool,
    pub has_met_goal: bool,
    pub can_contribute: bool,
}

impl FundingView {
    pub fn build(info: &FundingInfo, coin: &CoinDisplay, now: DateTime<Utc>) -> Self {
        let is_closed = info.end_time < now.timestamp();
        let has_met_goal = info.has_met_funding_goal
            || (!info.funding_goal.is_zero() && info.raised_amount >= info.funding_goal);
        Self {
            goal: coin.format(info.funding_goal),
            raised: coin.format(info.raised_amount),
            symbol: coin.symbol.clone(),
            goal_units: info.funding_goal,
            raised_units: info.raised_amount,
            progress_percent: info.raised_amount.percent_of(info.funding_goal),
            days_left: (!is_closed).then(|| days_until(info.end_time, now)),
            end_time: info.end_time,
            is_closed,
            has_met_goal,
            can_contribute: !is_closed && !has_met_goal,
        }
    }
}

/// The aggregate crowd-funding pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolView {
    pub total: String,
    pub total_units: Amount,
    pub symbol: String,
}

impl PoolView {
    pub fn build(total: Amount, coin: &CoinDisplay) -> Self {
        Self {
            total: coin.format(total),
            total_units: total,
            symbol: coin.symbol.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPage {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub status: &'static str,
    pub tags: Vec<String>,
    pub market_score: u8,
    pub tech_feasibility: String,
    pub min_valuation: u64,
    pub max_valuation: u64,
    /// Whole days since the project was listed.
    pub age_days: i64,
    pub ai_evaluation: String,
    pub creator: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub funding: Option<FundingView>,
    pub task_count: usize,
}

impl ProjectPage {
    pub fn build(
        project: &Project,
        funding: Option<&FundingInfo>,
        task_count: usize,
        coin: &CoinDisplay,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            description: project.description.clone(),
            status: project.status.label(),
            tags: project.tags.clone(),
            market_score: project.metadata.market_score,
            tech_feasibility: project.metadata.tech_feasibility.clone(),
            min_valuation: project.metadata.min_valuation,
            max_valuation: project.metadata.max_valuation,
            age_days: -days_until(project.created_at, now),
            ai_evaluation: project.metadata.ai_evaluation.clone(),
            creator: project.creator.shorten(),
            created_at: project.created_at,
            updated_at: project.updated_at,
            funding: funding.map(|f| FundingView::build(f, coin, now)),
            task_count,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TaskCard {
    pub project_id: u64,
    pub task_id: u64,
    pub title: String,
    pub status: &'static str,
    pub reward: String,
    pub symbol: String,
    pub skills: Vec<String>,
    /// Skills beyond the first [`SKILLS_SHOWN`].
    pub more_skills: usize,
    pub estimated_hours: u32,
    pub days_left: i64,
}

impl TaskCard {
    pub fn build(task: &Task, coin: &CoinDisplay, now: DateTime<Utc>) -> Self {
        let skills = &task.required_skills;
        Self {
            project_id: task.key.project_id,
            task_id: task.key.task_id,
            title: task.title.clone(),
            status: task.status.label(),
            reward: coin.format(task.reward),
            symbol: coin.symbol.clone(),
            skills: skills.iter().take(SKILLS_SHOWN).cloned().collect(),
            more_skills: skills.len().saturating_sub(SKILLS_SHOWN),
            estimated_hours: task.estimated_hours,
            days_left: days_until(task.deadline, now),
        }
    }
}

/// Something the viewer may do on a task page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Apply,
    ConnectWallet,
    Start,
    Complete,
}

pub fn allowed_actions(task: &Task, viewer: Option<&AccountAddress>) -> Vec<Action> {
    let is_assignee = viewer.is_some_and(|v| task.is_assigned_to(v));
    match task.status {
        TaskStatus::Open if viewer.is_some() => vec![Action::Apply],
        TaskStatus::Open => vec![Action::ConnectWallet],
        TaskStatus::Assigned if is_assignee => vec![Action::Start],
        TaskStatus::InProgress if is_assignee => vec![Action::Complete],
        _ => vec![],
    }
}

pub fn status_message(task: &Task, viewer: Option<&AccountAddress>) -> String {
    let assignee = task.assignee.shorten();
    match task.status {
        TaskStatus::Open => "This task is open for applications.".to_string(),
        TaskStatus::Assigned => format!("This task has been assigned to {assignee}."),
        TaskStatus::InProgress => format!("{assignee} is currently working on this task."),
        TaskStatus::Completed => {
            format!("{assignee} has marked this task as completed. Awaiting verification.")
        }
        TaskStatus::Verified => {
            let base = format!(
                "This task has been verified and payment has been released to {assignee}."
            );
            if viewer.is_some_and(|v| task.is_assigned_to(v)) {
                format!("{base} Please check your wallet for the reward payment.")
            } else {
                base
            }
        }
        TaskStatus::Cancelled => "This task has been cancelled.".to_string(),
        TaskStatus::Unknown(_) => "Unknown status".to_string(),
    }
}

/// A task's live status, read without going through the task cache.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub status: &'static str,
    pub code: u64,
    /// The cached task disagreed and was dropped.
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub project_id: u64,
    pub task_id: u64,
    pub title: String,
    pub description: String,
    pub status: &'static str,
    pub status_message: String,
    pub reward: String,
    pub symbol: String,
    pub required_skills: Vec<String>,
    pub estimated_hours: u32,
    pub deadline: i64,
    pub deadline_passed: bool,
    /// Never negative.
    pub days_left: i64,
    pub assignee: String,
    pub created_at: i64,
    pub completed_on: Option<String>,
    pub reward_notice: Option<String>,
    pub actions: Vec<Action>,
}

impl TaskPage {
    pub fn build(
        task: &Task,
        viewer: Option<&AccountAddress>,
        coin: &CoinDisplay,
        now: DateTime<Utc>,
    ) -> Self {
        let reward = coin.format(task.reward);
        let reward_notice = (task.status == TaskStatus::Verified).then(|| {
            format!(
                "Task verified and reward of {reward} {} has been released",
                coin.symbol
            )
        });
        Self {
            project_id: task.key.project_id,
            task_id: task.key.task_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.label(),
            status_message: status_message(task, viewer),
            reward,
            symbol: coin.symbol.clone(),
            required_skills: task.required_skills.clone(),
            estimated_hours: task.estimated_hours,
            deadline: task.deadline,
            deadline_passed: task.deadline < now.timestamp(),
            days_left: days_until(task.deadline, now).max(0),
            assignee: task.assignee.shorten(),
            created_at: task.created_at,
            completed_on: (task.completed_at > 0).then(|| date(task.completed_at)).flatten(),
            reward_notice,
            actions: allowed_actions(task, viewer),
        }
    }
}
