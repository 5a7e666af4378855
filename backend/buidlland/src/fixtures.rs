//! Fixture ledger for demo mode.
//!
//! Serves a static, versioned data set through the same [`Ledger`] seam as
//! the live node, answering view calls in the module's own JSON encoding.
//! Transactions are applied in memory so a demo can walk a task through its
//! states. The checks below are a stand-in for the module's, enough to show
//! an aborted transaction; live mode never consults them. A failed check
//! commits as an abort rather than erroring at submission.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::address::AccountAddress;
use crate::amount::Amount;
use crate::entry::{EntryPoint, ModuleConfig, TaskArgs, ViewRequest, COIN_DECIMALS_FUNCTION};
use crate::errors::LedgerError;
use crate::ledger::{Ledger, PendingTransaction, SignedTransaction, TxStatus};
use crate::model::{
    FundingInfo, Project, ProjectMetadata, ProjectStatus, Task, TaskKey, TaskStatus,
};

/// Bumped whenever the data below changes shape or content.
pub const FIXTURE_VERSION: &str = "2";

/// Decimal count the fixture coin declares.
pub const FIXTURE_DECIMALS: u8 = 8;

const DAY: i64 = 24 * 60 * 60;
const UNIT: u128 = 100_000_000;

const CREATOR: &str = "0x16d49c978c2a3061647dd0e027999fe7e6425c8c";
const PAYMENT_TOKEN: &str = "0x3856eee08189d63c9dbd1d415789566cc87357f5";

// Abort codes of the crowdfunding module.
const E_PROJECT_NOT_FOUND: (&str, u64) = ("E_PROJECT_NOT_FOUND", 1);
const E_FUNDING_CLOSED: (&str, u64) = ("E_FUNDING_CLOSED", 2);
const E_ZERO_AMOUNT: (&str, u64) = ("E_ZERO_AMOUNT", 3);
const E_TASK_NOT_FOUND: (&str, u64) = ("E_TASK_NOT_FOUND", 4);
const E_INVALID_TASK_STATE: (&str, u64) = ("E_INVALID_TASK_STATE", 5);
const E_NOT_ASSIGNEE: (&str, u64) = ("E_NOT_ASSIGNEE", 6);

fn addr(hex: &str) -> AccountAddress {
    hex.parse().unwrap_or(AccountAddress::ZERO)
}

fn units(whole: u128, tenths: u128) -> Amount {
    Amount::from_base_units(whole * UNIT + tenths * UNIT / 10)
}

// ─────────────────────────────────────────────────────────
// Data set
// ─────────────────────────────────────────────────────────

struct ProjectSeed {
    title: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    evaluation: &'static str,
    market_score: u8,
    feasibility: &'static str,
    valuation: (u64, u64),
    status: ProjectStatus,
    created_days_ago: i64,
    updated_days_ago: i64,
    goal: u128,
    raised: u128,
    /// Funding window relative to now, in days.
    window: (i64, i64),
}

const PROJECTS: [ProjectSeed; 5] = [
    ProjectSeed {
        title: "SocioShield",
        description: "SocioShield is a Decentralized Science (DeSci) initiative designed to enhance \
            transparency and collaboration in social sciences. Researchers securely share and \
            verify social science data such as survey results and behavioral studies while \
            keeping data integrity and traceability.",
        tags: &["Web3", "DeSci", "AI", "DAO", "Token", "Community", "DeFAI", "Social Sciences", "Data Sharing", "Transparency"],
        evaluation: "SocioShield is an innovative DeSci project that provides transparency and secure \
            collaboration solutions for the social sciences field through blockchain technology.",
        market_score: 7,
        feasibility: "B",
        valuation: (500_000, 2_000_000),
        status: ProjectStatus::Funding,
        created_days_ago: 15,
        updated_days_ago: 2,
        goal: 300_000,
        raised: 180_000,
        window: (-15, 15),
    },
    ProjectSeed {
        title: "GenomeGuard",
        description: "GenomeGuard is a Decentralized Science (DeSci) initiative focused on data \
            privacy and collaboration in genomics. Zero-knowledge proofs let researchers share \
            and verify sensitive genomic data without revealing the raw sequences.",
        tags: &["Web3", "DeSci", "AI", "DAO", "Token", "Community", "DeFAI", "ZK", "Life Sciences", "Genomics"],
        evaluation: "GenomeGuard is an innovative DeSci project that provides privacy protection and \
            secure collaboration solutions for the life sciences field through zero-knowledge proof \
            technology.",
        market_score: 8,
        feasibility: "A",
        valuation: (1_000_000, 3_000_000),
        status: ProjectStatus::Funding,
        created_days_ago: 20,
        updated_days_ago: 5,
        goal: 500_000,
        raised: 250_000,
        window: (-20, 10),
    },
    ProjectSeed {
        title: "PhishZap",
        description: "PhishZap protects Web3 users from phishing attacks. An AI-powered agent \
            integrates with popular wallets and continuously monitors wallet activity.",
        tags: &["Web3", "AI", "Token", "Community", "DeFi", "DeFAI", "NFT", "Phishing Protection", "Wallet Security", "Real-Time"],
        evaluation: "PhishZap leverages AI and Web3 trends to combat phishing, offering a scalable, \
            user-friendly security solution with strong market potential.",
        market_score: 9,
        feasibility: "A",
        valuation: (2_000_000, 5_000_000),
        status: ProjectStatus::Funding,
        created_days_ago: 10,
        updated_days_ago: 1,
        goal: 1_000_000,
        raised: 650_000,
        window: (-10, 50),
    },
    ProjectSeed {
        title: "DeFi Pulse Aggregator",
        description: "A comprehensive DeFi analytics platform that aggregates data from multiple \
            protocols to provide insights into yield opportunities, risks, and market trends.",
        tags: &["DeFi", "Analytics", "Yield Farming", "Data", "Risk Assessment"],
        evaluation: "DeFi Pulse Aggregator addresses a critical need for better data analytics in \
            the DeFi space, with strong potential for user adoption.",
        market_score: 8,
        feasibility: "B+",
        valuation: (800_000, 2_500_000),
        status: ProjectStatus::InProgress,
        created_days_ago: 30,
        updated_days_ago: 8,
        goal: 400_000,
        raised: 400_000,
        window: (-30, -5),
    },
    ProjectSeed {
        title: "NFT Governance Framework",
        description: "A governance framework that uses NFTs to represent voting power and \
            participation in decentralized organizations, with weighted influence based on \
            contribution history.",
        tags: &["DAO", "Governance", "NFT", "Voting", "Community"],
        evaluation: "This NFT-based governance approach brings innovation to DAO structures by \
            providing more nuanced representation of member contributions.",
        market_score: 7,
        feasibility: "B",
        valuation: (600_000, 1_800_000),
        status: ProjectStatus::Funding,
        created_days_ago: 25,
        updated_days_ago: 3,
        goal: 700_000,
        raised: 350_000,
        window: (-25, 5),
    },
];

struct TaskSeed {
    key: (u64, u64),
    title: &'static str,
    description: &'static str,
    /// Whole units and tenths.
    reward: (u128, u128),
    deadline_in_days: i64,
    status: TaskStatus,
    skills: &'static [&'static str],
    hours: u32,
    assignee: &'static str,
    created_days_ago: i64,
    completed_days_ago: Option<i64>,
}

const NOBODY: &str = "0x0";

const TASKS: [TaskSeed; 15] = [
    TaskSeed {
        key: (1, 1),
        title: "Develop Data Validation Smart Contract",
        description: "Smart contracts that validate and store social science research data, with \
            integrity checks, researcher identity verification and sharing permissions.",
        reward: (3, 0),
        deadline_in_days: 14,
        status: TaskStatus::Open,
        skills: &["Move", "Smart Contracts", "Data Validation", "Permission Management"],
        hours: 80,
        assignee: NOBODY,
        created_days_ago: 5,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (1, 2),
        title: "Develop User Interface",
        description: "Researcher registration, data upload, validation flow and data browsing, \
            with visualization of research data.",
        reward: (2, 5),
        deadline_in_days: 21,
        status: TaskStatus::Assigned,
        skills: &["React", "Frontend Development", "Data Visualization", "Web3"],
        hours: 60,
        assignee: "0x7890123456789012345678901234567890123456",
        created_days_ago: 8,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (1, 3),
        title: "AI Data Analysis Module Development",
        description: "Automatically analyze uploaded research data, generate insights and flag \
            potential biases or anomalies.",
        reward: (4, 0),
        deadline_in_days: 30,
        status: TaskStatus::Open,
        skills: &["Machine Learning", "Data Analysis", "Python", "Statistics"],
        hours: 100,
        assignee: NOBODY,
        created_days_ago: 3,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (2, 1),
        title: "Zero-Knowledge Proof Implementation",
        description: "Circuits and verifier that prove properties of gene sequences without \
            revealing the underlying data.",
        reward: (5, 0),
        deadline_in_days: 25,
        status: TaskStatus::InProgress,
        skills: &["Zero-Knowledge Proofs", "Cryptography", "Circom", "Move"],
        hours: 120,
        assignee: "0x8901234567890123456789012345678901234567",
        created_days_ago: 15,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (2, 2),
        title: "Genetic Data Storage System",
        description: "Distributed storage with encryption at rest and access control for \
            authorized researchers.",
        reward: (3, 5),
        deadline_in_days: 18,
        status: TaskStatus::Open,
        skills: &["Distributed Storage", "Encryption", "Databases", "IPFS"],
        hours: 90,
        assignee: NOBODY,
        created_days_ago: 10,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (2, 3),
        title: "Researcher Access Control System",
        description: "Fine-grained permissions by identity, research permit and access level, \
            with temporary grants, audit records and revocation.",
        reward: (3, 0),
        deadline_in_days: 20,
        status: TaskStatus::Assigned,
        skills: &["Access Control", "Authentication", "Security", "Auditing"],
        hours: 70,
        assignee: "0x9012345678901234567890123456789012345678",
        created_days_ago: 8,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (3, 1),
        title: "Wallet Activity Monitoring Module",
        description: "Detect suspicious transactions and contract interactions in real time and \
            alert on risky counterparties.",
        reward: (4, 5),
        deadline_in_days: 15,
        status: TaskStatus::Open,
        skills: &["Blockchain Analysis", "Security", "Transaction Monitoring", "Risk Assessment"],
        hours: 85,
        assignee: NOBODY,
        created_days_ago: 5,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (3, 2),
        title: "NLP Phishing Message Detector",
        description: "Classify suspicious Discord, Telegram and email messages, spotting phishing \
            links and fake airdrop claims.",
        reward: (3, 0),
        deadline_in_days: 20,
        status: TaskStatus::InProgress,
        skills: &["NLP", "Machine Learning", "Text Analysis", "Security"],
        hours: 75,
        assignee: "0xa123456789012345678901234567890123456789",
        created_days_ago: 12,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (3, 3),
        title: "Browser Extension Integration",
        description: "Real-time site analysis, phishing link blocking and transaction \
            confirmation inside a browser extension.",
        reward: (2, 5),
        deadline_in_days: 18,
        status: TaskStatus::Assigned,
        skills: &["Browser Extensions", "JavaScript", "Web Security", "UI/UX"],
        hours: 60,
        assignee: "0xb234567890123456789012345678901234567890",
        created_days_ago: 7,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (4, 1),
        title: "Multi-Protocol Data Scraper",
        description: "Collect and normalize data from major DeFi platforms, adapting to API \
            changes and network interruptions.",
        reward: (3, 5),
        deadline_in_days: 10,
        status: TaskStatus::Verified,
        skills: &["API Integration", "Data Scraping", "DeFi Protocols", "Node.js"],
        hours: 80,
        assignee: "0xc345678901234567890123456789012345678901",
        created_days_ago: 20,
        completed_days_ago: Some(2),
    },
    TaskSeed {
        key: (4, 2),
        title: "Yield Optimization Algorithm",
        description: "Rank yield opportunities across platforms by rate, risk score, historical \
            volatility and gas cost.",
        reward: (4, 0),
        deadline_in_days: 15,
        status: TaskStatus::InProgress,
        skills: &["Algorithm Design", "Financial Modeling", "DeFi", "Optimization"],
        hours: 90,
        assignee: "0xd456789012345678901234567890123456789012",
        created_days_ago: 15,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (4, 3),
        title: "Risk Assessment Dashboard",
        description: "Visualize contract risk, protocol incident history and liquidity \
            indicators per strategy.",
        reward: (3, 0),
        deadline_in_days: 12,
        status: TaskStatus::Completed,
        skills: &["Data Visualization", "Risk Analysis", "Frontend Development", "UI Design"],
        hours: 70,
        assignee: "0xe567890123456789012345678901234567890123",
        created_days_ago: 10,
        completed_days_ago: Some(1),
    },
    TaskSeed {
        key: (5, 1),
        title: "NFT Voting Weight System",
        description: "Governance weight from contribution history, holding period and \
            participation, resistant to capture.",
        reward: (4, 0),
        deadline_in_days: 20,
        status: TaskStatus::Open,
        skills: &["NFT", "Governance Mechanisms", "Move", "Voting Systems"],
        hours: 85,
        assignee: NOBODY,
        created_days_ago: 6,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (5, 2),
        title: "Contribution Tracking Mechanism",
        description: "Record and verify code, community, content and governance contributions \
            as the basis for NFT attributes.",
        reward: (3, 5),
        deadline_in_days: 25,
        status: TaskStatus::Open,
        skills: &["DAO Governance", "Contribution Measurement", "Data Analysis", "Web3"],
        hours: 75,
        assignee: NOBODY,
        created_days_ago: 5,
        completed_days_ago: None,
    },
    TaskSeed {
        key: (5, 3),
        title: "Governance Dashboard Development",
        description: "Submit proposals, vote, view results and track governance activity, on \
            desktop and mobile.",
        reward: (3, 0),
        deadline_in_days: 15,
        status: TaskStatus::Assigned,
        skills: &["React", "Frontend Development", "UI/UX", "Data Visualization"],
        hours: 70,
        assignee: "0xf678901234567890123456789012345678901234",
        created_days_ago: 8,
        completed_days_ago: None,
    },
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ─────────────────────────────────────────────────────────
// Ledger state
// ─────────────────────────────────────────────────────────

struct State {
    projects: BTreeMap<u64, Project>,
    funding: BTreeMap<u64, FundingInfo>,
    tasks: BTreeMap<TaskKey, Task>,
    pool: Amount,
    sequence_numbers: HashMap<AccountAddress, u64>,
    committed: HashMap<String, TxStatus>,
    next_version: u64,
}

impl State {
    fn seed(now: i64) -> Self {
        let mut projects = BTreeMap::new();
        let mut funding = BTreeMap::new();
        let mut pool = Amount::ZERO;

        for (idx, seed) in PROJECTS.iter().enumerate() {
            let id = idx as u64 + 1;
            projects.insert(
                id,
                Project {
                    id,
                    creator: addr(CREATOR),
                    title: seed.title.to_string(),
                    description: seed.description.to_string(),
                    tags: strings(seed.tags),
                    metadata: ProjectMetadata {
                        ai_evaluation: seed.evaluation.to_string(),
                        market_score: seed.market_score,
                        tech_feasibility: seed.feasibility.to_string(),
                        min_valuation: seed.valuation.0,
                        max_valuation: seed.valuation.1,
                    },
                    status: seed.status,
                    created_at: now - seed.created_days_ago * DAY,
                    updated_at: now - seed.updated_days_ago * DAY,
                },
            );
            let raised = units(seed.raised, 0);
            pool = pool.saturating_add(raised);
            funding.insert(
                id,
                FundingInfo {
                    funding_goal: units(seed.goal, 0),
                    raised_amount: raised,
                    start_time: now + seed.window.0 * DAY,
                    end_time: now + seed.window.1 * DAY,
                    has_met_funding_goal: seed.raised >= seed.goal,
                    payment_token: addr(PAYMENT_TOKEN),
                },
            );
        }

        let tasks = TASKS
            .iter()
            .map(|seed| {
                let key = TaskKey::new(seed.key.0, seed.key.1);
                let task = Task {
                    key,
                    title: seed.title.to_string(),
                    description: seed.description.to_string(),
                    reward: units(seed.reward.0, seed.reward.1),
                    deadline: now + seed.deadline_in_days * DAY,
                    status: seed.status,
                    required_skills: strings(seed.skills),
                    estimated_hours: seed.hours,
                    assignee: addr(seed.assignee),
                    created_at: now - seed.created_days_ago * DAY,
                    completed_at: seed.completed_days_ago.map_or(0, |d| now - d * DAY),
                };
                (key, task)
            })
            .collect();

        Self {
            projects,
            funding,
            tasks,
            pool,
            sequence_numbers: HashMap::new(),
            committed: HashMap::new(),
            next_version: 1,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Wire encoding (the module's view return shapes)
// ─────────────────────────────────────────────────────────

fn some(value: Value) -> Value {
    json!({ "vec": [value] })
}

fn none() -> Value {
    json!({ "vec": [] })
}

fn project_json(p: &Project) -> Value {
    json!({
        "id": p.id.to_string(),
        "creator": p.creator.to_hex_literal(),
        "title": p.title,
        "description": p.description,
        "tags": p.tags,
        "metadata": {
            "ai_evaluation": p.metadata.ai_evaluation,
            "market_score": p.metadata.market_score,
            "tech_feasibility": p.metadata.tech_feasibility,
            "min_valuation": p.metadata.min_valuation.to_string(),
            "max_valuation": p.metadata.max_valuation.to_string(),
        },
        "status": p.status.code(),
        "created_at": p.created_at.to_string(),
        "updated_at": p.updated_at.to_string(),
    })
}

fn funding_json(f: &FundingInfo) -> Value {
    json!({
        "funding_goal": f.funding_goal.base_units().to_string(),
        "raised_amount": f.raised_amount.base_units().to_string(),
        "start_time": f.start_time.to_string(),
        "end_time": f.end_time.to_string(),
        "has_met_funding_goal": f.has_met_funding_goal,
        "payment_token": f.payment_token.to_hex_literal(),
    })
}

fn task_json(t: &Task) -> Value {
    json!({
        "id": t.key.task_id.to_string(),
        "project_id": t.key.project_id.to_string(),
        "title": t.title,
        "description": t.description,
        "reward": t.reward.base_units().to_string(),
        "deadline": t.deadline.to_string(),
        "status": t.status.code(),
        "required_skills": t.required_skills,
        "estimated_hours": t.estimated_hours.to_string(),
        "assignee": t.assignee.to_hex_literal(),
        "created_at": t.created_at.to_string(),
        "completed_at": t.completed_at.to_string(),
    })
}

fn invalid_input(message: String) -> LedgerError {
    LedgerError::Rejected {
        code: "invalid_input".to_string(),
        message,
    }
}

fn u64_arg(args: &[Value], idx: usize) -> Result<u64, LedgerError> {
    args.get(idx)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_input(format!("argument {idx} is not a u64 string")))
}

fn amount_arg(args: &[Value], idx: usize) -> Result<Amount, LedgerError> {
    args.get(idx)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u128>().ok())
        .map(Amount::from_base_units)
        .ok_or_else(|| invalid_input(format!("argument {idx} is not an amount")))
}

fn key_args(args: &[Value]) -> Result<TaskKey, LedgerError> {
    Ok(TaskKey::new(u64_arg(args, 0)?, u64_arg(args, 1)?))
}

/// Task arguments of the entry functions and `get_task_state`. Fixture tasks
/// are numbered per project, so a bare task id cannot name one.
fn task_args(shape: TaskArgs, args: &[Value]) -> Result<TaskKey, LedgerError> {
    match shape {
        TaskArgs::ProjectAndTask => key_args(args),
        TaskArgs::TaskId => Err(invalid_input(
            "fixture tasks are numbered per project; set TASK_ARGS=project_task".to_string(),
        )),
    }
}

/// A decoded entry-function call.
#[derive(Debug, Clone, Copy)]
enum Call {
    Contribute { project_id: u64, amount: Amount },
    Deposit { amount: Amount },
    Assign(TaskKey),
    Start(TaskKey),
    Complete(TaskKey),
}

impl Call {
    fn parse(entry: EntryPoint, shape: TaskArgs, args: &[Value]) -> Result<Self, LedgerError> {
        Ok(match entry {
            EntryPoint::ContributeFunding => Call::Contribute {
                project_id: u64_arg(args, 0)?,
                amount: amount_arg(args, 1)?,
            },
            EntryPoint::DepositFunding => Call::Deposit {
                amount: amount_arg(args, 0)?,
            },
            EntryPoint::AssignTask => Call::Assign(task_args(shape, args)?),
            EntryPoint::StartTask => Call::Start(task_args(shape, args)?),
            EntryPoint::CompleteTask => Call::Complete(task_args(shape, args)?),
            view => {
                return Err(invalid_input(format!(
                    "{} is a view function, not an entry function",
                    view.default_name()
                )))
            }
        })
    }
}

// ─────────────────────────────────────────────────────────
// FixtureLedger
// ─────────────────────────────────────────────────────────

pub struct FixtureLedger {
    module: ModuleConfig,
    anchor: DateTime<Utc>,
    started: Instant,
    state: Mutex<State>,
    stalled: AtomicBool,
}

impl FixtureLedger {
    /// Seed the data set with timestamps relative to `now`.
    pub fn new(module: ModuleConfig, now: DateTime<Utc>) -> Self {
        info!(
            "Fixture ledger v{FIXTURE_VERSION}: {} projects, {} tasks",
            PROJECTS.len(),
            TASKS.len()
        );
        if module.task_args == TaskArgs::TaskId {
            warn!("Fixture tasks are numbered per project; task calls with a bare task id will be refused");
        }
        Self {
            module,
            anchor: now,
            started: Instant::now(),
            state: Mutex::new(State::seed(now.timestamp())),
            stalled: AtomicBool::new(false),
        }
    }

    /// While set, committed transactions keep reporting as pending.
    pub fn stall_confirmations(&self, stall: bool) {
        self.stalled.store(stall, Ordering::SeqCst);
    }

    /// Ledger time: the seeding instant plus wall time elapsed since.
    fn now(&self) -> i64 {
        self.anchor.timestamp() + self.started.elapsed().as_secs() as i64
    }

    fn abort(&self, (name, code): (&str, u64)) -> String {
        format!(
            "Move abort in {}::{}: {name}(0x{code:x})",
            self.module.address.to_hex_literal(),
            self.module.module
        )
    }

    /// Demo-only effects of one entry call.
    fn apply(
        &self,
        state: &mut State,
        sender: AccountAddress,
        call: Call,
    ) -> Result<(), (&'static str, u64)> {
        let now = self.now();
        match call {
            Call::Contribute { project_id, amount } => {
                if amount.is_zero() {
                    return Err(E_ZERO_AMOUNT);
                }
                let funding = state.funding.get_mut(&project_id).ok_or(E_PROJECT_NOT_FOUND)?;
                if now > funding.end_time {
                    return Err(E_FUNDING_CLOSED);
                }
                funding.raised_amount = funding.raised_amount.saturating_add(amount);
                funding.has_met_funding_goal = funding.raised_amount >= funding.funding_goal;
                state.pool = state.pool.saturating_add(amount);
            }
            Call::Deposit { amount } => {
                if amount.is_zero() {
                    return Err(E_ZERO_AMOUNT);
                }
                state.pool = state.pool.saturating_add(amount);
            }
            Call::Assign(key) => {
                let task = state.tasks.get_mut(&key).ok_or(E_TASK_NOT_FOUND)?;
                if task.status != TaskStatus::Open {
                    return Err(E_INVALID_TASK_STATE);
                }
                task.status = TaskStatus::Assigned;
                task.assignee = sender;
            }
            Call::Start(key) | Call::Complete(key) => {
                let task = state.tasks.get_mut(&key).ok_or(E_TASK_NOT_FOUND)?;
                if task.assignee != sender {
                    return Err(E_NOT_ASSIGNEE);
                }
                let next = match call {
                    Call::Start(_) => TaskStatus::InProgress,
                    _ => TaskStatus::Completed,
                };
                if !task.status.can_transition_to(next) {
                    return Err(E_INVALID_TASK_STATE);
                }
                task.status = next;
                if next == TaskStatus::Completed {
                    task.completed_at = now;
                }
            }
        }
        Ok(())
    }
}

impl Ledger for FixtureLedger {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, LedgerError> {
        if request.function == COIN_DECIMALS_FUNCTION {
            return Ok(vec![json!(FIXTURE_DECIMALS)]);
        }
        let entry = self
            .module
            .resolve(&request.function)
            .filter(|e| e.is_view())
            .ok_or_else(|| {
                LedgerError::NotFound(format!("view function {} not found", request.function))
            })?;

        let args = &request.arguments;
        let state = self.state.lock().await;
        let value = match entry {
            EntryPoint::GetTaskState => {
                let key = task_args(self.module.task_args, args)?;
                let task = state
                    .tasks
                    .get(&key)
                    .ok_or_else(|| LedgerError::NotFound(format!("task {key}")))?;
                json!(task.status.code())
            }
            EntryPoint::GetCrowdFunding => json!(state.pool.base_units().to_string()),
            EntryPoint::GetProject => state
                .projects
                .get(&u64_arg(args, 0)?)
                .map_or_else(none, |p| some(project_json(p))),
            EntryPoint::GetFundingInfo => state
                .funding
                .get(&u64_arg(args, 0)?)
                .map_or_else(none, |f| some(funding_json(f))),
            EntryPoint::GetTask => state
                .tasks
                .get(&key_args(args)?)
                .map_or_else(none, |t| some(task_json(t))),
            EntryPoint::GetProjectTaskIds => {
                let id = u64_arg(args, 0)?;
                if state.projects.contains_key(&id) {
                    let ids: Vec<String> = state
                        .tasks
                        .keys()
                        .filter(|k| k.project_id == id)
                        .map(|k| k.task_id.to_string())
                        .collect();
                    some(json!(ids))
                } else {
                    none()
                }
            }
            _ => unreachable!("filtered to views above"),
        };
        debug!("fixture view {:?} {:?}", entry, args);
        Ok(vec![value])
    }

    async fn sequence_number(&self, account: &AccountAddress) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.sequence_numbers.get(account).copied().unwrap_or(0))
    }

    async fn submit(&self, txn: &SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        let raw = &txn.raw;
        let entry = self.module.resolve(&raw.payload.function).ok_or_else(|| {
            invalid_input(format!("entry function {} not found", raw.payload.function))
        })?;
        let call = Call::parse(entry, self.module.task_args, &raw.payload.arguments)?;

        if raw.expiration_timestamp_secs <= Utc::now().timestamp().max(0) as u64 {
            return Err(LedgerError::Rejected {
                code: "vm_error".to_string(),
                message: "TRANSACTION_EXPIRED".to_string(),
            });
        }

        let mut state = self.state.lock().await;
        let expected = state.sequence_numbers.get(&raw.sender).copied().unwrap_or(0);
        if raw.sequence_number != expected {
            let message = if raw.sequence_number < expected {
                "SEQUENCE_NUMBER_TOO_OLD"
            } else {
                "SEQUENCE_NUMBER_TOO_NEW"
            };
            return Err(LedgerError::Rejected {
                code: "vm_error".to_string(),
                message: message.to_string(),
            });
        }
        state.sequence_numbers.insert(raw.sender, expected + 1);

        let version = state.next_version;
        state.next_version += 1;
        let hash = format!("0x{version:064x}");

        let status = match self.apply(&mut state, raw.sender, call) {
            Ok(()) => TxStatus::Committed {
                version,
                success: true,
                vm_status: "Executed successfully".to_string(),
            },
            Err(abort) => TxStatus::Committed {
                version,
                success: false,
                vm_status: self.abort(abort),
            },
        };
        debug!("fixture committed {hash}: {status:?}");
        state.committed.insert(hash.clone(), status);
        Ok(PendingTransaction { hash })
    }

    async fn transaction_status(&self, hash: &str) -> Result<TxStatus, LedgerError> {
        let state = self.state.lock().await;
        Ok(match state.committed.get(hash) {
            Some(_) if self.stalled.load(Ordering::SeqCst) => TxStatus::Pending,
            Some(status) => status.clone(),
            None => TxStatus::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::entry::{arg_amount, arg_u64, EntryFunctionPayload};
    use crate::ledger::{RawTransaction, TransactionSignature};
    use crate::view::ViewAdapter;
    use crate::wallet::DEMO_ACCOUNT;

    fn module() -> ModuleConfig {
        ModuleConfig::new("0xcafe".parse().unwrap(), "mock_crowfunding")
            .with_task_args(TaskArgs::ProjectAndTask)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn fixture() -> std::sync::Arc<FixtureLedger> {
        std::sync::Arc::new(FixtureLedger::new(module(), now()))
    }

    fn signed(entry: EntryPoint, seq: u64, args: Vec<Value>) -> SignedTransaction {
        SignedTransaction {
            raw: RawTransaction {
                sender: DEMO_ACCOUNT,
                sequence_number: seq,
                max_gas_amount: 200_000,
                gas_unit_price: 100,
                expiration_timestamp_secs: Utc::now().timestamp() as u64 + 60,
                payload: EntryFunctionPayload::new(&module().function(entry), args, vec![]),
            },
            signature: TransactionSignature {
                kind: "ed25519_signature".into(),
                public_key: "0x00".into(),
                signature: "0x00".into(),
            },
        }
    }

    #[test]
    fn seed_addresses_parse() {
        let state = State::seed(0);
        assert!(state.projects.values().all(|p| !p.creator.is_zero()));
        assert!(state.funding.values().all(|f| !f.payment_token.is_zero()));
        let assigned = state
            .tasks
            .values()
            .filter(|t| t.status != TaskStatus::Open)
            .all(|t| !t.assignee.is_zero());
        assert!(assigned);
    }

    #[test]
    fn seed_matches_catalogue() {
        let state = State::seed(1_000_000_000);
        assert_eq!(state.projects.len(), 5);
        assert_eq!(state.tasks.len(), 15);
        assert_eq!(state.projects[&4].title, "DeFi Pulse Aggregator");
        assert!(state.funding[&4].has_met_funding_goal);
        assert_eq!(
            state.funding[&1].raised_amount.percent_of(state.funding[&1].funding_goal),
            60
        );
        assert_eq!(state.tasks[&TaskKey::new(1, 2)].reward, Amount::from_base_units(250_000_000));
    }

    #[tokio::test]
    async fn views_decode_through_the_live_schemas() {
        let views = ViewAdapter::new(fixture(), module());

        let project = views.project(3).await.unwrap();
        assert_eq!(project.title, "PhishZap");
        assert_eq!(project.metadata.market_score, 9);
        assert_eq!(project.created_at, now().timestamp() - 10 * DAY);

        let funding = views.funding_info(2).await.unwrap();
        assert_eq!(funding.raised_amount.percent_of(funding.funding_goal), 50);

        let task = views.task(TaskKey::new(4, 1)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Verified);
        assert_ne!(task.completed_at, 0);

        assert_eq!(views.project_task_ids(5).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(views.coin_decimals("0x1::aptos_coin::AptosCoin").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn unknown_ids_are_empty_options() {
        let views = ViewAdapter::new(fixture(), module());
        assert!(matches!(views.project(42).await, Err(crate::errors::DappError::NotFound(_))));
        assert!(matches!(
            views.task(TaskKey::new(1, 9)).await,
            Err(crate::errors::DappError::NotFound(_))
        ));
        assert!(matches!(
            views.project_task_ids(42).await,
            Err(crate::errors::DappError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn assignment_commits_and_moves_task_state() {
        let ledger = fixture();
        let pending = ledger
            .submit(&signed(EntryPoint::AssignTask, 0, vec![arg_u64(1), arg_u64(1)]))
            .await
            .unwrap();
        assert!(matches!(
            ledger.transaction_status(&pending.hash).await.unwrap(),
            TxStatus::Committed { success: true, .. }
        ));
        assert_eq!(ledger.sequence_number(&DEMO_ACCOUNT).await.unwrap(), 1);

        let views = ViewAdapter::new(ledger, module());
        let task = views.task(TaskKey::new(1, 1)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assignee, DEMO_ACCOUNT);
    }

    #[tokio::test]
    async fn bare_task_ids_are_refused() {
        let module = ModuleConfig::new("0xcafe".parse().unwrap(), "mock_crowfunding");
        let ledger = FixtureLedger::new(module, now());
        let txn = signed(EntryPoint::AssignTask, 0, vec![arg_u64(1)]);
        let err = ledger.submit(&txn).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == "invalid_input"));
        assert_eq!(ledger.sequence_number(&DEMO_ACCOUNT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_precondition_commits_as_abort() {
        let ledger = fixture();
        // 1-2 is already assigned to someone else.
        let pending = ledger
            .submit(&signed(EntryPoint::StartTask, 0, vec![arg_u64(1), arg_u64(2)]))
            .await
            .unwrap();
        match ledger.transaction_status(&pending.hash).await.unwrap() {
            TxStatus::Committed {
                success, vm_status, ..
            } => {
                assert!(!success);
                assert!(vm_status.contains("E_NOT_ASSIGNEE"));
            }
            other => panic!("unexpected {other:?}"),
        }
        // The sequence number is consumed either way.
        assert_eq!(ledger.sequence_number(&DEMO_ACCOUNT).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_sequence_number_is_refused() {
        let ledger = fixture();
        let txn = signed(EntryPoint::DepositFunding, 0, vec![arg_amount(units(1, 0))]);
        ledger.submit(&txn).await.unwrap();
        let err = ledger.submit(&txn).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { message, .. } if message == "SEQUENCE_NUMBER_TOO_OLD"));
    }

    #[tokio::test]
    async fn contributions_grow_funding_and_pool() {
        let ledger = fixture();
        let views = ViewAdapter::new(ledger.clone(), module());
        let pool_before = views.crowd_funding().await.unwrap();

        ledger
            .submit(&signed(
                EntryPoint::ContributeFunding,
                0,
                vec![arg_u64(1), arg_amount(units(120_000, 0))],
            ))
            .await
            .unwrap();

        let funding = views.funding_info(1).await.unwrap();
        assert_eq!(funding.raised_amount, units(300_000, 0));
        assert!(funding.has_met_funding_goal);
        assert_eq!(
            views.crowd_funding().await.unwrap(),
            pool_before.saturating_add(units(120_000, 0))
        );
    }

    #[tokio::test]
    async fn closed_funding_rejects_contributions() {
        let ledger = fixture();
        let pending = ledger
            .submit(&signed(
                EntryPoint::ContributeFunding,
                0,
                vec![arg_u64(4), arg_amount(units(1, 0))],
            ))
            .await
            .unwrap();
        assert!(matches!(
            ledger.transaction_status(&pending.hash).await.unwrap(),
            TxStatus::Committed { success: false, vm_status, .. } if vm_status.contains("E_FUNDING_CLOSED")
        ));
    }

    #[tokio::test]
    async fn stalled_confirmations_stay_pending() {
        let ledger = fixture();
        ledger.stall_confirmations(true);
        let pending = ledger
            .submit(&signed(EntryPoint::DepositFunding, 0, vec![arg_amount(units(1, 0))]))
            .await
            .unwrap();
        assert_eq!(
            ledger.transaction_status(&pending.hash).await.unwrap(),
            TxStatus::Pending
        );
        assert_eq!(ledger.transaction_status("0xfeed").await.unwrap(), TxStatus::Unknown);
    }
}
