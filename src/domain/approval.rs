use crate::domain::bill::{Bill, BillId, ExpenseCategory, UserId};
use crate::domain::money::Amount;
use crate::error::{EngineError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type ApprovalId = Uuid;

/// Actor recorded for decisions the engine makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    Owner,
    Manager,
    Finance,
    Executive,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Finance => "finance",
            Self::Executive => "executive",
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApproverRole {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "manager" => Ok(Self::Manager),
            "finance" => Ok(Self::Finance),
            "executive" => Ok(Self::Executive),
            other => Err(EngineError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// What a workflow step demands before it resolves.
///
/// The set is closed on purpose: a step either needs a human with a given
/// role, auto-resolves under an amount gate, or routes straight to the
/// escalation contact. Adding behavior means adding a variant here, not
/// interpreting strings at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    RoleApproval {
        role: ApproverRole,
    },
    AmountGate {
        limit: Amount,
        over_role: ApproverRole,
    },
    Escalation {
        fallback_role: ApproverRole,
    },
}

impl StepKind {
    /// The role that must decide this step for a bill of `total`, or `None`
    /// when the step resolves on its own.
    pub fn required_role(&self, total: Amount) -> Option<ApproverRole> {
        match self {
            Self::RoleApproval { role } => Some(*role),
            Self::AmountGate { limit, over_role } => {
                if total <= *limit {
                    None
                } else {
                    Some(*over_role)
                }
            }
            Self::Escalation { fallback_role } => Some(*fallback_role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub name: String,
    pub order: u32,
    pub kind: StepKind,
}

impl WorkflowStep {
    pub fn new(order: u32, name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            order,
            kind,
        }
    }
}

/// When a workflow applies to a bill. Empty category list means any
/// category; the amount threshold is a floor, not a ceiling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConditions {
    pub amount_threshold: Option<Amount>,
    pub vendor_categories: Vec<ExpenseCategory>,
    pub approver_roles: Vec<ApproverRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub after_days: i64,
    pub fallback_role: ApproverRole,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            after_days: 3,
            fallback_role: ApproverRole::Owner,
        }
    }
}

/// A reusable approval template. Never mutated on behalf of a single bill;
/// each submission materializes its own [`BillApproval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub id: WorkflowId,
    pub user_id: UserId,
    pub name: String,
    pub conditions: WorkflowConditions,
    pub steps: Vec<WorkflowStep>,
    pub escalation: EscalationPolicy,
    pub created_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    pub fn new(
        user_id: impl Into<UserId>,
        name: impl Into<String>,
        steps: Vec<WorkflowStep>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            conditions: WorkflowConditions::default(),
            steps,
            escalation: EscalationPolicy::default(),
            created_at: now,
        }
    }

    pub fn matches(&self, category: ExpenseCategory, total: Amount) -> bool {
        let category_ok = self.conditions.vendor_categories.is_empty()
            || self.conditions.vendor_categories.contains(&category);
        let amount_ok = match self.conditions.amount_threshold {
            Some(threshold) => total >= threshold,
            None => true,
        };
        category_ok && amount_ok
    }

    /// Ranking key for selection: the most specific matching workflow is
    /// the one with the highest amount threshold.
    pub fn specificity(&self) -> Amount {
        self.conditions.amount_threshold.unwrap_or(Amount::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    Pending,
    Approved,
    Rejected,
    Escalated,
}

impl StepStatus {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::Pending | Self::Escalated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub order: u32,
    pub name: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub assigned_role: Option<ApproverRole>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    AutoApproved,
    Approved,
    Rejected,
    Escalated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub step: u32,
    pub action: HistoryAction,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
}

impl ApprovalStatus {
    /// Escalated approvals are still live and decidable.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Escalated)
    }
}

/// How a decision moved the approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Advanced { next_step: u32 },
    FinalizedApproved,
    FinalizedRejected,
}

/// One bill's walk through a workflow.
///
/// Materialized from the template at submission time and never re-read from
/// it, so later workflow edits cannot alter in-flight approvals. Exactly one
/// step is awaiting decision while the approval is active. The record is
/// retained forever as the audit trail; `version` backs the store's
/// optimistic concurrency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillApproval {
    pub id: ApprovalId,
    pub bill_id: BillId,
    pub workflow_id: WorkflowId,
    pub user_id: UserId,
    pub bill_total: Amount,
    pub current_step: u32,
    pub total_steps: u32,
    pub status: ApprovalStatus,
    pub submitted_by: String,
    pub low_confidence: bool,
    pub steps: Vec<ApprovalStep>,
    pub history: Vec<DecisionRecord>,
    pub escalation: EscalationPolicy,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl BillApproval {
    /// Builds the approval for one bill and starts step 1. Auto-resolving
    /// steps cascade immediately, so the returned approval may already be
    /// finalized approved.
    pub fn materialize(
        workflow: &ApprovalWorkflow,
        bill: &Bill,
        submitted_by: impl Into<String>,
        low_confidence: bool,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if workflow.steps.is_empty() {
            return Err(EngineError::validation(format!(
                "workflow '{}' has no steps",
                workflow.name
            )));
        }
        let mut template: Vec<&WorkflowStep> = workflow.steps.iter().collect();
        template.sort_by_key(|s| s.order);

        let steps: Vec<ApprovalStep> = template
            .iter()
            .enumerate()
            .map(|(i, step)| ApprovalStep {
                order: i as u32 + 1,
                name: step.name.clone(),
                kind: step.kind.clone(),
                status: StepStatus::NotStarted,
                assigned_role: None,
                decided_by: None,
                decided_at: None,
                due_at: None,
            })
            .collect();

        let submitted_by = submitted_by.into();
        let total_steps = steps.len() as u32;
        let mut approval = Self {
            id: Uuid::new_v4(),
            bill_id: bill.id,
            workflow_id: workflow.id,
            user_id: bill.user_id.clone(),
            bill_total: bill.total_amount,
            current_step: 1,
            total_steps,
            status: ApprovalStatus::Pending,
            submitted_by: submitted_by.clone(),
            low_confidence,
            steps,
            history: Vec::new(),
            escalation: workflow.escalation,
            version: 0,
            created_at: now,
            finalized_at: None,
        };
        approval.push_history(now, submitted_by, 1, HistoryAction::Created, None);
        approval.activate(1, now);
        approval.auto_resolve(now);
        Ok(approval)
    }

    /// The unique step currently awaiting a decision, if the approval is
    /// still active.
    pub fn awaiting_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.status.is_awaiting())
    }

    /// Applies one human decision to the awaiting step.
    ///
    /// Role authorization is the caller's concern; this method enforces the
    /// ordering rules only. A decision against any other step fails
    /// `NoPendingStep`; a decision on a finalized approval fails
    /// `StateConflict`. Nothing is mutated on failure.
    pub fn apply_decision(
        &mut self,
        step: u32,
        actor: &str,
        decision: Decision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome> {
        if !self.status.is_active() {
            return Err(EngineError::state_conflict(format!(
                "approval {} is already finalized",
                self.id
            )));
        }
        let awaiting = self
            .awaiting_step()
            .map(|s| s.order)
            .ok_or_else(|| EngineError::state_conflict("approval has no awaiting step"))?;
        if step != awaiting {
            return Err(EngineError::NoPendingStep { step });
        }

        match decision {
            Decision::Reject => {
                self.record_decision(step, actor, StepStatus::Rejected, now);
                self.push_history(now, actor, step, HistoryAction::Rejected, notes);
                self.status = ApprovalStatus::Rejected;
                self.finalized_at = Some(now);
                Ok(ApprovalOutcome::FinalizedRejected)
            }
            Decision::Approve => {
                self.record_decision(step, actor, StepStatus::Approved, now);
                self.push_history(now, actor, step, HistoryAction::Approved, notes);
                self.advance_or_finalize(step, now);
                self.auto_resolve(now);
                if self.status == ApprovalStatus::Approved {
                    Ok(ApprovalOutcome::FinalizedApproved)
                } else {
                    Ok(ApprovalOutcome::Advanced {
                        next_step: self.current_step,
                    })
                }
            }
        }
    }

    /// Marks the awaiting step escalated and hands it to the fallback role.
    /// Returns whether anything changed; already-escalated steps are left
    /// alone so repeated sweeps stay idempotent.
    pub fn escalate_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let fallback = self.escalation.fallback_role;
        let Some(step) = self
            .steps
            .iter_mut()
            .find(|s| s.status == StepStatus::Pending)
        else {
            return false;
        };
        let Some(due_at) = step.due_at else {
            return false;
        };
        if due_at > now {
            return false;
        }
        let order = step.order;
        step.status = StepStatus::Escalated;
        step.assigned_role = Some(fallback);
        self.status = ApprovalStatus::Escalated;
        self.push_history(
            now,
            SYSTEM_ACTOR,
            order,
            HistoryAction::Escalated,
            Some(format!("reassigned to {fallback}")),
        );
        true
    }

    fn activate(&mut self, order: u32, now: DateTime<Utc>) {
        let role = self
            .step(order)
            .map(|s| s.kind.required_role(self.bill_total));
        let due_at = now + TimeDelta::days(self.escalation.after_days);
        if let Some(step) = self.step_mut(order) {
            step.status = StepStatus::Pending;
            step.assigned_role = role.flatten();
            step.due_at = Some(due_at);
        }
        self.current_step = order;
    }

    /// Resolves consecutive steps that need no human, recording the system
    /// actor for each.
    fn auto_resolve(&mut self, now: DateTime<Utc>) {
        while self.status.is_active() {
            let Some(order) = self
                .awaiting_step()
                .filter(|s| s.assigned_role.is_none())
                .map(|s| s.order)
            else {
                break;
            };
            self.record_decision(order, SYSTEM_ACTOR, StepStatus::Approved, now);
            self.push_history(now, SYSTEM_ACTOR, order, HistoryAction::AutoApproved, None);
            self.advance_or_finalize(order, now);
        }
    }

    fn advance_or_finalize(&mut self, decided: u32, now: DateTime<Utc>) {
        if decided >= self.total_steps {
            self.status = ApprovalStatus::Approved;
            self.finalized_at = Some(now);
        } else {
            // An escalated approval that keeps advancing is live again.
            self.status = ApprovalStatus::Pending;
            self.activate(decided + 1, now);
        }
    }

    fn record_decision(&mut self, order: u32, actor: &str, status: StepStatus, now: DateTime<Utc>) {
        if let Some(step) = self.step_mut(order) {
            step.status = status;
            step.decided_by = Some(actor.to_string());
            step.decided_at = Some(now);
        }
    }

    fn step(&self, order: u32) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.order == order)
    }

    fn step_mut(&mut self, order: u32) -> Option<&mut ApprovalStep> {
        self.steps.iter_mut().find(|s| s.order == order)
    }

    fn push_history(
        &mut self,
        at: DateTime<Utc>,
        actor: impl Into<String>,
        step: u32,
        action: HistoryAction,
        notes: Option<String>,
    ) {
        self.history.push(DecisionRecord {
            at,
            actor: actor.into(),
            step,
            action,
            notes,
        });
    }
}
