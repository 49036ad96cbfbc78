use crate::domain::approval::{
    ApprovalId, ApprovalOutcome, ApprovalWorkflow, ApproverRole, BillApproval, Decision,
    EscalationPolicy, StepKind, WorkflowStep,
};
use crate::domain::bill::{Bill, UserId};
use crate::domain::ports::{ApprovalStoreRef, AuthorizerRef, WorkflowStoreRef};
use crate::error::{EngineError, Result};
use crate::policy::EnginePolicy;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Name of the per-user workflow created when no configured workflow
/// matches a bill.
pub const DEFAULT_WORKFLOW_NAME: &str = "Default approval";

/// Runs bills through approval workflows.
///
/// Owns workflow selection, decision application and time-based escalation.
/// Decisions are persisted through the store's version check, so two racing
/// writers on the same approval can never both win.
pub struct ApprovalEngine {
    workflows: WorkflowStoreRef,
    approvals: ApprovalStoreRef,
    authorizer: AuthorizerRef,
    policy: Arc<EnginePolicy>,
}

impl ApprovalEngine {
    pub fn new(
        workflows: WorkflowStoreRef,
        approvals: ApprovalStoreRef,
        authorizer: AuthorizerRef,
        policy: Arc<EnginePolicy>,
    ) -> Self {
        Self {
            workflows,
            approvals,
            authorizer,
            policy,
        }
    }

    /// Materializes and persists the approval for a bill entering the
    /// approval stage. The returned approval may already be finalized when
    /// every step auto-resolved.
    pub async fn build(
        &self,
        bill: &Bill,
        low_confidence: bool,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> Result<BillApproval> {
        let workflow = match self.select_workflow(bill).await? {
            Some(workflow) => workflow,
            None => self.default_workflow(&bill.user_id, now).await?,
        };
        let approval =
            BillApproval::materialize(&workflow, bill, submitted_by, low_confidence, now)?;
        self.approvals.insert(approval.clone()).await?;
        Ok(approval)
    }

    /// Applies one decision to the approval's awaiting step.
    ///
    /// Checks run in order: the approval must be active, `step` must be the
    /// awaiting step, the actor must hold the step's currently-assigned
    /// role. The write goes through the version check; a concurrent writer
    /// that got there first turns this call into a `StateConflict`.
    pub async fn decide(
        &self,
        approval_id: ApprovalId,
        step: u32,
        actor: &str,
        decision: Decision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(BillApproval, ApprovalOutcome)> {
        let approval = self
            .approvals
            .get(approval_id)
            .await?
            .ok_or_else(|| EngineError::not_found("approval", approval_id))?;
        if !approval.status.is_active() {
            return Err(EngineError::state_conflict(format!(
                "approval {approval_id} is already finalized"
            )));
        }
        let awaiting = approval
            .awaiting_step()
            .ok_or_else(|| EngineError::state_conflict("approval has no awaiting step"))?;
        if step != awaiting.order {
            return Err(EngineError::NoPendingStep { step });
        }
        let role = awaiting
            .assigned_role
            .ok_or_else(|| EngineError::state_conflict("awaiting step has no assigned role"))?;
        if !self
            .authorizer
            .is_authorized(actor, role, &approval.user_id)
            .await
        {
            return Err(EngineError::not_authorized(actor, role.to_string()));
        }

        let expected_version = approval.version;
        let mut updated = approval;
        let outcome = updated.apply_decision(step, actor, decision, notes, now)?;
        let stored = self
            .approvals
            .update_versioned(updated, expected_version)
            .await?;
        Ok((stored, outcome))
    }

    /// Escalates every active approval whose awaiting step sat past its due
    /// date. An approval decided concurrently is skipped; the next sweep
    /// re-evaluates it.
    pub async fn escalate_due(&self, now: DateTime<Utc>) -> Result<Vec<BillApproval>> {
        let mut escalated = Vec::new();
        for approval in self.approvals.list_active().await? {
            let expected_version = approval.version;
            let mut candidate = approval;
            if candidate.escalate_if_due(now) {
                match self
                    .approvals
                    .update_versioned(candidate, expected_version)
                    .await
                {
                    Ok(stored) => escalated.push(stored),
                    Err(EngineError::StateConflict(_)) => {}
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(escalated)
    }

    async fn select_workflow(&self, bill: &Bill) -> Result<Option<ApprovalWorkflow>> {
        let workflows = self.workflows.list_by_user(&bill.user_id).await?;
        Ok(workflows
            .into_iter()
            .filter(|w| w.matches(bill.category, bill.total_amount))
            .max_by_key(|w| w.specificity()))
    }

    /// The lazily-created single-step fallback workflow, one per user.
    async fn default_workflow(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ApprovalWorkflow> {
        let existing = self
            .workflows
            .list_by_user(user_id)
            .await?
            .into_iter()
            .find(|w| w.name == DEFAULT_WORKFLOW_NAME);
        if let Some(workflow) = existing {
            return Ok(workflow);
        }

        let mut workflow = ApprovalWorkflow::new(
            user_id.clone(),
            DEFAULT_WORKFLOW_NAME,
            vec![WorkflowStep::new(
                1,
                "Manager review",
                StepKind::RoleApproval {
                    role: ApproverRole::Manager,
                },
            )],
            now,
        );
        workflow.escalation = EscalationPolicy {
            after_days: self.policy.escalation_after_days,
            fallback_role: ApproverRole::Owner,
        };
        self.workflows.insert(workflow.clone()).await?;
        Ok(workflow)
    }
}
