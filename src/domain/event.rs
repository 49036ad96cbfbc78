use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bill,
    Vendor,
    Approval,
    Payment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bill => "bill",
            Self::Vendor => "vendor",
            Self::Approval => "approval",
            Self::Payment => "payment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Matched,
    Submitted,
    AutoApproved,
    Decided,
    Approved,
    Rejected,
    Escalated,
    Scheduled,
    Accepted,
    Completed,
    Failed,
    Reconciled,
    Paid,
    Overdue,
    Disputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl AuditAction {
    /// Money movement is high risk, approval activity medium, record
    /// keeping low.
    pub fn risk(&self) -> RiskLevel {
        match self {
            Self::Scheduled
            | Self::Accepted
            | Self::Completed
            | Self::Failed
            | Self::Reconciled
            | Self::Paid => RiskLevel::High,
            Self::Submitted
            | Self::AutoApproved
            | Self::Decided
            | Self::Approved
            | Self::Rejected
            | Self::Escalated
            | Self::Overdue
            | Self::Disputed => RiskLevel::Medium,
            Self::Created | Self::Matched => RiskLevel::Low,
        }
    }
}

/// A single audit-trail entry. Events are emitted fire-and-forget from the
/// orchestrator; a lost event never fails the operation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub entity: EntityKind,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub risk: RiskLevel,
    pub at: DateTime<Utc>,
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(
        entity: EntityKind,
        entity_id: impl fmt::Display,
        action: AuditAction,
        actor: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            entity_id: entity_id.to_string(),
            action,
            actor: actor.into(),
            risk: action.risk(),
            at,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
