use crate::domain::extraction::DocumentType;
use crate::domain::money::{Amount, Currency};
use crate::domain::vendor::VendorId;
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type BillId = Uuid;
pub type UserId = String;

/// Lifecycle states of a bill.
///
/// The happy path is `Draft → Received → PendingApproval → Approved → Paid`
/// with `Received → Approved` as the auto-approval shortcut. `Overdue` is an
/// informational branch that never blocks the remaining lifecycle: a bill
/// marked overdue still accepts the transitions its pre-overdue state
/// accepted. `Rejected` and `Paid` are terminal; `Disputed` parks the bill
/// for human intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Draft,
    Received,
    PendingApproval,
    Approved,
    Paid,
    Overdue,
    Disputed,
    Rejected,
}

impl BillStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Rejected)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        use BillStatus::*;
        match self {
            Draft => matches!(next, Received | Overdue | Disputed),
            Received => matches!(next, PendingApproval | Approved | Overdue | Disputed),
            PendingApproval => matches!(next, Approved | Rejected | Overdue | Disputed),
            Approved => matches!(next, Paid | Overdue | Disputed),
            Overdue => matches!(next, PendingApproval | Approved | Rejected | Paid | Disputed),
            Paid | Rejected | Disputed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Received => "received",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Disputed => "disputed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Closed spending-category enumeration. Ambiguous input maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    OfficeSupplies,
    Software,
    Marketing,
    Utilities,
    ProfessionalServices,
    Travel,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfficeSupplies => "office_supplies",
            Self::Software => "software",
            Self::Marketing => "marketing",
            Self::Utilities => "utilities",
            Self::ProfessionalServices => "professional_services",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "office_supplies" => Ok(Self::OfficeSupplies),
            "software" => Ok(Self::Software),
            "marketing" => Ok(Self::Marketing),
            "utilities" => Ok(Self::Utilities),
            "professional_services" => Ok(Self::ProfessionalServices),
            "travel" => Ok(Self::Travel),
            "other" => Ok(Self::Other),
            other => Err(EngineError::validation(format!("unknown category: {other}"))),
        }
    }
}

/// How the bill's data was obtained from the source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub ocr_text: Option<String>,
    pub confidence: Option<f64>,
    pub document_type: Option<DocumentType>,
    pub source_file: Option<String>,
}

/// One financial obligation owed to a vendor.
///
/// Bills are created by the orchestrator, mutated by the approval engine and
/// the payment dispatcher through the guarded methods below, and never
/// hard-deleted. `total_amount` is always recomputed from its parts, never
/// assigned directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub user_id: UserId,
    pub vendor_id: Option<VendorId>,
    pub bill_number: String,
    pub invoice_number: Option<String>,
    pub amount: Amount,
    pub tax_amount: Amount,
    pub discount_amount: Amount,
    pub total_amount: Amount,
    pub currency: Currency,
    pub description: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub status: BillStatus,
    pub priority: BillPriority,
    pub category: ExpenseCategory,
    pub approval_required: bool,
    /// Set when the bill reaches `Approved`; preserved across an overdue
    /// marking so the bill remains payable.
    pub approved_at: Option<DateTime<Utc>>,
    pub extraction: ExtractionMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Creates a received bill with validated, consistent amounts.
    pub fn create(
        user_id: impl Into<UserId>,
        amount: Amount,
        tax_amount: Amount,
        discount_amount: Amount,
        currency: Currency,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let mut bill = Self {
            id,
            user_id: user_id.into(),
            vendor_id: None,
            bill_number: Self::number_for(id),
            invoice_number: None,
            amount,
            tax_amount,
            discount_amount,
            total_amount: Amount::ZERO,
            currency,
            description: None,
            issue_date,
            due_date,
            paid_date: None,
            status: BillStatus::Received,
            priority: BillPriority::Normal,
            category: ExpenseCategory::Other,
            approval_required: false,
            approved_at: None,
            extraction: ExtractionMeta::default(),
            created_at: now,
            updated_at: now,
        };
        bill.recompute_total()?;
        Ok(bill)
    }

    /// Creates an empty draft: the degraded path when extraction yields no
    /// usable data. The raw document stays attached for manual completion.
    pub fn draft(
        user_id: impl Into<UserId>,
        extraction: ExtractionMeta,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            user_id: user_id.into(),
            vendor_id: None,
            bill_number: Self::number_for(id),
            invoice_number: None,
            amount: Amount::ZERO,
            tax_amount: Amount::ZERO,
            discount_amount: Amount::ZERO,
            total_amount: Amount::ZERO,
            currency: Currency::default(),
            description: None,
            issue_date,
            due_date,
            paid_date: None,
            status: BillStatus::Draft,
            priority: BillPriority::Normal,
            category: ExpenseCategory::Other,
            approval_required: false,
            approved_at: None,
            extraction,
            created_at: now,
            updated_at: now,
        }
    }

    fn number_for(id: BillId) -> String {
        let short = id.simple().to_string();
        format!("BILL-{}", &short[..8].to_ascii_uppercase())
    }

    /// Replaces the monetary parts and recomputes the total.
    pub fn set_amounts(
        &mut self,
        amount: Amount,
        tax_amount: Amount,
        discount_amount: Amount,
    ) -> Result<()> {
        let previous = (self.amount, self.tax_amount, self.discount_amount);
        self.amount = amount;
        self.tax_amount = tax_amount;
        self.discount_amount = discount_amount;
        if let Err(err) = self.recompute_total() {
            (self.amount, self.tax_amount, self.discount_amount) = previous;
            return Err(err);
        }
        Ok(())
    }

    fn recompute_total(&mut self) -> Result<()> {
        self.total_amount = (self.amount + self.tax_amount)
            .checked_sub(self.discount_amount)
            .ok_or_else(|| EngineError::validation("discount exceeds amount plus tax"))?;
        Ok(())
    }

    fn transition(&mut self, next: BillStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::state_conflict(format!(
                "bill {} cannot move from {} to {}",
                self.bill_number, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Draft completed out-of-band and re-submitted into the pipeline.
    pub fn mark_received(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.vendor_id.is_none() || self.total_amount.is_zero() {
            return Err(EngineError::state_conflict(format!(
                "bill {} is not complete enough to submit",
                self.bill_number
            )));
        }
        self.transition(BillStatus::Received, now)
    }

    pub fn submit_for_approval(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BillStatus::PendingApproval, now)
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BillStatus::Approved, now)?;
        self.approved_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BillStatus::Rejected, now)
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_payable() {
            return Err(EngineError::state_conflict(format!(
                "bill {} is not approved for payment",
                self.bill_number
            )));
        }
        self.transition(BillStatus::Paid, now)?;
        self.paid_date = Some(now.date_naive());
        Ok(())
    }

    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BillStatus::Overdue, now)?;
        self.priority = BillPriority::Urgent;
        Ok(())
    }

    pub fn dispute(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BillStatus::Disputed, now)
    }

    /// Approved, or marked overdue after having been approved.
    pub fn is_payable(&self) -> bool {
        match self.status {
            BillStatus::Approved => true,
            BillStatus::Overdue => self.approved_at.is_some(),
            _ => false,
        }
    }

    /// Unpaid and still in play: candidate for the due-date sweep.
    pub fn is_open(&self) -> bool {
        !matches!(
            self.status,
            BillStatus::Paid | BillStatus::Rejected | BillStatus::Disputed
        )
    }
}
