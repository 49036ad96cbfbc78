use crate::domain::bill::{Bill, BillId};
use crate::domain::money::{Amount, Currency};
use crate::domain::vendor::{PaymentMethod, PaymentMethodId, PaymentMethodKind, VendorId};
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type PaymentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic duplicate-suppression key: one live payment per
/// (bill, method) pair, however many times scheduling is retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(bill_id: BillId, method_id: PaymentMethodId) -> Self {
        Self(format!("{bill_id}:{method_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the atomic pending→processing claim in the store. The loser of
/// a concurrent race gets `AlreadyTaken` with the current record and must
/// not call the processor.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(Payment),
    AlreadyTaken(Payment),
}

/// What the processor said happened to the money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Funds moved; the payment is done.
    Completed,
    /// The provider took the order but settles later; reconciliation
    /// confirms the outcome.
    Accepted,
}

/// Authoritative settlement result supplied at reconciliation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorRequest {
    pub idempotency_token: String,
    pub amount: Amount,
    pub currency: Currency,
    pub vendor_name: String,
    pub method: PaymentMethod,
    pub bill_reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorReceipt {
    pub reference: String,
    pub status: ReceiptStatus,
    pub fee: Option<Amount>,
    pub estimated_delivery: Option<NaiveDate>,
}

/// One attempt series to move money for one bill through one method.
///
/// Completed and failed payments are immutable apart from the
/// reconciliation flag; retries re-arm the same record rather than create
/// a new one, so `attempts` counts the full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub vendor_id: Option<VendorId>,
    pub amount: Amount,
    pub currency: Currency,
    pub method_kind: PaymentMethodKind,
    pub method_id: PaymentMethodId,
    pub idempotency_key: IdempotencyKey,
    pub processor_reference: Option<String>,
    pub status: PaymentStatus,
    pub fee: Option<Amount>,
    pub scheduled_date: NaiveDate,
    pub processed_at: Option<DateTime<Utc>>,
    pub reconciled: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Captures the bill's current total; later bill edits never change
    /// what an already-scheduled payment will move.
    pub fn schedule(
        bill: &Bill,
        method: &PaymentMethod,
        scheduled_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bill_id: bill.id,
            vendor_id: bill.vendor_id,
            amount: bill.total_amount,
            currency: bill.currency.clone(),
            method_kind: method.kind,
            method_id: method.id,
            idempotency_key: IdempotencyKey::derive(bill.id, method.id),
            processor_reference: None,
            status: PaymentStatus::Pending,
            fee: None,
            scheduled_date,
            processed_at: None,
            reconciled: false,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A payment in one of these states suppresses a duplicate schedule for
    /// the same key.
    pub fn suppresses_duplicate(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Completed
        )
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Processing;
        self.updated_at = now;
    }

    /// Undoes a claim when the bill guard fails after the CAS won.
    pub fn revert_to_pending(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Pending;
        self.updated_at = now;
    }

    /// Provider took the order but settles later. The payment stays
    /// processing until reconciliation confirms the outcome.
    pub fn accept(&mut self, reference: String, fee: Option<Amount>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Processing;
        self.processor_reference = Some(reference);
        self.fee = fee;
        self.updated_at = now;
    }

    pub fn complete(&mut self, reference: String, fee: Option<Amount>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.processor_reference = Some(reference);
        self.fee = fee;
        self.processed_at = Some(now);
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.last_error = Some(error.into());
        self.attempts += 1;
        self.updated_at = now;
    }

    /// Leaves the payment in processing after a timeout: the money may or
    /// may not have moved, so neither completion nor failure is recorded
    /// and reconciliation decides. Attempts are not consumed.
    pub fn note_indeterminate(
        &mut self,
        reference: Option<String>,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        if reference.is_some() {
            self.processor_reference = reference;
        }
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    /// Re-arms a failed payment for another attempt, preserving the count.
    pub fn rearm(&mut self, scheduled_date: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        if self.status != PaymentStatus::Failed {
            return Err(EngineError::state_conflict(format!(
                "payment {} is {} and cannot be re-armed",
                self.id, self.status
            )));
        }
        self.status = PaymentStatus::Pending;
        self.scheduled_date = scheduled_date;
        self.updated_at = now;
        Ok(())
    }

    /// Applies the processor's authoritative settlement result to a
    /// processing payment and flags it reconciled.
    pub fn settle(&mut self, outcome: ReconcileStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status != PaymentStatus::Processing {
            return Err(EngineError::state_conflict(format!(
                "payment {} is {} and cannot be settled",
                self.id, self.status
            )));
        }
        match outcome {
            ReconcileStatus::Completed => {
                self.status = PaymentStatus::Completed;
                self.processed_at = Some(now);
                self.last_error = None;
            }
            ReconcileStatus::Failed => {
                self.status = PaymentStatus::Failed;
                self.attempts += 1;
                self.last_error = Some("reported failed at reconciliation".to_string());
            }
        }
        self.reconciled = true;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_reconciled(&mut self, now: DateTime<Utc>) {
        self.reconciled = true;
        self.updated_at = now;
    }
}
