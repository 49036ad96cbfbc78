use super::approval::{ApprovalId, ApprovalWorkflow, ApproverRole, BillApproval, WorkflowId};
use super::bill::{Bill, BillId};
use super::event::AuditEvent;
use super::extraction::{DocumentType, ExtractedFields};
use super::payment::{
    ClaimOutcome, IdempotencyKey, Payment, PaymentId, ProcessorReceipt, ProcessorRequest,
};
use super::vendor::{PaymentMethodKind, Vendor, VendorId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

pub type BillStoreRef = Arc<dyn BillStore>;
pub type VendorStoreRef = Arc<dyn VendorStore>;
pub type WorkflowStoreRef = Arc<dyn WorkflowStore>;
pub type ApprovalStoreRef = Arc<dyn ApprovalStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type ExtractionProviderRef = Arc<dyn ExtractionProvider>;
pub type AuthorizerRef = Arc<dyn Authorizer>;
pub type EventSinkRef = Arc<dyn EventSink>;

#[async_trait]
pub trait BillStore: Send + Sync {
    async fn insert(&self, bill: Bill) -> Result<()>;
    async fn get(&self, id: BillId) -> Result<Option<Bill>>;
    async fn update(&self, bill: Bill) -> Result<()>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>>;
    /// Open bills whose due date is strictly before `cutoff`, any user.
    async fn list_open_due_before(&self, cutoff: NaiveDate) -> Result<Vec<Bill>>;
}

#[async_trait]
pub trait VendorStore: Send + Sync {
    async fn insert(&self, vendor: Vendor) -> Result<()>;
    async fn get(&self, id: VendorId) -> Result<Option<Vendor>>;
    async fn update(&self, vendor: Vendor) -> Result<()>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Vendor>>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert(&self, workflow: ApprovalWorkflow) -> Result<()>;
    async fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ApprovalWorkflow>>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert(&self, approval: BillApproval) -> Result<()>;
    async fn get(&self, id: ApprovalId) -> Result<Option<BillApproval>>;
    /// The most recently created approval for the bill, active or not.
    async fn get_by_bill(&self, bill_id: BillId) -> Result<Option<BillApproval>>;
    /// Compare-and-set: persists `approval` (version bumped) only when the
    /// stored version still equals `expected_version`, failing
    /// `StateConflict` otherwise. Returns the stored copy.
    async fn update_versioned(
        &self,
        approval: BillApproval,
        expected_version: u64,
    ) -> Result<BillApproval>;
    async fn list_active(&self) -> Result<Vec<BillApproval>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails `StateConflict` when a payment with the same idempotency key
    /// already exists.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn update(&self, payment: Payment) -> Result<()>;
    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>>;
    /// Atomic pending→processing claim; the winner of a race gets
    /// `Claimed`, everyone else `AlreadyTaken` with the current record.
    async fn claim(&self, id: PaymentId) -> Result<ClaimOutcome>;
    async fn list_by_bill(&self, bill_id: BillId) -> Result<Vec<Payment>>;
}

/// Document-to-fields extraction. Implementations wrap whatever OCR or AI
/// service does the reading; the engine only sees scored fields.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    async fn extract(&self, document: &[u8], kind: DocumentType) -> Result<ExtractedFields>;
}

/// One payment-provider integration, keyed by the method kind it serves.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn kind(&self) -> PaymentMethodKind;
    async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt>;
}

/// Lookup table of processor adapters by method kind. New providers plug in
/// here; the dispatcher never names a concrete processor.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<PaymentMethodKind, Arc<dyn PaymentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn PaymentProcessor>) {
        self.processors.insert(processor.kind(), processor);
    }

    pub fn get(&self, kind: PaymentMethodKind) -> Option<Arc<dyn PaymentProcessor>> {
        self.processors.get(&kind).cloned()
    }
}

/// Answers whether an actor may decide on behalf of a role within a user's
/// organization.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(&self, actor: &str, role: ApproverRole, user_id: &str) -> bool;
}

/// Audit-trail consumer. Recording must never fail or block the operation
/// that produced the event.
pub trait EventSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}
