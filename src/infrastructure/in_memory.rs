use crate::application::engine::EngineStores;
use crate::domain::approval::{ApprovalId, ApprovalWorkflow, BillApproval, WorkflowId};
use crate::domain::bill::{Bill, BillId};
use crate::domain::payment::{ClaimOutcome, IdempotencyKey, Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{ApprovalStore, BillStore, PaymentStore, VendorStore, WorkflowStore};
use crate::domain::vendor::{Vendor, VendorId};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bills.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access. Ideal for
/// tests and single-run batch processing where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryBillStore {
    bills: Arc<RwLock<HashMap<BillId, Bill>>>,
}

impl InMemoryBillStore {
    /// Creates a new, empty in-memory bill store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillStore for InMemoryBillStore {
    async fn insert(&self, bill: Bill) -> Result<()> {
        let mut bills = self.bills.write().await;
        bills.insert(bill.id, bill);
        Ok(())
    }

    async fn get(&self, id: BillId) -> Result<Option<Bill>> {
        let bills = self.bills.read().await;
        Ok(bills.get(&id).cloned())
    }

    async fn update(&self, bill: Bill) -> Result<()> {
        let mut bills = self.bills.write().await;
        bills.insert(bill.id, bill);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>> {
        let bills = self.bills.read().await;
        let mut found: Vec<Bill> = bills
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }

    async fn list_open_due_before(&self, cutoff: NaiveDate) -> Result<Vec<Bill>> {
        let bills = self.bills.read().await;
        let mut found: Vec<Bill> = bills
            .values()
            .filter(|b| b.is_open() && b.due_date < cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.due_date);
        Ok(found)
    }
}

/// A thread-safe in-memory store for vendors.
#[derive(Default, Clone)]
pub struct InMemoryVendorStore {
    vendors: Arc<RwLock<HashMap<VendorId, Vendor>>>,
}

impl InMemoryVendorStore {
    /// Creates a new, empty in-memory vendor store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VendorStore for InMemoryVendorStore {
    async fn insert(&self, vendor: Vendor) -> Result<()> {
        let mut vendors = self.vendors.write().await;
        vendors.insert(vendor.id, vendor);
        Ok(())
    }

    async fn get(&self, id: VendorId) -> Result<Option<Vendor>> {
        let vendors = self.vendors.read().await;
        Ok(vendors.get(&id).cloned())
    }

    async fn update(&self, vendor: Vendor) -> Result<()> {
        let mut vendors = self.vendors.write().await;
        vendors.insert(vendor.id, vendor);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Vendor>> {
        let vendors = self.vendors.read().await;
        let mut found: Vec<Vendor> = vendors
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(found)
    }
}

/// A thread-safe in-memory store for approval workflow definitions.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<WorkflowId, ApprovalWorkflow>>>,
}

impl InMemoryWorkflowStore {
    /// Creates a new, empty in-memory workflow store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, workflow: ApprovalWorkflow) -> Result<()> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ApprovalWorkflow>> {
        let workflows = self.workflows.read().await;
        let mut found: Vec<ApprovalWorkflow> = workflows
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|w| w.created_at);
        Ok(found)
    }
}

/// A thread-safe in-memory store for bill approvals.
///
/// The write lock doubles as the version fence: `update_versioned` checks
/// and bumps the optimistic version in one critical section, so of two
/// concurrent deciders exactly one commits.
#[derive(Default, Clone)]
pub struct InMemoryApprovalStore {
    approvals: Arc<RwLock<HashMap<ApprovalId, BillApproval>>>,
}

impl InMemoryApprovalStore {
    /// Creates a new, empty in-memory approval store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn insert(&self, approval: BillApproval) -> Result<()> {
        let mut approvals = self.approvals.write().await;
        approvals.insert(approval.id, approval);
        Ok(())
    }

    async fn get(&self, id: ApprovalId) -> Result<Option<BillApproval>> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(&id).cloned())
    }

    async fn get_by_bill(&self, bill_id: BillId) -> Result<Option<BillApproval>> {
        let approvals = self.approvals.read().await;
        Ok(approvals
            .values()
            .filter(|a| a.bill_id == bill_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn update_versioned(
        &self,
        mut approval: BillApproval,
        expected_version: u64,
    ) -> Result<BillApproval> {
        let mut approvals = self.approvals.write().await;
        let stored = approvals
            .get(&approval.id)
            .ok_or_else(|| EngineError::not_found("approval", approval.id))?;
        if stored.version != expected_version {
            return Err(EngineError::state_conflict(format!(
                "approval {} was decided concurrently (version {}, expected {})",
                approval.id, stored.version, expected_version
            )));
        }
        approval.version = expected_version + 1;
        approvals.insert(approval.id, approval.clone());
        Ok(approval)
    }

    async fn list_active(&self) -> Result<Vec<BillApproval>> {
        let approvals = self.approvals.read().await;
        let mut found: Vec<BillApproval> = approvals
            .values()
            .filter(|a| a.status.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}

#[derive(Default)]
struct PaymentShelf {
    payments: HashMap<PaymentId, Payment>,
    by_key: HashMap<IdempotencyKey, PaymentId>,
}

/// A thread-safe in-memory store for payments.
///
/// One lock covers both the record map and the idempotency-key index so the
/// unique-key insert and the pending→processing claim are atomic.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    shelf: Arc<RwLock<PaymentShelf>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut shelf = self.shelf.write().await;
        if shelf.by_key.contains_key(&payment.idempotency_key) {
            return Err(EngineError::state_conflict(format!(
                "a payment already exists for {}",
                payment.idempotency_key
            )));
        }
        shelf.by_key.insert(payment.idempotency_key.clone(), payment.id);
        shelf.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let shelf = self.shelf.read().await;
        Ok(shelf.payments.get(&id).cloned())
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let mut shelf = self.shelf.write().await;
        shelf.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        let shelf = self.shelf.read().await;
        Ok(shelf
            .by_key
            .get(key)
            .and_then(|id| shelf.payments.get(id))
            .cloned())
    }

    async fn claim(&self, id: PaymentId) -> Result<ClaimOutcome> {
        let mut shelf = self.shelf.write().await;
        let payment = shelf
            .payments
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found("payment", id))?;
        if payment.status == PaymentStatus::Pending {
            payment.mark_processing(Utc::now());
            Ok(ClaimOutcome::Claimed(payment.clone()))
        } else {
            Ok(ClaimOutcome::AlreadyTaken(payment.clone()))
        }
    }

    async fn list_by_bill(&self, bill_id: BillId) -> Result<Vec<Payment>> {
        let shelf = self.shelf.read().await;
        let mut found: Vec<Payment> = shelf
            .payments
            .values()
            .filter(|p| p.bill_id == bill_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }
}

/// A full set of fresh in-memory stores, ready to wire into an engine.
pub fn engine_stores() -> EngineStores {
    EngineStores {
        bills: Arc::new(InMemoryBillStore::new()),
        vendors: Arc::new(InMemoryVendorStore::new()),
        workflows: Arc::new(InMemoryWorkflowStore::new()),
        approvals: Arc::new(InMemoryApprovalStore::new()),
        payments: Arc::new(InMemoryPaymentStore::new()),
    }
}
