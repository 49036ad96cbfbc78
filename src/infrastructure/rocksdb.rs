use crate::domain::approval::{ApprovalId, ApprovalWorkflow, BillApproval, WorkflowId};
use crate::domain::bill::{Bill, BillId};
use crate::domain::payment::{ClaimOutcome, IdempotencyKey, Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{ApprovalStore, BillStore, PaymentStore, VendorStore, WorkflowStore};
use crate::domain::vendor::{Vendor, VendorId};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for bills.
pub const CF_BILLS: &str = "bills";
/// Column Family for vendors.
pub const CF_VENDORS: &str = "vendors";
/// Column Family for approval workflow definitions.
pub const CF_WORKFLOWS: &str = "workflows";
/// Column Family for bill approvals.
pub const CF_APPROVALS: &str = "approvals";
/// Column Family for payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping idempotency keys to payment ids.
pub const CF_PAYMENT_KEYS: &str = "payment_keys";

/// A persistent store implementation using RocksDB.
///
/// Every entity lives in its own Column Family with its UUID bytes as the
/// key and a JSON document as the value. The idempotency-key index gets a
/// CF of its own so the unique-key check is one point lookup.
///
/// RocksDB point writes are atomic but give no read-modify-write, so the
/// operations that must observe a value and react to it in one step (the
/// unique-key insert, the pending→processing claim, the versioned approval
/// update) serialize behind `write_gate`. Plain puts bypass the gate.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_BILLS,
            CF_VENDORS,
            CF_WORKFLOWS,
            CF_APPROVALS,
            CF_PAYMENTS,
            CF_PAYMENT_KEYS,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::storage(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        let bytes = serde_json::to_vec(value).map_err(EngineError::internal)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(EngineError::internal)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let cf = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) = item?;
            values.push(serde_json::from_slice(&bytes).map_err(EngineError::internal)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl BillStore for RocksDBStore {
    async fn insert(&self, bill: Bill) -> Result<()> {
        self.put(CF_BILLS, bill.id.as_bytes(), &bill)
    }

    async fn get(&self, id: BillId) -> Result<Option<Bill>> {
        self.read(CF_BILLS, id.as_bytes())
    }

    async fn update(&self, bill: Bill) -> Result<()> {
        self.put(CF_BILLS, bill.id.as_bytes(), &bill)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self.scan(CF_BILLS)?;
        bills.retain(|b| b.user_id == user_id);
        bills.sort_by_key(|b| b.created_at);
        Ok(bills)
    }

    async fn list_open_due_before(&self, cutoff: NaiveDate) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self.scan(CF_BILLS)?;
        bills.retain(|b| b.is_open() && b.due_date < cutoff);
        bills.sort_by_key(|b| b.due_date);
        Ok(bills)
    }
}

#[async_trait]
impl VendorStore for RocksDBStore {
    async fn insert(&self, vendor: Vendor) -> Result<()> {
        self.put(CF_VENDORS, vendor.id.as_bytes(), &vendor)
    }

    async fn get(&self, id: VendorId) -> Result<Option<Vendor>> {
        self.read(CF_VENDORS, id.as_bytes())
    }

    async fn update(&self, vendor: Vendor) -> Result<()> {
        self.put(CF_VENDORS, vendor.id.as_bytes(), &vendor)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Vendor>> {
        let mut vendors: Vec<Vendor> = self.scan(CF_VENDORS)?;
        vendors.retain(|v| v.user_id == user_id);
        vendors.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(vendors)
    }
}

#[async_trait]
impl WorkflowStore for RocksDBStore {
    async fn insert(&self, workflow: ApprovalWorkflow) -> Result<()> {
        self.put(CF_WORKFLOWS, workflow.id.as_bytes(), &workflow)
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>> {
        self.read(CF_WORKFLOWS, id.as_bytes())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ApprovalWorkflow>> {
        let mut workflows: Vec<ApprovalWorkflow> = self.scan(CF_WORKFLOWS)?;
        workflows.retain(|w| w.user_id == user_id);
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }
}

#[async_trait]
impl ApprovalStore for RocksDBStore {
    async fn insert(&self, approval: BillApproval) -> Result<()> {
        self.put(CF_APPROVALS, approval.id.as_bytes(), &approval)
    }

    async fn get(&self, id: ApprovalId) -> Result<Option<BillApproval>> {
        self.read(CF_APPROVALS, id.as_bytes())
    }

    async fn get_by_bill(&self, bill_id: BillId) -> Result<Option<BillApproval>> {
        let approvals: Vec<BillApproval> = self.scan(CF_APPROVALS)?;
        Ok(approvals
            .into_iter()
            .filter(|a| a.bill_id == bill_id)
            .max_by_key(|a| a.created_at))
    }

    async fn update_versioned(
        &self,
        mut approval: BillApproval,
        expected_version: u64,
    ) -> Result<BillApproval> {
        let _gate = self.write_gate.lock().await;
        let stored: BillApproval = self
            .read(CF_APPROVALS, approval.id.as_bytes())?
            .ok_or_else(|| EngineError::not_found("approval", approval.id))?;
        if stored.version != expected_version {
            return Err(EngineError::state_conflict(format!(
                "approval {} was decided concurrently (version {}, expected {})",
                approval.id, stored.version, expected_version
            )));
        }
        approval.version = expected_version + 1;
        self.put(CF_APPROVALS, approval.id.as_bytes(), &approval)?;
        Ok(approval)
    }

    async fn list_active(&self) -> Result<Vec<BillApproval>> {
        let mut approvals: Vec<BillApproval> = self.scan(CF_APPROVALS)?;
        approvals.retain(|a| a.status.is_active());
        approvals.sort_by_key(|a| a.created_at);
        Ok(approvals)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let key_cf = self.cf(CF_PAYMENT_KEYS)?;
        let key_bytes = payment.idempotency_key.as_str().as_bytes();
        if self.db.get_pinned_cf(key_cf, key_bytes)?.is_some() {
            return Err(EngineError::state_conflict(format!(
                "a payment already exists for {}",
                payment.idempotency_key
            )));
        }
        self.put(CF_PAYMENTS, payment.id.as_bytes(), &payment)?;
        self.db
            .put_cf(key_cf, key_bytes, payment.id.as_bytes())?;
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        self.put(CF_PAYMENTS, payment.id.as_bytes(), &payment)
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        let key_cf = self.cf(CF_PAYMENT_KEYS)?;
        let Some(id_bytes) = self.db.get_cf(key_cf, key.as_str().as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&id_bytes)
            .map_err(|_| EngineError::storage("corrupt payment id in key index"))?;
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn claim(&self, id: PaymentId) -> Result<ClaimOutcome> {
        let _gate = self.write_gate.lock().await;
        let mut payment: Payment = self
            .read(CF_PAYMENTS, id.as_bytes())?
            .ok_or_else(|| EngineError::not_found("payment", id))?;
        if payment.status == PaymentStatus::Pending {
            payment.mark_processing(Utc::now());
            self.put(CF_PAYMENTS, payment.id.as_bytes(), &payment)?;
            Ok(ClaimOutcome::Claimed(payment))
        } else {
            Ok(ClaimOutcome::AlreadyTaken(payment))
        }
    }

    async fn list_by_bill(&self, bill_id: BillId) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        payments.retain(|p| p.bill_id == bill_id);
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Currency};
    use crate::domain::vendor::{PaymentMethod, PaymentMethodKind};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn sample_bill() -> Bill {
        Bill::create(
            "user-1",
            Amount::new(dec!(100)).unwrap(),
            Amount::ZERO,
            Amount::ZERO,
            Currency::default(),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_all_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("failed to open RocksDB");
        for cf in [
            CF_BILLS,
            CF_VENDORS,
            CF_WORKFLOWS,
            CF_APPROVALS,
            CF_PAYMENTS,
            CF_PAYMENT_KEYS,
        ] {
            assert!(store.db.cf_handle(cf).is_some(), "{cf} missing");
        }
    }

    #[tokio::test]
    async fn test_bill_round_trip_survives_reopen() {
        let dir = tempdir().unwrap();
        let bill = sample_bill();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            BillStore::insert(&store, bill.clone()).await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let retrieved = BillStore::get(&store, bill.id).await.unwrap().unwrap();
        assert_eq!(retrieved, bill);

        let listed = store.list_by_user("user-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.list_by_user("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_key_uniqueness_is_enforced() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let bill = sample_bill();
        let method = PaymentMethod::new(PaymentMethodKind::Ach);
        let now = Utc::now();

        let payment = Payment::schedule(&bill, &method, bill.due_date, now);
        PaymentStore::insert(&store, payment.clone()).await.unwrap();

        let duplicate = Payment::schedule(&bill, &method, bill.due_date, now);
        let err = PaymentStore::insert(&store, duplicate).await.unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));

        let found = store
            .find_by_key(&payment.idempotency_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, payment.id);
    }

    #[tokio::test]
    async fn test_claim_transitions_pending_exactly_once() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let bill = sample_bill();
        let method = PaymentMethod::new(PaymentMethodKind::Card);
        let payment = Payment::schedule(&bill, &method, bill.due_date, Utc::now());
        PaymentStore::insert(&store, payment.clone()).await.unwrap();

        let first = store.claim(payment.id).await.unwrap();
        assert!(matches!(first, ClaimOutcome::Claimed(_)));

        let second = store.claim(payment.id).await.unwrap();
        match second {
            ClaimOutcome::AlreadyTaken(current) => {
                assert_eq!(current.status, PaymentStatus::Processing);
            }
            ClaimOutcome::Claimed(_) => panic!("claim should not succeed twice"),
        }
    }

    #[tokio::test]
    async fn test_versioned_approval_update_detects_races() {
        use crate::domain::approval::{ApproverRole, StepKind, WorkflowStep};

        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let now = Utc::now();
        let bill = sample_bill();
        let workflow = ApprovalWorkflow::new(
            "user-1",
            "Managers",
            vec![WorkflowStep::new(
                1,
                "Manager sign-off",
                StepKind::RoleApproval {
                    role: ApproverRole::Manager,
                },
            )],
            now,
        );
        let approval = BillApproval::materialize(&workflow, &bill, "user-1", false, now).unwrap();
        let version = approval.version;
        ApprovalStore::insert(&store, approval.clone()).await.unwrap();

        let stored = store
            .update_versioned(approval.clone(), version)
            .await
            .unwrap();
        assert_eq!(stored.version, version + 1);

        let err = store.update_versioned(approval, version).await.unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }
}
