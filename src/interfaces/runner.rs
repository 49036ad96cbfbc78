use crate::application::engine::{BillEngine, EngineStores, NewBill, NewBillVendor};
use crate::domain::approval::Decision;
use crate::domain::bill::BillId;
use crate::domain::extraction::DocumentType;
use crate::domain::money::Amount;
use crate::domain::payment::{Payment, ReconcileStatus};
use crate::domain::vendor::{
    PaymentMethod, PaymentMethodKind, Vendor, VendorStatus, normalize_name,
};
use crate::error::{EngineError, Result};
use crate::interfaces::csv::bill_writer::BillRecord;
use crate::interfaces::csv::operation_reader::{BillOperation, OpKind};
use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Applies operation rows to the engine, one at a time, and renders the
/// final report.
///
/// The runner owns the scenario-local label table: the row that creates a
/// bill binds its label, later rows resolve it. Labels exist only for the
/// duration of one run; the report echoes them next to the engine-assigned
/// bill numbers.
pub struct OperationRunner {
    engine: BillEngine,
    stores: EngineStores,
    labels: Vec<(String, BillId)>,
}

impl OperationRunner {
    pub fn new(engine: BillEngine, stores: EngineStores) -> Self {
        Self {
            engine,
            stores,
            labels: Vec::new(),
        }
    }

    /// Applies one operation. Errors leave earlier rows' effects in place;
    /// the caller decides whether to continue.
    pub async fn apply(&mut self, op: BillOperation) -> Result<()> {
        match op.op {
            OpKind::Vendor => self.apply_vendor(op).await,
            OpKind::Ingest => self.apply_ingest(op).await,
            OpKind::Manual => self.apply_manual(op).await,
            OpKind::Approve => self.apply_decision(op, Decision::Approve).await,
            OpKind::Reject => self.apply_decision(op, Decision::Reject).await,
            OpKind::Schedule => self.apply_schedule(op).await,
            OpKind::Execute => self.apply_execute(op).await,
            OpKind::Reconcile => self.apply_reconcile(op).await,
            OpKind::Sweep => self.apply_sweep(op).await,
        }
    }

    /// One report line per bound label, in binding order. Labels whose bill
    /// disappeared are skipped rather than failing the report.
    pub async fn summary(&self) -> Result<Vec<BillRecord>> {
        let mut records = Vec::new();
        for (label, id) in &self.labels {
            let Some(bill) = self.stores.bills.get(*id).await? else {
                continue;
            };
            let vendor = match bill.vendor_id {
                Some(vendor_id) => self.stores.vendors.get(vendor_id).await?,
                None => None,
            };
            records.push(BillRecord::new(
                label.clone(),
                &bill,
                vendor.as_ref().map(|v| v.name.as_str()),
            ));
        }
        Ok(records)
    }

    async fn apply_vendor(&mut self, op: BillOperation) -> Result<()> {
        let user = require(op.user, "user")?;
        let name = require(op.arg, "arg")?;
        let now = Utc::now();

        let normalized = normalize_name(&name);
        let existing = self
            .stores
            .vendors
            .list_by_user(&user)
            .await?
            .into_iter()
            .find(|v| v.normalized_name == normalized);
        let created = existing.is_none();
        let mut vendor = match existing {
            Some(vendor) => vendor,
            None => Vendor::new(&user, &name, now)?,
        };
        // A vendor defined by hand is confirmed, not a document guess.
        vendor.status = VendorStatus::Active;

        if let Some(pack) = op.value.as_deref() {
            for (key, value) in parse_pack(pack) {
                match (key, value) {
                    ("email", Some(email)) => vendor.email = Some(email.to_string()),
                    ("phone", Some(phone)) => vendor.phone = Some(phone.to_string()),
                    ("approve", _) => vendor.approval_required = true,
                    ("threshold", Some(raw)) => {
                        vendor.approval_required = true;
                        vendor.approval_threshold = Some(Amount::new(parse_decimal(raw)?)?);
                    }
                    ("autopay", _) => vendor.auto_pay = true,
                    ("category", Some(raw)) => vendor.category = Some(raw.parse()?),
                    ("methods", Some(raw)) => {
                        for kind_raw in raw.split('|') {
                            let kind: PaymentMethodKind = kind_raw.parse()?;
                            if vendor.method_of_kind(kind).is_none() {
                                vendor.add_payment_method(PaymentMethod::new(kind), now);
                            }
                        }
                    }
                    (other, _) => {
                        return Err(EngineError::validation(format!(
                            "unknown vendor option: {other}"
                        )));
                    }
                }
            }
        }

        vendor.touch(now);
        if created {
            self.stores.vendors.insert(vendor).await
        } else {
            self.stores.vendors.update(vendor).await
        }
    }

    async fn apply_ingest(&mut self, op: BillOperation) -> Result<()> {
        let user = require(op.user, "user")?;
        let label = require(op.bill, "bill")?;
        let filename = require(op.arg, "arg")?;
        let document = require(op.value, "value")?;
        self.ensure_unbound(&label)?;

        let kind = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .and_then(|ext| ext.parse::<DocumentType>().ok())
            .unwrap_or(DocumentType::Text);
        // Inline documents carry newlines as the two-character sequence \n.
        let text = document.replace("\\n", "\n");

        let outcome = self
            .engine
            .ingest_document(&user, text.as_bytes(), kind, &filename)
            .await?;
        self.bind(label, outcome.bill.id)
    }

    async fn apply_manual(&mut self, op: BillOperation) -> Result<()> {
        let user = require(op.user, "user")?;
        let label = require(op.bill, "bill")?;
        let vendor_name = require(op.arg, "arg")?;
        let pack = require(op.value, "value")?;
        self.ensure_unbound(&label)?;

        let mut input = NewBill {
            vendor: NewBillVendor::Named(vendor_name),
            amount: Amount::ZERO,
            tax_amount: Amount::ZERO,
            discount_amount: Amount::ZERO,
            currency: None,
            issue_date: None,
            due_date: None,
            invoice_number: None,
            description: op.notes,
            category: None,
        };
        for (key, value) in parse_pack(&pack) {
            match (key, value) {
                ("amount", Some(raw)) => input.amount = Amount::new(parse_decimal(raw)?)?,
                ("tax", Some(raw)) => input.tax_amount = Amount::new(parse_decimal(raw)?)?,
                ("discount", Some(raw)) => {
                    input.discount_amount = Amount::new(parse_decimal(raw)?)?;
                }
                ("currency", Some(raw)) => input.currency = Some(raw.to_string()),
                ("issue", Some(raw)) => input.issue_date = Some(parse_date(raw)?),
                ("due", Some(raw)) => input.due_date = Some(parse_date(raw)?),
                ("invoice", Some(raw)) => input.invoice_number = Some(raw.to_string()),
                ("category", Some(raw)) => input.category = Some(raw.parse()?),
                (other, _) => {
                    return Err(EngineError::validation(format!(
                        "unknown bill option: {other}"
                    )));
                }
            }
        }

        let outcome = self.engine.create_bill_manually(&user, input).await?;
        self.bind(label, outcome.bill.id)
    }

    async fn apply_decision(&mut self, op: BillOperation, decision: Decision) -> Result<()> {
        let label = require(op.bill, "bill")?;
        let actor = require(op.actor, "actor")?;
        let bill_id = self.bill_id(&label)?;

        let approval = self
            .stores
            .approvals
            .get_by_bill(bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("approval", &label))?;
        let step = match op.arg.as_deref() {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| EngineError::validation(format!("invalid step number: {raw}")))?,
            None => approval
                .awaiting_step()
                .map(|s| s.order)
                .ok_or_else(|| EngineError::state_conflict("approval has no awaiting step"))?,
        };

        self.engine
            .decide_approval(approval.id, step, &actor, decision, op.notes)
            .await?;
        Ok(())
    }

    async fn apply_schedule(&mut self, op: BillOperation) -> Result<()> {
        let label = require(op.bill, "bill")?;
        let bill_id = self.bill_id(&label)?;

        let bill = self
            .stores
            .bills
            .get(bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bill", &label))?;
        let vendor_id = bill
            .vendor_id
            .ok_or_else(|| EngineError::validation("bill has no vendor to pay"))?;
        let vendor = self
            .stores
            .vendors
            .get(vendor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("vendor", vendor_id))?;
        let method = match op.arg.as_deref() {
            Some(raw) => {
                let kind: PaymentMethodKind = raw.parse()?;
                vendor
                    .method_of_kind(kind)
                    .ok_or_else(|| EngineError::not_found("payment method", raw))?
            }
            None => vendor.default_method().ok_or_else(|| {
                EngineError::validation(format!("vendor {} has no payment method", vendor.name))
            })?,
        };
        let date = op.value.as_deref().map(parse_date).transpose()?;

        self.engine.schedule_payment(bill_id, method.id, date).await?;
        Ok(())
    }

    async fn apply_execute(&mut self, op: BillOperation) -> Result<()> {
        let label = require(op.bill, "bill")?;
        let payment = self.find_payment(&label, op.arg.as_deref()).await?;
        self.engine.execute_payment(payment.id).await?;
        Ok(())
    }

    async fn apply_reconcile(&mut self, op: BillOperation) -> Result<()> {
        let label = require(op.bill, "bill")?;
        let status = match require(op.arg, "arg")?.to_ascii_lowercase().as_str() {
            "completed" => ReconcileStatus::Completed,
            "failed" => ReconcileStatus::Failed,
            other => {
                return Err(EngineError::validation(format!(
                    "unknown settlement result: {other}"
                )));
            }
        };
        let payment = self.find_payment(&label, None).await?;
        self.engine.reconcile_payment(payment.id, status).await?;
        Ok(())
    }

    async fn apply_sweep(&mut self, op: BillOperation) -> Result<()> {
        let now = match op.arg.as_deref() {
            Some(raw) => parse_date(raw)?.and_time(NaiveTime::MIN).and_utc(),
            None => Utc::now(),
        };
        self.engine.sweep_overdue(now).await?;
        Ok(())
    }

    /// The bill's most recent payment, optionally restricted to one method
    /// kind.
    async fn find_payment(&self, label: &str, kind: Option<&str>) -> Result<Payment> {
        let bill_id = self.bill_id(label)?;
        let payments = self.stores.payments.list_by_bill(bill_id).await?;
        let payment = match kind {
            Some(raw) => {
                let kind: PaymentMethodKind = raw.parse()?;
                payments.into_iter().rev().find(|p| p.method_kind == kind)
            }
            None => payments.into_iter().next_back(),
        };
        payment.ok_or_else(|| EngineError::not_found("payment", label))
    }

    fn bind(&mut self, label: String, id: BillId) -> Result<()> {
        self.labels.push((label, id));
        Ok(())
    }

    fn ensure_unbound(&self, label: &str) -> Result<()> {
        if self.labels.iter().any(|(known, _)| known == label) {
            return Err(EngineError::validation(format!(
                "bill label '{label}' is already in use"
            )));
        }
        Ok(())
    }

    fn bill_id(&self, label: &str) -> Result<BillId> {
        self.labels
            .iter()
            .find(|(known, _)| known == label)
            .map(|(_, id)| *id)
            .ok_or_else(|| EngineError::not_found("bill", label))
    }
}

fn require(value: Option<String>, column: &str) -> Result<String> {
    value.ok_or_else(|| {
        EngineError::validation(format!("operation requires the '{column}' column"))
    })
}

fn parse_pack(raw: &str) -> Vec<(&str, Option<&str>)> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (part, None),
        })
        .collect()
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|_| EngineError::validation(format!("invalid amount: {raw}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| EngineError::validation(format!("invalid date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::access::PermissiveAuthorizer;
    use crate::infrastructure::audit::NullEventSink;
    use crate::infrastructure::extraction::TextInvoiceExtractor;
    use crate::infrastructure::in_memory;
    use crate::infrastructure::processors::default_registry;
    use crate::policy::EnginePolicy;
    use std::sync::Arc;

    fn runner() -> OperationRunner {
        let stores = in_memory::engine_stores();
        let engine = BillEngine::new(
            stores.clone(),
            Arc::new(TextInvoiceExtractor::new()),
            default_registry(),
            Arc::new(PermissiveAuthorizer),
            Arc::new(NullEventSink),
            EnginePolicy::default(),
        );
        OperationRunner::new(engine, stores)
    }

    fn op(kind: OpKind) -> BillOperation {
        BillOperation {
            op: kind,
            user: None,
            bill: None,
            actor: None,
            arg: None,
            value: None,
            notes: None,
        }
    }

    const INVOICE: &str = "Vendor: Acme Corp\\nEmail: billing@acme.test\\n\
                           Invoice #: INV-1\\nDate: 2026-05-01\\nDue: 2026-05-31\\n\
                           Amount: $50.00\\nTax: $4.00";

    #[tokio::test]
    async fn test_ingest_schedule_execute_round() {
        let mut runner = runner();

        runner
            .apply(BillOperation {
                user: Some("user-1".into()),
                arg: Some("Acme Corp".into()),
                value: Some("methods=card".into()),
                ..op(OpKind::Vendor)
            })
            .await
            .unwrap();

        runner
            .apply(BillOperation {
                user: Some("user-1".into()),
                bill: Some("b1".into()),
                arg: Some("invoice.txt".into()),
                value: Some(INVOICE.into()),
                ..op(OpKind::Ingest)
            })
            .await
            .unwrap();

        runner
            .apply(BillOperation {
                bill: Some("b1".into()),
                arg: Some("card".into()),
                ..op(OpKind::Schedule)
            })
            .await
            .unwrap();
        runner
            .apply(BillOperation {
                bill: Some("b1".into()),
                ..op(OpKind::Execute)
            })
            .await
            .unwrap();

        let records = runner.summary().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bill, "b1");
        assert_eq!(records[0].vendor, "Acme Corp");
        assert_eq!(records[0].status, "paid");
        assert!(records[0].paid.is_some());
    }

    #[tokio::test]
    async fn test_manual_bill_over_threshold_needs_decision() {
        let mut runner = runner();

        runner
            .apply(BillOperation {
                user: Some("user-1".into()),
                arg: Some("Studio North".into()),
                value: Some("threshold=100".into()),
                ..op(OpKind::Vendor)
            })
            .await
            .unwrap();

        runner
            .apply(BillOperation {
                user: Some("user-1".into()),
                bill: Some("b1".into()),
                arg: Some("Studio North".into()),
                value: Some("amount=500;due=2027-09-30".into()),
                notes: Some("Brand refresh".into()),
                ..op(OpKind::Manual)
            })
            .await
            .unwrap();

        let pending = runner.summary().await.unwrap();
        assert_eq!(pending[0].status, "pending_approval");

        runner
            .apply(BillOperation {
                bill: Some("b1".into()),
                actor: Some("boss".into()),
                ..op(OpKind::Approve)
            })
            .await
            .unwrap();

        let approved = runner.summary().await.unwrap();
        assert_eq!(approved[0].status, "approved");
    }

    #[tokio::test]
    async fn test_unknown_label_is_reported() {
        let mut runner = runner();
        let err = runner
            .apply(BillOperation {
                bill: Some("ghost".into()),
                actor: Some("boss".into()),
                ..op(OpKind::Approve)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_label_is_rejected() {
        let mut runner = runner();
        let row = BillOperation {
            user: Some("user-1".into()),
            bill: Some("b1".into()),
            arg: Some("Acme Corp".into()),
            value: Some("amount=40".into()),
            ..op(OpKind::Manual)
        };

        runner.apply(row.clone()).await.unwrap();
        let err = runner.apply(row).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(runner.labels.len(), 1);
    }
}
