use crate::application::approval::ApprovalEngine;
use crate::application::categorize::{categorize, categorize_text};
use crate::application::dispatch::{PaymentDispatcher, PaymentOutcome};
use crate::application::resolver::VendorResolver;
use crate::domain::approval::{
    ApprovalId, ApprovalOutcome, ApprovalStatus, BillApproval, Decision, SYSTEM_ACTOR,
};
use crate::domain::bill::{Bill, BillId, BillStatus, ExpenseCategory, ExtractionMeta};
use crate::domain::event::{AuditAction, AuditEvent, EntityKind};
use crate::domain::extraction::{DocumentType, ExtractedFields};
use crate::domain::money::{Amount, Currency};
use crate::domain::payment::{PaymentId, PaymentStatus, ReconcileStatus};
use crate::domain::ports::{
    ApprovalStoreRef, AuthorizerRef, BillStoreRef, EventSinkRef, ExtractionProviderRef,
    PaymentStoreRef, ProcessorRegistry, VendorStoreRef, WorkflowStoreRef,
};
use crate::domain::vendor::{PaymentMethodId, Vendor, VendorId};
use crate::error::{EngineError, Result};
use crate::policy::EnginePolicy;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::sync::Arc;

/// The five entity stores the engine is wired with. Cloning clones the
/// `Arc` handles, not the data, so callers can keep their own view of the
/// same storage.
#[derive(Clone)]
pub struct EngineStores {
    pub bills: BillStoreRef,
    pub vendors: VendorStoreRef,
    pub workflows: WorkflowStoreRef,
    pub approvals: ApprovalStoreRef,
    pub payments: PaymentStoreRef,
}

/// Input for a bill entered by hand rather than extracted from a document.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub vendor: NewBillVendor,
    pub amount: Amount,
    pub tax_amount: Amount,
    pub discount_amount: Amount,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub description: Option<String>,
    pub category: Option<ExpenseCategory>,
}

#[derive(Debug, Clone)]
pub enum NewBillVendor {
    Existing(VendorId),
    Named(String),
}

/// Result of routing a bill into the lifecycle: the bill as stored, the
/// vendor it was attached to (when any) and the approval when one was
/// opened.
#[derive(Debug, Clone)]
pub struct BillOutcome {
    pub bill: Bill,
    pub vendor: Option<Vendor>,
    pub approval: Option<BillApproval>,
}

#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub approval: BillApproval,
    pub bill: Bill,
}

#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub overdue: Vec<Bill>,
    pub escalated: Vec<BillApproval>,
}

/// The main entry point for the bill lifecycle.
///
/// `BillEngine` owns the ingestion pipeline (extract, resolve, categorize,
/// gate), the approval surface and the payment surface, delegating each
/// stage to its collaborator. Every state transition that commits emits one
/// audit event; deduplicated calls emit none.
pub struct BillEngine {
    stores: EngineStores,
    extraction: ExtractionProviderRef,
    resolver: VendorResolver,
    approvals: ApprovalEngine,
    dispatcher: PaymentDispatcher,
    events: EventSinkRef,
    policy: Arc<EnginePolicy>,
}

impl BillEngine {
    /// Wires an engine from its stores and adapters.
    ///
    /// # Arguments
    ///
    /// * `stores` - The entity stores, shared with the caller.
    /// * `extraction` - The document extraction provider.
    /// * `processors` - Processor adapters by payment method kind.
    /// * `authorizer` - Role membership for approval decisions.
    /// * `events` - Audit event sink.
    /// * `policy` - Engine-wide policy knobs.
    pub fn new(
        stores: EngineStores,
        extraction: ExtractionProviderRef,
        processors: ProcessorRegistry,
        authorizer: AuthorizerRef,
        events: EventSinkRef,
        policy: EnginePolicy,
    ) -> Self {
        let policy = Arc::new(policy);
        let resolver = VendorResolver::new(stores.vendors.clone(), policy.clone());
        let approvals = ApprovalEngine::new(
            stores.workflows.clone(),
            stores.approvals.clone(),
            authorizer,
            policy.clone(),
        );
        let dispatcher = PaymentDispatcher::new(
            stores.bills.clone(),
            stores.vendors.clone(),
            stores.payments.clone(),
            processors,
            policy.clone(),
        );
        Self {
            stores,
            extraction,
            resolver,
            approvals,
            dispatcher,
            events,
            policy,
        }
    }

    /// Ingests one document end to end: extraction, vendor resolution,
    /// categorization, bill creation and the approval gate.
    ///
    /// Extraction trouble never aborts ingestion: a timeout, a provider
    /// failure or an unusable read all degrade to a draft bill carrying the
    /// raw document text for manual completion.
    pub async fn ingest_document(
        &self,
        user_id: &str,
        document: &[u8],
        kind: DocumentType,
        filename: &str,
    ) -> Result<BillOutcome> {
        let now = Utc::now();

        let fields = match tokio::time::timeout(
            self.policy.extraction_timeout(),
            self.extraction.extract(document, kind),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(filename, "extraction timed out");
                None
            }
            Ok(Err(EngineError::Extraction(reason))) => {
                tracing::warn!(filename, %reason, "extraction failed");
                None
            }
            Ok(Err(other)) => return Err(other),
            Ok(Ok(fields)) => Some(fields),
        };

        let Some(fields) = fields else {
            return self.create_draft(user_id, None, kind, filename, now).await;
        };
        if !fields.is_usable() {
            return self
                .create_draft(user_id, Some(fields), kind, filename, now)
                .await;
        }

        let vendor_name = fields.vendor_name.as_deref().unwrap_or_default();
        let resolution = self
            .resolver
            .resolve(user_id, vendor_name, fields.vendor_email.as_deref(), now)
            .await?;
        let vendor = resolution.vendor;
        self.emit_vendor(&vendor, resolution.created, user_id, now);

        let amount = fields.amount.unwrap_or(Amount::ZERO);
        let tax = fields.tax_amount.unwrap_or(Amount::ZERO);
        let currency = fields
            .currency
            .as_deref()
            .map(Currency::new)
            .unwrap_or_else(|| Currency::new(&self.policy.default_currency));
        let issue_date = fields.issue_date.unwrap_or_else(|| now.date_naive());
        let due_date = fields
            .due_date
            .unwrap_or_else(|| issue_date + TimeDelta::days(self.policy.default_due_days));

        let mut bill = Bill::create(
            user_id, amount, tax, Amount::ZERO, currency, issue_date, due_date, now,
        )?;
        bill.vendor_id = Some(vendor.id);
        bill.invoice_number = fields.invoice_number.clone();
        bill.description = fields.description.clone();
        bill.category = vendor.category.unwrap_or_else(|| categorize(&fields));
        bill.extraction = ExtractionMeta {
            ocr_text: fields.raw_text.clone(),
            confidence: Some(fields.confidence),
            document_type: Some(kind),
            source_file: Some(filename.to_string()),
        };

        let low_confidence = fields.confidence < self.policy.low_confidence_threshold;
        self.stores.bills.insert(bill.clone()).await?;
        self.emit(
            AuditEvent::new(EntityKind::Bill, bill.id, AuditAction::Created, user_id, now)
                .with_detail(format!("ingested from {filename}")),
        );

        self.route_through_gate(bill, Some(&vendor), low_confidence, user_id, now)
            .await
    }

    /// Creates a validated bill from manual input and runs the same
    /// approval gate as ingestion.
    pub async fn create_bill_manually(&self, user_id: &str, input: NewBill) -> Result<BillOutcome> {
        let now = Utc::now();

        let (vendor, resolution_created) = match &input.vendor {
            NewBillVendor::Existing(id) => {
                let vendor = self
                    .stores
                    .vendors
                    .get(*id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("vendor", id))?;
                (vendor, None)
            }
            NewBillVendor::Named(name) => {
                let resolution = self.resolver.resolve(user_id, name, None, now).await?;
                (resolution.vendor, Some(resolution.created))
            }
        };
        if let Some(created) = resolution_created {
            self.emit_vendor(&vendor, created, user_id, now);
        }

        let issue_date = input.issue_date.unwrap_or_else(|| now.date_naive());
        let due_date = input
            .due_date
            .unwrap_or_else(|| issue_date + TimeDelta::days(self.policy.default_due_days));
        if due_date < issue_date {
            return Err(EngineError::validation("due date precedes issue date"));
        }
        let currency = input
            .currency
            .as_deref()
            .map(Currency::new)
            .unwrap_or_else(|| Currency::new(&self.policy.default_currency));

        let mut bill = Bill::create(
            user_id,
            input.amount,
            input.tax_amount,
            input.discount_amount,
            currency,
            issue_date,
            due_date,
            now,
        )?;
        if bill.total_amount.is_zero() {
            return Err(EngineError::validation("bill total must be positive"));
        }
        bill.vendor_id = Some(vendor.id);
        bill.invoice_number = input.invoice_number.clone();
        bill.description = input.description.clone();
        bill.category = input
            .category
            .or(vendor.category)
            .unwrap_or_else(|| {
                let text = format!(
                    "{} {}",
                    vendor.name,
                    input.description.as_deref().unwrap_or_default()
                );
                categorize_text(&text)
            });

        self.stores.bills.insert(bill.clone()).await?;
        self.emit(AuditEvent::new(
            EntityKind::Bill,
            bill.id,
            AuditAction::Created,
            user_id,
            now,
        ));

        self.route_through_gate(bill, Some(&vendor), false, user_id, now)
            .await
    }

    /// Runs the approval gate for a bill that is not yet routed: one just
    /// received, a draft completed out-of-band, or an overdue bill that
    /// never entered approval.
    pub async fn schedule_approval(&self, bill_id: BillId) -> Result<BillOutcome> {
        let now = Utc::now();
        let mut bill = self
            .stores
            .bills
            .get(bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bill", bill_id))?;

        if let Some(existing) = self.stores.approvals.get_by_bill(bill_id).await?
            && existing.status.is_active()
        {
            return Err(EngineError::state_conflict(format!(
                "approval already in progress for bill {}",
                bill.bill_number
            )));
        }

        match bill.status {
            BillStatus::Draft => {
                bill.mark_received(now)?;
                self.stores.bills.update(bill.clone()).await?;
            }
            BillStatus::Received => {}
            BillStatus::Overdue => {
                if bill.approved_at.is_some() {
                    return Err(EngineError::state_conflict(format!(
                        "bill {} is already approved",
                        bill.bill_number
                    )));
                }
            }
            other => {
                return Err(EngineError::state_conflict(format!(
                    "cannot schedule approval for a {other} bill"
                )));
            }
        }

        let vendor = match bill.vendor_id {
            Some(id) => self.stores.vendors.get(id).await?,
            None => None,
        };
        let low_confidence = bill
            .extraction
            .confidence
            .is_some_and(|c| c < self.policy.low_confidence_threshold);
        let submitted_by = bill.user_id.clone();
        self.route_through_gate(bill, vendor.as_ref(), low_confidence, &submitted_by, now)
            .await
    }

    /// Applies one decision to an approval and carries the consequence onto
    /// the bill: finalized approvals approve (and possibly auto-pay) it,
    /// rejections end its lifecycle.
    pub async fn decide_approval(
        &self,
        approval_id: ApprovalId,
        step: u32,
        actor: &str,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<DecisionOutcome> {
        let now = Utc::now();
        let (approval, outcome) = self
            .approvals
            .decide(approval_id, step, actor, decision, notes, now)
            .await?;

        let mut bill = self
            .stores
            .bills
            .get(approval.bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bill", approval.bill_id))?;

        match outcome {
            ApprovalOutcome::Advanced { next_step } => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Approval,
                        approval.id,
                        AuditAction::Decided,
                        actor,
                        now,
                    )
                    .with_detail(format!("step {step} approved; now at step {next_step}")),
                );
            }
            ApprovalOutcome::FinalizedApproved => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Approval,
                        approval.id,
                        AuditAction::Approved,
                        actor,
                        now,
                    )
                    .with_detail(format!("finalized at step {step}")),
                );
                bill.approve(now)?;
                self.stores.bills.update(bill.clone()).await?;
                self.emit(AuditEvent::new(
                    EntityKind::Bill,
                    bill.id,
                    AuditAction::Approved,
                    actor,
                    now,
                ));
                self.try_auto_pay(&bill, now).await;
            }
            ApprovalOutcome::FinalizedRejected => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Approval,
                        approval.id,
                        AuditAction::Rejected,
                        actor,
                        now,
                    )
                    .with_detail(format!("rejected at step {step}")),
                );
                bill.reject(now)?;
                self.stores.bills.update(bill.clone()).await?;
                self.emit(AuditEvent::new(
                    EntityKind::Bill,
                    bill.id,
                    AuditAction::Rejected,
                    actor,
                    now,
                ));
            }
        }

        Ok(DecisionOutcome { approval, bill })
    }

    /// Schedules a payment for an approved bill. Duplicate schedules for
    /// the same (bill, method) pair collapse to the existing payment and
    /// emit nothing.
    pub async fn schedule_payment(
        &self,
        bill_id: BillId,
        method_id: PaymentMethodId,
        scheduled_date: Option<NaiveDate>,
    ) -> Result<PaymentOutcome> {
        let now = Utc::now();
        let before = self.stores.bills.get(bill_id).await?.map(|b| b.status);

        let result = self
            .dispatcher
            .schedule(bill_id, method_id, scheduled_date, now)
            .await;

        match &result {
            Ok(outcome) if !outcome.deduplicated => {
                let actor = self
                    .stores
                    .bills
                    .get(bill_id)
                    .await?
                    .map(|b| b.user_id)
                    .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
                self.emit(
                    AuditEvent::new(
                        EntityKind::Payment,
                        outcome.payment.id,
                        AuditAction::Scheduled,
                        actor,
                        now,
                    )
                    .with_detail(format!(
                        "{} via {}",
                        outcome.payment.amount, outcome.payment.method_kind
                    )),
                );
            }
            Ok(_) => {}
            Err(_) => {
                // Retry exhaustion disputes the bill inside the dispatcher;
                // surface that transition on the audit trail exactly once.
                if let Some(after) = self.stores.bills.get(bill_id).await?
                    && after.status == BillStatus::Disputed
                    && before != Some(BillStatus::Disputed)
                {
                    self.emit(
                        AuditEvent::new(
                            EntityKind::Bill,
                            bill_id,
                            AuditAction::Disputed,
                            SYSTEM_ACTOR,
                            now,
                        )
                        .with_detail("payment retries exhausted"),
                    );
                }
            }
        }
        result
    }

    /// Executes a scheduled payment. Losing a concurrent race reports the
    /// current record with `deduplicated` set and emits nothing.
    pub async fn execute_payment(&self, payment_id: PaymentId) -> Result<PaymentOutcome> {
        let now = Utc::now();
        let outcome = self.dispatcher.execute(payment_id, now).await?;
        if outcome.deduplicated {
            return Ok(outcome);
        }

        match outcome.payment.status {
            PaymentStatus::Completed => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Payment,
                        outcome.payment.id,
                        AuditAction::Completed,
                        SYSTEM_ACTOR,
                        now,
                    )
                    .with_detail(
                        outcome
                            .payment
                            .processor_reference
                            .clone()
                            .unwrap_or_default(),
                    ),
                );
                if let Some(bill) = &outcome.bill {
                    self.emit(AuditEvent::new(
                        EntityKind::Bill,
                        bill.id,
                        AuditAction::Paid,
                        SYSTEM_ACTOR,
                        now,
                    ));
                }
            }
            PaymentStatus::Processing => {
                self.emit(AuditEvent::new(
                    EntityKind::Payment,
                    outcome.payment.id,
                    AuditAction::Accepted,
                    SYSTEM_ACTOR,
                    now,
                ));
            }
            PaymentStatus::Failed => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Payment,
                        outcome.payment.id,
                        AuditAction::Failed,
                        SYSTEM_ACTOR,
                        now,
                    )
                    .with_detail(outcome.payment.last_error.clone().unwrap_or_default()),
                );
                if let Some(bill) = &outcome.bill {
                    self.emit(
                        AuditEvent::new(
                            EntityKind::Bill,
                            bill.id,
                            AuditAction::Disputed,
                            SYSTEM_ACTOR,
                            now,
                        )
                        .with_detail("payment retries exhausted"),
                    );
                }
            }
            PaymentStatus::Pending => {}
        }
        Ok(outcome)
    }

    /// Confirms a payment against the processor's settlement record.
    pub async fn reconcile_payment(
        &self,
        payment_id: PaymentId,
        status: ReconcileStatus,
    ) -> Result<PaymentOutcome> {
        let now = Utc::now();
        let outcome = self.dispatcher.reconcile(payment_id, status, now).await?;
        self.emit(
            AuditEvent::new(
                EntityKind::Payment,
                outcome.payment.id,
                AuditAction::Reconciled,
                SYSTEM_ACTOR,
                now,
            )
            .with_detail(outcome.payment.status.to_string()),
        );
        if let Some(bill) = &outcome.bill {
            self.emit(AuditEvent::new(
                EntityKind::Bill,
                bill.id,
                AuditAction::Paid,
                SYSTEM_ACTOR,
                now,
            ));
        }
        Ok(outcome)
    }

    /// Due-date sweep: marks past-due open bills overdue and escalates
    /// approvals that sat too long. Safe to run repeatedly; a second sweep
    /// over the same state changes nothing.
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let cutoff = now.date_naive();
        let mut outcome = SweepOutcome::default();

        for mut bill in self.stores.bills.list_open_due_before(cutoff).await? {
            if bill.status == BillStatus::Overdue {
                continue;
            }
            let payments = self.stores.payments.list_by_bill(bill.id).await?;
            if payments
                .iter()
                .any(|p| p.status == PaymentStatus::Completed)
            {
                continue;
            }
            bill.mark_overdue(now)?;
            self.stores.bills.update(bill.clone()).await?;
            self.emit(AuditEvent::new(
                EntityKind::Bill,
                bill.id,
                AuditAction::Overdue,
                SYSTEM_ACTOR,
                now,
            ));
            outcome.overdue.push(bill);
        }

        outcome.escalated = self.approvals.escalate_due(now).await?;
        for approval in &outcome.escalated {
            self.emit(
                AuditEvent::new(
                    EntityKind::Approval,
                    approval.id,
                    AuditAction::Escalated,
                    SYSTEM_ACTOR,
                    now,
                )
                .with_detail(format!("step {}", approval.current_step)),
            );
        }
        Ok(outcome)
    }

    /// Clears the vendor resolver's name cache.
    pub async fn reset_resolver_cache(&self) {
        self.resolver.clear_cache().await;
    }

    /// Decides whether the bill needs human approval, then either opens an
    /// approval or auto-approves.
    async fn route_through_gate(
        &self,
        mut bill: Bill,
        vendor: Option<&Vendor>,
        low_confidence: bool,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> Result<BillOutcome> {
        if self.approval_required(&bill, vendor, low_confidence).await? {
            bill.submit_for_approval(now)?;
            self.stores.bills.update(bill.clone()).await?;
            self.emit(AuditEvent::new(
                EntityKind::Bill,
                bill.id,
                AuditAction::Submitted,
                submitted_by,
                now,
            ));

            let approval = self
                .approvals
                .build(&bill, low_confidence, submitted_by, now)
                .await?;
            self.emit(
                AuditEvent::new(
                    EntityKind::Approval,
                    approval.id,
                    AuditAction::Created,
                    submitted_by,
                    now,
                )
                .with_detail(format!("{} steps", approval.total_steps)),
            );

            if approval.status == ApprovalStatus::Approved {
                // Every step auto-resolved at materialization.
                self.emit(AuditEvent::new(
                    EntityKind::Approval,
                    approval.id,
                    AuditAction::AutoApproved,
                    SYSTEM_ACTOR,
                    now,
                ));
                bill.approve(now)?;
                self.stores.bills.update(bill.clone()).await?;
                self.emit(AuditEvent::new(
                    EntityKind::Bill,
                    bill.id,
                    AuditAction::Approved,
                    SYSTEM_ACTOR,
                    now,
                ));
                self.try_auto_pay(&bill, now).await;
            }

            Ok(BillOutcome {
                bill,
                vendor: vendor.cloned(),
                approval: Some(approval),
            })
        } else {
            bill.approve(now)?;
            self.stores.bills.update(bill.clone()).await?;
            self.emit(AuditEvent::new(
                EntityKind::Bill,
                bill.id,
                AuditAction::AutoApproved,
                SYSTEM_ACTOR,
                now,
            ));
            self.try_auto_pay(&bill, now).await;
            Ok(BillOutcome {
                bill,
                vendor: vendor.cloned(),
                approval: None,
            })
        }
    }

    /// The approval gate: low extraction confidence, the vendor's own
    /// threshold, or any user workflow with a matching amount condition.
    async fn approval_required(
        &self,
        bill: &Bill,
        vendor: Option<&Vendor>,
        low_confidence: bool,
    ) -> Result<bool> {
        if low_confidence {
            return Ok(true);
        }
        if let Some(vendor) = vendor
            && vendor.approval_required
        {
            let default_threshold = Amount::new(self.policy.default_approval_threshold)?;
            if bill.total_amount >= vendor.effective_threshold(default_threshold) {
                return Ok(true);
            }
        }
        let workflows = self.stores.workflows.list_by_user(&bill.user_id).await?;
        Ok(workflows.iter().any(|w| {
            w.conditions.amount_threshold.is_some() && w.matches(bill.category, bill.total_amount)
        }))
    }

    /// Best-effort auto-pay for vendors that opted in: scheduling trouble
    /// is logged, never propagated into the approval that triggered it.
    async fn try_auto_pay(&self, bill: &Bill, now: DateTime<Utc>) {
        let Some(vendor_id) = bill.vendor_id else {
            return;
        };
        let vendor = match self.stores.vendors.get(vendor_id).await {
            Ok(Some(vendor)) => vendor,
            _ => return,
        };
        if !vendor.auto_pay {
            return;
        }
        let Some(method) = vendor.default_method() else {
            return;
        };
        match self.dispatcher.schedule(bill.id, method.id, None, now).await {
            Ok(outcome) if !outcome.deduplicated => {
                self.emit(
                    AuditEvent::new(
                        EntityKind::Payment,
                        outcome.payment.id,
                        AuditAction::Scheduled,
                        SYSTEM_ACTOR,
                        now,
                    )
                    .with_detail("auto-pay"),
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    bill = %bill.bill_number,
                    error = %err,
                    "auto-pay scheduling failed"
                );
            }
        }
    }

    async fn create_draft(
        &self,
        user_id: &str,
        fields: Option<ExtractedFields>,
        kind: DocumentType,
        filename: &str,
        now: DateTime<Utc>,
    ) -> Result<BillOutcome> {
        let meta = ExtractionMeta {
            ocr_text: fields.as_ref().and_then(|f| f.raw_text.clone()),
            confidence: fields.as_ref().map(|f| f.confidence),
            document_type: Some(kind),
            source_file: Some(filename.to_string()),
        };
        let issue_date = now.date_naive();
        let due_date = issue_date + TimeDelta::days(self.policy.default_due_days);
        let bill = Bill::draft(user_id, meta, issue_date, due_date, now);
        self.stores.bills.insert(bill.clone()).await?;
        self.emit(
            AuditEvent::new(EntityKind::Bill, bill.id, AuditAction::Created, user_id, now)
                .with_detail(format!("draft from {filename}; extraction unusable")),
        );
        Ok(BillOutcome {
            bill,
            vendor: None,
            approval: None,
        })
    }

    fn emit_vendor(&self, vendor: &Vendor, created: bool, actor: &str, now: DateTime<Utc>) {
        let action = if created {
            AuditAction::Created
        } else {
            AuditAction::Matched
        };
        self.emit(
            AuditEvent::new(EntityKind::Vendor, vendor.id, action, actor, now)
                .with_detail(vendor.name.clone()),
        );
    }

    fn emit(&self, event: AuditEvent) {
        self.events.record(event);
    }
}
