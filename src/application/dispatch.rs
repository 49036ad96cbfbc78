use crate::domain::bill::{Bill, BillId};
use crate::domain::payment::{
    ClaimOutcome, IdempotencyKey, Payment, PaymentId, PaymentStatus, ProcessorRequest,
    ReceiptStatus, ReconcileStatus,
};
use crate::domain::ports::{
    BillStoreRef, PaymentProcessor, PaymentStoreRef, ProcessorRegistry, VendorStoreRef,
};
use crate::domain::vendor::{MethodStatus, PaymentMethod, PaymentMethodId};
use crate::error::{EngineError, Result};
use crate::policy::EnginePolicy;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// How a dispatch operation ended. `deduplicated` marks calls that were
/// absorbed by an earlier schedule or a concurrent execute; `bill` carries
/// the bill only when this call transitioned it.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub deduplicated: bool,
    pub bill: Option<Bill>,
}

/// Moves money for approved bills, exactly once per (bill, method) pair.
///
/// Scheduling is made idempotent by the store's unique idempotency key;
/// execution by the atomic pending→processing claim. The dispatcher never
/// talks to a provider directly, it resolves the adapter from the registry
/// by method kind.
pub struct PaymentDispatcher {
    bills: BillStoreRef,
    vendors: VendorStoreRef,
    payments: PaymentStoreRef,
    processors: ProcessorRegistry,
    policy: Arc<EnginePolicy>,
}

impl PaymentDispatcher {
    pub fn new(
        bills: BillStoreRef,
        vendors: VendorStoreRef,
        payments: PaymentStoreRef,
        processors: ProcessorRegistry,
        policy: Arc<EnginePolicy>,
    ) -> Self {
        Self {
            bills,
            vendors,
            payments,
            processors,
            policy,
        }
    }

    /// Schedules a payment for a payable bill.
    ///
    /// A live payment for the same (bill, method) pair short-circuits to
    /// the existing record instead of failing; a failed one is re-armed for
    /// another attempt until the retry budget is spent, at which point the
    /// bill is marked disputed and scheduling refuses.
    pub async fn schedule(
        &self,
        bill_id: BillId,
        method_id: PaymentMethodId,
        scheduled_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let mut bill = self
            .bills
            .get(bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bill", bill_id))?;
        if !bill.is_payable() {
            return Err(EngineError::state_conflict(format!(
                "bill {} is not approved for payment",
                bill.bill_number
            )));
        }
        let vendor_id = bill
            .vendor_id
            .ok_or_else(|| EngineError::validation("bill has no vendor to pay"))?;
        let vendor = self
            .vendors
            .get(vendor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("vendor", vendor_id))?;
        let method = vendor
            .method(method_id)
            .ok_or_else(|| EngineError::not_found("payment method", method_id))?;
        if method.status != MethodStatus::Active {
            return Err(EngineError::state_conflict("payment method is disabled"));
        }

        let date = scheduled_date.unwrap_or_else(|| default_schedule_date(&bill, now));
        let key = IdempotencyKey::derive(bill.id, method.id);
        if let Some(mut existing) = self.payments.find_by_key(&key).await? {
            if existing.suppresses_duplicate() {
                return Ok(PaymentOutcome {
                    payment: existing,
                    deduplicated: true,
                    bill: None,
                });
            }
            if existing.attempts >= self.policy.max_payment_retries {
                bill.dispute(now)?;
                self.bills.update(bill.clone()).await?;
                return Err(EngineError::state_conflict(format!(
                    "payment retries exhausted for bill {}; bill disputed",
                    bill.bill_number
                )));
            }
            existing.rearm(date, now)?;
            self.payments.update(existing.clone()).await?;
            return Ok(PaymentOutcome {
                payment: existing,
                deduplicated: false,
                bill: None,
            });
        }

        let payment = Payment::schedule(&bill, method, date, now);
        match self.payments.insert(payment.clone()).await {
            Ok(()) => Ok(PaymentOutcome {
                payment,
                deduplicated: false,
                bill: None,
            }),
            Err(EngineError::StateConflict(_)) => {
                // Lost an insert race on the key; hand back the winner.
                let winner = self.payments.find_by_key(&key).await?.ok_or_else(|| {
                    EngineError::state_conflict("idempotency conflict with no stored payment")
                })?;
                Ok(PaymentOutcome {
                    payment: winner,
                    deduplicated: true,
                    bill: None,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Executes a scheduled payment through its processor.
    ///
    /// The store claim decides the winner under concurrency; losers get the
    /// current record and never reach a processor. Timeouts leave the
    /// payment processing for reconciliation and surface as a retryable
    /// processor error.
    pub async fn execute(
        &self,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let mut payment = match self.payments.claim(payment_id).await? {
            ClaimOutcome::AlreadyTaken(current) => {
                return Ok(PaymentOutcome {
                    payment: current,
                    deduplicated: true,
                    bill: None,
                });
            }
            ClaimOutcome::Claimed(payment) => payment,
        };

        let context = self.load_context(&payment).await;
        let (mut bill, vendor_name, method, processor) = match context {
            Ok(context) => context,
            Err(err) => {
                // Release the claim so a corrected caller can retry.
                payment.revert_to_pending(now);
                self.payments.update(payment).await?;
                return Err(err);
            }
        };

        let request = ProcessorRequest {
            idempotency_token: payment.idempotency_key.to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            vendor_name,
            method,
            bill_reference: bill.bill_number.clone(),
        };

        match tokio::time::timeout(self.policy.processor_timeout(), processor.process(request))
            .await
        {
            Err(_) => {
                payment.note_indeterminate(None, "processor call timed out", now);
                self.payments.update(payment).await?;
                Err(EngineError::processor(
                    "processor call timed out; payment left processing for reconciliation",
                    true,
                ))
            }
            Ok(Err(err)) => {
                payment.fail(err.to_string(), now);
                self.payments.update(payment.clone()).await?;
                let mut transitioned = None;
                if payment.attempts >= self.policy.max_payment_retries {
                    bill.dispute(now)?;
                    self.bills.update(bill.clone()).await?;
                    transitioned = Some(bill);
                }
                Ok(PaymentOutcome {
                    payment,
                    deduplicated: false,
                    bill: transitioned,
                })
            }
            Ok(Ok(receipt)) => match receipt.status {
                ReceiptStatus::Completed => {
                    payment.complete(receipt.reference, receipt.fee, now);
                    self.payments.update(payment.clone()).await?;
                    if let Err(err) = bill.mark_paid(now) {
                        tracing::warn!(
                            bill = %bill.bill_number,
                            error = %err,
                            "payment completed but bill could not transition to paid"
                        );
                        return Ok(PaymentOutcome {
                            payment,
                            deduplicated: false,
                            bill: None,
                        });
                    }
                    self.bills.update(bill.clone()).await?;
                    Ok(PaymentOutcome {
                        payment,
                        deduplicated: false,
                        bill: Some(bill),
                    })
                }
                ReceiptStatus::Accepted => {
                    payment.accept(receipt.reference, receipt.fee, now);
                    self.payments.update(payment.clone()).await?;
                    Ok(PaymentOutcome {
                        payment,
                        deduplicated: false,
                        bill: None,
                    })
                }
            },
        }
    }

    /// Confirms a payment against the processor's authoritative settlement
    /// record. Completed and failed payments only gain the reconciled flag.
    pub async fn reconcile(
        &self,
        payment_id: PaymentId,
        outcome: ReconcileStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let mut payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("payment", payment_id))?;

        match payment.status {
            PaymentStatus::Pending => Err(EngineError::state_conflict(format!(
                "payment {} has not been executed",
                payment.id
            ))),
            PaymentStatus::Processing => {
                payment.settle(outcome, now)?;
                self.payments.update(payment.clone()).await?;
                let mut transitioned = None;
                if outcome == ReconcileStatus::Completed
                    && let Some(mut bill) = self.bills.get(payment.bill_id).await?
                {
                    match bill.mark_paid(now) {
                        Ok(()) => {
                            self.bills.update(bill.clone()).await?;
                            transitioned = Some(bill);
                        }
                        Err(err) => tracing::warn!(
                            bill = %bill.bill_number,
                            error = %err,
                            "reconciled payment but bill could not transition to paid"
                        ),
                    }
                }
                Ok(PaymentOutcome {
                    payment,
                    deduplicated: false,
                    bill: transitioned,
                })
            }
            PaymentStatus::Completed | PaymentStatus::Failed => {
                payment.mark_reconciled(now);
                self.payments.update(payment.clone()).await?;
                Ok(PaymentOutcome {
                    payment,
                    deduplicated: false,
                    bill: None,
                })
            }
        }
    }

    async fn load_context(
        &self,
        payment: &Payment,
    ) -> Result<(Bill, String, PaymentMethod, Arc<dyn PaymentProcessor>)> {
        let bill = self
            .bills
            .get(payment.bill_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bill", payment.bill_id))?;
        if !bill.is_payable() {
            return Err(EngineError::state_conflict(format!(
                "bill {} is not approved for payment",
                bill.bill_number
            )));
        }
        let vendor_id = payment
            .vendor_id
            .ok_or_else(|| EngineError::validation("payment has no vendor"))?;
        let vendor = self
            .vendors
            .get(vendor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("vendor", vendor_id))?;
        let method = vendor
            .method(payment.method_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("payment method", payment.method_id))?;
        let processor = self.processors.get(payment.method_kind).ok_or_else(|| {
            EngineError::validation(format!(
                "no processor registered for {}",
                payment.method_kind
            ))
        })?;
        Ok((bill, vendor.name, method, processor))
    }
}

fn default_schedule_date(bill: &Bill, now: DateTime<Utc>) -> NaiveDate {
    bill.due_date.max(now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Currency};
    use crate::domain::payment::ProcessorReceipt;
    use crate::domain::ports::PaymentProcessor;
    use crate::domain::vendor::{PaymentMethod, PaymentMethodKind, Vendor};
    use crate::infrastructure::in_memory::{
        InMemoryBillStore, InMemoryPaymentStore, InMemoryVendorStore,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    /// Test double with a scripted response per call.
    struct ScriptedProcessor {
        kind: PaymentMethodKind,
        behavior: Behavior,
    }

    enum Behavior {
        Complete,
        Accept,
        Decline,
    }

    #[async_trait]
    impl PaymentProcessor for ScriptedProcessor {
        fn kind(&self) -> PaymentMethodKind {
            self.kind
        }

        async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt> {
            match self.behavior {
                Behavior::Complete => Ok(ProcessorReceipt {
                    reference: format!("REF-{}", request.bill_reference),
                    status: ReceiptStatus::Completed,
                    fee: Some(Amount::new(dec!(0.30)).unwrap()),
                    estimated_delivery: None,
                }),
                Behavior::Accept => Ok(ProcessorReceipt {
                    reference: format!("REF-{}", request.bill_reference),
                    status: ReceiptStatus::Accepted,
                    fee: None,
                    estimated_delivery: None,
                }),
                Behavior::Decline => Err(EngineError::processor("declined by provider", false)),
            }
        }
    }

    struct Fixture {
        dispatcher: PaymentDispatcher,
        bills: BillStoreRef,
        vendors: VendorStoreRef,
        payments: PaymentStoreRef,
        bill: Bill,
        method_id: PaymentMethodId,
    }

    async fn fixture(behavior: Behavior) -> Fixture {
        let bills: BillStoreRef = Arc::new(InMemoryBillStore::new());
        let vendors: VendorStoreRef = Arc::new(InMemoryVendorStore::new());
        let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());

        let now = Utc::now();
        let mut vendor = Vendor::new("user-1", "Acme Corp", now).unwrap();
        vendor.add_payment_method(PaymentMethod::new(PaymentMethodKind::Ach), now);
        let method_id = vendor.payment_methods[0].id;

        let mut bill = Bill::create(
            "user-1",
            Amount::new(dec!(250)).unwrap(),
            Amount::ZERO,
            Amount::ZERO,
            Currency::default(),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            now,
        )
        .unwrap();
        bill.vendor_id = Some(vendor.id);
        bill.approve(now).unwrap();

        vendors.insert(vendor).await.unwrap();
        bills.insert(bill.clone()).await.unwrap();

        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(ScriptedProcessor {
            kind: PaymentMethodKind::Ach,
            behavior,
        }));

        let policy = EnginePolicy {
            max_payment_retries: 2,
            ..Default::default()
        };
        let dispatcher = PaymentDispatcher::new(
            bills.clone(),
            vendors.clone(),
            payments.clone(),
            registry,
            Arc::new(policy),
        );
        Fixture {
            dispatcher,
            bills,
            vendors,
            payments,
            bill,
            method_id,
        }
    }

    #[tokio::test]
    async fn test_schedule_is_idempotent_per_bill_and_method() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let first = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        assert!(!first.deduplicated);

        let second = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        assert!(second.deduplicated);
        assert_eq!(second.payment.id, first.payment.id);
    }

    #[tokio::test]
    async fn test_schedule_requires_payable_bill() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let mut unapproved = Bill::create(
            "user-1",
            Amount::new(dec!(10)).unwrap(),
            Amount::ZERO,
            Amount::ZERO,
            Currency::default(),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            now,
        )
        .unwrap();
        unapproved.vendor_id = f.bill.vendor_id;
        f.bills.insert(unapproved.clone()).await.unwrap();

        let err = f
            .dispatcher
            .schedule(unapproved.id, f.method_id, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[tokio::test]
    async fn test_execute_completes_payment_and_pays_bill() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();

        let outcome = f
            .dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();
        assert!(!outcome.deduplicated);
        assert_eq!(outcome.payment.status, PaymentStatus::Completed);
        assert!(outcome.payment.processor_reference.is_some());
        assert_eq!(outcome.payment.fee, Some(Amount::new(dec!(0.30)).unwrap()));

        let bill = outcome.bill.expect("bill should have transitioned");
        assert_eq!(bill.status, crate::domain::bill::BillStatus::Paid);
        assert_eq!(bill.paid_date, Some(now.date_naive()));
    }

    #[tokio::test]
    async fn test_execute_twice_short_circuits() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        f.dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();

        let again = f
            .dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();
        assert!(again.deduplicated);
        assert_eq!(again.payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_accepted_receipt_leaves_payment_processing() {
        let f = fixture(Behavior::Accept).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();

        let outcome = f
            .dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();
        assert_eq!(outcome.payment.status, PaymentStatus::Processing);
        assert!(outcome.bill.is_none());

        let bill = f.bills.get(f.bill.id).await.unwrap().unwrap();
        assert_eq!(bill.status, crate::domain::bill::BillStatus::Approved);

        // Reconciliation settles it and pays the bill.
        let reconciled = f
            .dispatcher
            .reconcile(outcome.payment.id, ReconcileStatus::Completed, now)
            .await
            .unwrap();
        assert_eq!(reconciled.payment.status, PaymentStatus::Completed);
        assert!(reconciled.payment.reconciled);
        assert_eq!(
            reconciled.bill.unwrap().status,
            crate::domain::bill::BillStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_decline_consumes_attempts_then_disputes() {
        let f = fixture(Behavior::Decline).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();

        // First attempt: failed, bill stays approved.
        let first = f
            .dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();
        assert_eq!(first.payment.status, PaymentStatus::Failed);
        assert_eq!(first.payment.attempts, 1);
        assert!(first.bill.is_none());
        let bill = f.bills.get(f.bill.id).await.unwrap().unwrap();
        assert_eq!(bill.status, crate::domain::bill::BillStatus::Approved);

        // Re-arm and fail again: retry budget (2) is spent, bill disputed.
        let rearmed = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        assert!(!rearmed.deduplicated);
        assert_eq!(rearmed.payment.id, first.payment.id);
        let second = f
            .dispatcher
            .execute(rearmed.payment.id, now)
            .await
            .unwrap();
        assert_eq!(second.payment.attempts, 2);
        let bill = second.bill.expect("exhaustion should dispute the bill");
        assert_eq!(bill.status, crate::domain::bill::BillStatus::Disputed);

        // Further scheduling refuses.
        let err = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[tokio::test]
    async fn test_reconcile_requires_an_executed_payment() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();

        let err = f
            .dispatcher
            .reconcile(scheduled.payment.id, ReconcileStatus::Completed, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[tokio::test]
    async fn test_reconcile_completed_payment_only_sets_flag() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        let executed = f
            .dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap();
        assert!(!executed.payment.reconciled);

        let reconciled = f
            .dispatcher
            .reconcile(executed.payment.id, ReconcileStatus::Completed, now)
            .await
            .unwrap();
        assert!(reconciled.payment.reconciled);
        assert_eq!(reconciled.payment.status, PaymentStatus::Completed);
        assert!(reconciled.bill.is_none());
    }

    #[tokio::test]
    async fn test_missing_processor_releases_the_claim() {
        let f = fixture(Behavior::Complete).await;
        let now = Utc::now();
        // Same stores, empty registry.
        let dispatcher = PaymentDispatcher::new(
            f.bills.clone(),
            f.vendors.clone(),
            f.payments.clone(),
            ProcessorRegistry::new(),
            Arc::new(EnginePolicy::default()),
        );

        let scheduled = f
            .dispatcher
            .schedule(f.bill.id, f.method_id, None, now)
            .await
            .unwrap();
        let err = dispatcher
            .execute(scheduled.payment.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let payment = f
            .payments
            .get(scheduled.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending, "claim released");
    }
}
