use crate::domain::money::Amount;
use crate::domain::payment::{ProcessorReceipt, ProcessorRequest, ReceiptStatus};
use crate::domain::ports::{PaymentProcessor, ProcessorRegistry};
use crate::domain::vendor::PaymentMethodKind;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn reference(prefix: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &token[..12])
}

/// ACH transfers: flat fee, settles in batches a few days later.
#[derive(Default, Clone, Copy)]
pub struct AchProcessor;

#[async_trait]
impl PaymentProcessor for AchProcessor {
    fn kind(&self) -> PaymentMethodKind {
        PaymentMethodKind::Ach
    }

    async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt> {
        tracing::debug!(token = %request.idempotency_token, "submitting ACH transfer");
        Ok(ProcessorReceipt {
            reference: reference("ACH"),
            status: ReceiptStatus::Accepted,
            fee: Some(Amount::new(dec!(0.25))?),
            estimated_delivery: Some(Utc::now().date_naive() + TimeDelta::days(3)),
        })
    }
}

/// Card charges: percentage fee plus a fixed part, settles immediately.
#[derive(Default, Clone, Copy)]
pub struct CardProcessor;

#[async_trait]
impl PaymentProcessor for CardProcessor {
    fn kind(&self) -> PaymentMethodKind {
        PaymentMethodKind::Card
    }

    async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt> {
        let fee = (request.amount.value() * dec!(0.029) + dec!(0.30)).round_dp(2);
        Ok(ProcessorReceipt {
            reference: reference("CARD"),
            status: ReceiptStatus::Completed,
            fee: Some(Amount::new(fee)?),
            estimated_delivery: None,
        })
    }
}

/// Wire transfers: expensive flat fee, lands next business day.
#[derive(Default, Clone, Copy)]
pub struct WireProcessor;

#[async_trait]
impl PaymentProcessor for WireProcessor {
    fn kind(&self) -> PaymentMethodKind {
        PaymentMethodKind::Wire
    }

    async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt> {
        tracing::debug!(token = %request.idempotency_token, "submitting wire transfer");
        Ok(ProcessorReceipt {
            reference: reference("WIRE"),
            status: ReceiptStatus::Accepted,
            fee: Some(Amount::new(dec!(25.00))?),
            estimated_delivery: Some(Utc::now().date_naive() + TimeDelta::days(1)),
        })
    }
}

/// Wallet payouts: percentage fee, settles immediately.
#[derive(Default, Clone, Copy)]
pub struct WalletProcessor;

#[async_trait]
impl PaymentProcessor for WalletProcessor {
    fn kind(&self) -> PaymentMethodKind {
        PaymentMethodKind::Wallet
    }

    async fn process(&self, request: ProcessorRequest) -> Result<ProcessorReceipt> {
        let fee = (request.amount.value() * dec!(0.01)).round_dp(2);
        Ok(ProcessorReceipt {
            reference: reference("WAL"),
            status: ReceiptStatus::Completed,
            fee: Some(Amount::new(fee)?),
            estimated_delivery: None,
        })
    }
}

/// Registry with one simulated processor per supported method kind.
pub fn default_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(AchProcessor));
    registry.register(Arc::new(CardProcessor));
    registry.register(Arc::new(WireProcessor));
    registry.register(Arc::new(WalletProcessor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;
    use crate::domain::vendor::PaymentMethod;
    use rust_decimal::Decimal;

    fn request(amount: Decimal) -> ProcessorRequest {
        ProcessorRequest {
            idempotency_token: "bill:method".to_string(),
            amount: Amount::new(amount).unwrap(),
            currency: Currency::default(),
            vendor_name: "Acme Corp".to_string(),
            method: PaymentMethod::new(PaymentMethodKind::Card),
            bill_reference: "BILL-1A2B3C4D".to_string(),
        }
    }

    #[tokio::test]
    async fn test_card_fee_is_percentage_plus_fixed() {
        let receipt = CardProcessor.process(request(dec!(100))).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Completed);
        assert_eq!(receipt.fee, Some(Amount::new(dec!(3.20)).unwrap()));
        assert!(receipt.reference.starts_with("CARD-"));
    }

    #[tokio::test]
    async fn test_ach_accepts_for_later_settlement() {
        let receipt = AchProcessor.process(request(dec!(100))).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Accepted);
        assert_eq!(receipt.fee, Some(Amount::new(dec!(0.25)).unwrap()));
        assert!(receipt.estimated_delivery.is_some());
    }

    #[tokio::test]
    async fn test_registry_covers_every_method_kind() {
        let registry = default_registry();
        for kind in [
            PaymentMethodKind::Ach,
            PaymentMethodKind::Card,
            PaymentMethodKind::Wire,
            PaymentMethodKind::Wallet,
        ] {
            let processor = registry.get(kind).expect("processor registered");
            assert_eq!(processor.kind(), kind);
        }
    }
}
