use crate::domain::bill::{ExpenseCategory, UserId};
use crate::domain::money::Amount;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type VendorId = Uuid;
pub type PaymentMethodId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    /// Auto-created from a document and not yet confirmed by a human.
    #[default]
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Ach,
    Card,
    Wire,
    Wallet,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ach => "ach",
            Self::Card => "card",
            Self::Wire => "wire",
            Self::Wallet => "wallet",
        }
    }
}

impl fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethodKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ach" => Ok(Self::Ach),
            "card" => Ok(Self::Card),
            "wire" => Ok(Self::Wire),
            "wallet" => Ok(Self::Wallet),
            other => Err(EngineError::validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    #[default]
    Active,
    Disabled,
}

/// A way to pay a particular vendor. Provider-specific routing data stays
/// opaque to the engine; processors interpret `details` themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub kind: PaymentMethodKind,
    pub details: serde_json::Value,
    pub is_default: bool,
    pub status: MethodStatus,
}

impl PaymentMethod {
    pub fn new(kind: PaymentMethodKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            details: serde_json::Value::Null,
            is_default: false,
            status: MethodStatus::Active,
        }
    }
}

/// A payee as one user sees it. Vendors are scoped per user: two users
/// receiving invoices from the same company hold independent records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub user_id: UserId,
    pub name: String,
    /// Lowercased, whitespace-collapsed form used for matching.
    pub normalized_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub status: VendorStatus,
    pub category: Option<ExpenseCategory>,
    pub payment_methods: Vec<PaymentMethod>,
    pub approval_required: bool,
    /// Bills at or above this total require approval even when the vendor
    /// is otherwise trusted. `None` defers to the engine-wide default.
    pub approval_threshold: Option<Amount>,
    pub auto_pay: bool,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn new(user_id: impl Into<UserId>, name: &str, now: DateTime<Utc>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("vendor name must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.to_string(),
            normalized_name: normalize_name(name),
            email: None,
            phone: None,
            address: None,
            tax_id: None,
            status: VendorStatus::Pending,
            category: None,
            payment_methods: Vec::new(),
            approval_required: false,
            approval_threshold: None,
            auto_pay: false,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("vendor name must not be empty"));
        }
        self.name = name.to_string();
        self.normalized_name = normalize_name(name);
        self.updated_at = now;
        Ok(())
    }

    /// Records that a document from this vendor was seen.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.updated_at = now;
    }

    /// Adds a payment method. The first method becomes the default; an
    /// explicitly-default method displaces the previous default.
    pub fn add_payment_method(&mut self, mut method: PaymentMethod, now: DateTime<Utc>) {
        if self.payment_methods.is_empty() {
            method.is_default = true;
        } else if method.is_default {
            for existing in &mut self.payment_methods {
                existing.is_default = false;
            }
        }
        self.payment_methods.push(method);
        self.updated_at = now;
    }

    pub fn default_method(&self) -> Option<&PaymentMethod> {
        self.payment_methods
            .iter()
            .filter(|m| m.status == MethodStatus::Active)
            .find(|m| m.is_default)
    }

    pub fn method(&self, id: PaymentMethodId) -> Option<&PaymentMethod> {
        self.payment_methods.iter().find(|m| m.id == id)
    }

    pub fn method_of_kind(&self, kind: PaymentMethodKind) -> Option<&PaymentMethod> {
        self.payment_methods
            .iter()
            .filter(|m| m.status == MethodStatus::Active)
            .find(|m| m.kind == kind)
    }

    /// The approval threshold in force for this vendor.
    pub fn effective_threshold(&self, engine_default: Amount) -> Amount {
        self.approval_threshold.unwrap_or(engine_default)
    }
}

/// Canonical form used for vendor matching: lowercase, single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
