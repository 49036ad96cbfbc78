use crate::domain::money::Amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

/// Source document formats the engine accepts for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Image,
    Text,
    Email,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Text => "text",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "image" | "png" | "jpg" | "jpeg" => Ok(Self::Image),
            "text" | "txt" => Ok(Self::Text),
            "email" | "eml" => Ok(Self::Email),
            other => Err(EngineError::validation(format!(
                "unknown document type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Option<u32>,
    pub unit_price: Option<Amount>,
    pub total: Option<Amount>,
}

/// Everything an extraction provider could pull out of one document. Every
/// field is optional: providers report what they found and score the whole
/// read, they never guess.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub vendor_name: Option<String>,
    pub vendor_email: Option<String>,
    pub amount: Option<Amount>,
    pub tax_amount: Option<Amount>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub description: Option<String>,
    pub line_items: Vec<LineItem>,
    /// Overall confidence in the read, in `[0, 1]`.
    pub confidence: f64,
    /// Raw text recovered from the document, kept for manual completion
    /// when the structured read is too weak to act on.
    pub raw_text: Option<String>,
}

impl ExtractedFields {
    /// A read missing the vendor or the amount gives the engine nothing to
    /// build a bill from.
    pub fn is_usable(&self) -> bool {
        self.vendor_name.is_some() && self.amount.is_some()
    }
}
