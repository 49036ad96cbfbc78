use crate::domain::bill::Bill;
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the final report: the bill as the run left it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillRecord {
    pub bill: String,
    pub number: String,
    pub vendor: String,
    pub status: String,
    pub category: String,
    pub total: Decimal,
    pub currency: String,
    pub paid: Option<NaiveDate>,
}

impl BillRecord {
    pub fn new(label: impl Into<String>, bill: &Bill, vendor: Option<&str>) -> Self {
        Self {
            bill: label.into(),
            number: bill.bill_number.clone(),
            vendor: vendor.unwrap_or_default().to_string(),
            status: bill.status.to_string(),
            category: bill.category.to_string(),
            total: bill.total_amount.value(),
            currency: bill.currency.code().to_string(),
            paid: bill.paid_date,
        }
    }
}

const HEADER: [&str; 8] = [
    "bill", "number", "vendor", "status", "category", "total", "currency", "paid",
];

/// Writes the final bill report as CSV.
pub struct BillWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BillWriter<W> {
    /// Creates a new `BillWriter` wrapping any `Write` destination
    /// (e.g., Stdout, File, `Vec<u8>`).
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(destination),
        }
    }

    /// Writes the header and all records, then flushes the destination.
    /// An empty run still produces the header line.
    pub fn write_bills(&mut self, records: Vec<BillRecord>) -> Result<()> {
        self.writer.write_record(HEADER)?;
        for record in records {
            self.writer.serialize(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
