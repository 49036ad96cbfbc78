use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;

/// The operation kinds a batch file may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Define or update a vendor.
    Vendor,
    /// Ingest a document carried inline in the `value` column.
    Ingest,
    /// Create a bill from manual input.
    Manual,
    /// Approve the bill's awaiting approval step.
    Approve,
    /// Reject the bill's awaiting approval step.
    Reject,
    /// Schedule a payment for an approved bill.
    Schedule,
    /// Execute the bill's scheduled payment.
    Execute,
    /// Reconcile the bill's payment against the settlement result.
    Reconcile,
    /// Run the due-date sweep.
    Sweep,
}

/// One row of the operations file.
///
/// Which columns apply depends on `op`; the reader only deserializes, the
/// runner validates. `bill` carries a scenario-local label: bound by the
/// row that creates the bill, referenced by every later row touching it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BillOperation {
    pub op: OpKind,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bill: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub arg: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<BillOperation>`. It handles whitespace trimming and flexible
/// record lengths automatically, so trailing empty columns can be omitted.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations,
    /// so large batch files stream instead of loading whole.
    pub fn operations(self) -> impl Iterator<Item = Result<BillOperation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op,user,bill,actor,arg,value,notes\n\
                    vendor,user-1,,,Acme Corp,autopay;methods=ach,\n\
                    ingest,user-1,b1,,invoice.txt,Vendor: Acme Corp,";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<BillOperation>> = reader.operations().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.op, OpKind::Vendor);
        assert_eq!(first.arg.as_deref(), Some("Acme Corp"));
        assert!(first.bill.is_none());

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.op, OpKind::Ingest);
        assert_eq!(second.bill.as_deref(), Some("b1"));
    }

    #[test]
    fn test_reader_tolerates_short_rows() {
        let data = "op,user,bill,actor,arg,value,notes\nsweep";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<BillOperation>> = reader.operations().collect();

        assert_eq!(results.len(), 1);
        let op = results[0].as_ref().unwrap();
        assert_eq!(op.op, OpKind::Sweep);
        assert!(op.arg.is_none());
    }

    #[test]
    fn test_reader_malformed_op_kind() {
        let data = "op,user,bill,actor,arg,value,notes\nteleport,user-1,,,,,";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<BillOperation>> = reader.operations().collect();

        assert!(results[0].is_err());
    }
}
