pub mod bill_writer;
pub mod operation_reader;
