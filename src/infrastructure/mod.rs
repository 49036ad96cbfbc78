//! Adapter implementations of the domain ports: storage backends, the
//! document extractor, simulated payment processors, access control and
//! audit sinks.

pub mod access;
pub mod audit;
pub mod extraction;
pub mod in_memory;
pub mod processors;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
