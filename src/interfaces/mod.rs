//! Inbound and outbound interfaces: the CSV batch surface and the runner
//! that interprets operation rows against the engine.

pub mod csv;
pub mod runner;
