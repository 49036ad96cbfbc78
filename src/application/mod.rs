//! Application layer containing the bill lifecycle orchestration.
//!
//! This module defines the `BillEngine`, the primary entry point for every
//! operation on bills, and its collaborators: the vendor resolver, the
//! categorizer, the approval engine and the payment dispatcher. Each
//! collaborator owns one stage of the pipeline and talks to storage through
//! the domain ports only.

pub mod approval;
pub mod categorize;
pub mod dispatch;
pub mod engine;
pub mod resolver;
