//! Domain entities, value objects and the ports the engine is wired with.

pub mod approval;
pub mod bill;
pub mod event;
pub mod extraction;
pub mod money;
pub mod payment;
pub mod ports;
pub mod vendor;
