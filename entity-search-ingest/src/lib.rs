//! # Entity Search Ingest
//!
//! This crate provides the write side of the entity search service:
//! receiving entity lifecycle events and applying them to the index store.
//!
//! ## Architecture
//!
//! 1. **Receiver**: Validates inbound events and resolves the tenant
//! 2. **Coordinator**: Applies create/update/delete idempotently by version
//! 3. **Janitor**: Purges tombstones once their retention window has passed

pub mod coordinator;
pub mod janitor;
pub mod receiver;

pub use coordinator::{IndexCoordinator, IndexOutcome, IndexPolicy};
pub use janitor::TombstoneJanitor;
pub use receiver::{
    BatchOperationResult, BatchOperationSummary, EntityChangeReceiver, EventResponse,
    ReceiverConfig,
};
