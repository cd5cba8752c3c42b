//! Service marketplace workflows for AcheiUmPro.
//!
//! Clients post service requests, providers bid on them with proposals, and
//! clients resolve those proposals. Accepting a proposal assigns the request
//! to its provider; the provider then drives the request through the status
//! state machine while every change notifies the counterpart through a
//! transactional outbox. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
