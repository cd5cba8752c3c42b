//! AcheiUmPro: service marketplace backend.
//!
//! Clients post service requests, providers bid on them, and accepted bids
//! turn into scheduled appointments. This crate holds the proposal
//! resolution workflow, the request status state machine, the notification
//! outbox, and the HTTP surface over them.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, webhooks, tokens)
//!
//! # Modules
//!
//! - [`marketplace`]: Requests, proposals, appointments, and notifications
//! - [`http`]: `axum` routes and error mapping
//! - [`config`]: Environment configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod http;
pub mod marketplace;
pub mod telemetry;
