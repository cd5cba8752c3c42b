//! Adapter implementations for marketplace ports.

pub mod dispatch;
pub mod jwt;
pub mod memory;
pub mod postgres;
