//! Unit tests for the marketplace module.
