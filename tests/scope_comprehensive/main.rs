//! Scope Comprehensive Test Suite
//!
//! End-to-end coverage of ambient session scopes over the in-memory backend.
//!
//! ## Modules
//!
//! - `scenarios`: the canonical nesting walkthroughs
//! - `nesting`: join vs. create, read-only rules, suppression, locator
//! - `failures`: provider and commit failures, out-of-order disposal
//! - `transactions`: isolation levels and explicit transactions
//! - `configuration`: `ambit.toml` driven behaviour
//! - `closures`: the `run` / `run_read_only` helpers
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test scope_comprehensive
//!
//! # One module
//! cargo test --test scope_comprehensive failures::
//!
//! # With lifecycle logs
//! cargo test --test scope_comprehensive -- --nocapture
//! ```

#[path = "../common/mod.rs"]
mod common;

mod closures;
mod configuration;
mod failures;
mod scenarios;
mod transactions;
