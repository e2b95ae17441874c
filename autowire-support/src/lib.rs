//! # Autowire Support
//!
//! Shared utilities for the autowire DI crates.
//!
//! This crate provides:
//! - Text rendering for breadcrumbs and nested error messages
//! - "Did you mean?" suggestions for unknown identifiers

pub mod rendering;
