//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls and reconciler results into use-case level APIs.
//! - Keep CLI/host layers decoupled from storage details.

pub mod quote_service;
