//! Shared test utilities for deckscore integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `DeckService` to a temp upload directory, an
//!   in-memory database and a scripted completion client
//! - Fixture builders for PDF and PPTX documents and submissions

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{collect_events, ScriptedClient, TestHarness};
