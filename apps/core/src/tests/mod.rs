//! Test Module
//!
//! Cross-module test suite for the TalkMate core.
//!
//! ## Test Categories
//! - `brain_tests`: scanner, router and trend behavior on the shipped data
//! - `supervisor_tests`: turn orchestration with a scripted LLM and sink
//! - `integration_tests`: full turns over HTTP and the on-disk turn log

pub mod brain_tests;
