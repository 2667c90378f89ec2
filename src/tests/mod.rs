//! Test suite for the builder core
//!
//! This module organizes tests into logical groups, one per layer, plus
//! property tests and an end-to-end session.

#[cfg(test)]
mod hook_tests;
#[cfg(test)]
mod document_tests;
#[cfg(test)]
mod inbound_tests;
