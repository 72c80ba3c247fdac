// system-tests/src/lib.rs
// ============================================================================
// Module: MLDB System Tests Library
// Description: Shared configuration for end-to-end scenario runs.
// Purpose: Provide common settings for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the system-tests binaries in
//! `system-tests/tests`. Suites run against an in-process stub service unless
//! an external MLDB URL is configured.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
