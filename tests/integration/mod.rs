//! Integration Tests Module
//!
//! End-to-end tests of the wizard service against an in-memory SQLite
//! database: sequencing through a whole step, reload and resume, and the
//! submission lifecycle.

// Shared harness and recording collaborators
mod support;

// Answering a step from first question to submission
mod wizard_flow_test;

// Reload, reconciliation and automatic resume of a submission
mod resume_test;

// Finalizer failures, retries and missing sessions
mod finalize_test;
