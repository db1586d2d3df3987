//! Shared utilities, chiefly the timeout harness the test suites lean on.
pub mod testing;
