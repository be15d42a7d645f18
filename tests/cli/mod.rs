//! CLI command integration tests
//!
//! Runs the `uiver` binary; only commands that exit on their own
//! (`init --W`, `promote`, help/version) are exercised here.
