//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the GitHub API and an in-memory
//! SQLite store, and drive tasks and the task manager end-to-end.

mod harvest_tests;
mod manager_tests;
