//! # Bindery
//!
//! Command-line front end for `bindery-core`: loads a project document,
//! applies the requested bindings and network mirrors, and reports the
//! outcome.

pub mod cli;
pub mod config;
pub mod project;
