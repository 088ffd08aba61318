//! Kbpress - a knowledge-base article publishing pipeline
//!
//! This library ingests HTML article bundles exported from an authoring
//! tool, validates them against tag/attribute/link whitelists, and rewrites
//! embedded hyperlinks and image references for a publish stage.

pub mod config;
pub mod models;
pub mod services;
