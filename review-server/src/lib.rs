//! Document review service
//!
//! Originals are uploaded and mailed to a reviewer, drafts come back, an
//! approver promotes a draft over its original, and the approved document is
//! converted to PDF and mailed out as the final artifact.

pub mod api;
pub mod app;
pub mod config;
pub mod converter;
pub mod notifier;
pub mod reviewers;
pub mod store;
pub mod workflow;
