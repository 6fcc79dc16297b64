//! CRM Insight Hub - dashboard and debugging proxy for the HighLevel CRM API
//!
//! This library provides the request monitor and analytics pipeline, the
//! rate-limit aware CRM client, and the HTTP surface that ties them together.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod ratelimit;
pub mod scoring;
pub mod upstream;
pub mod webhooks;
