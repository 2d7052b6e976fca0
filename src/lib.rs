//! marketlead - marketplace feed crawler.
//!
//! Walks newest-first vehicle feeds city by city, extracts each listing,
//! and delivers the freshly-posted ones to a webhook as leads.

pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod scrapers;
pub mod server;
pub mod services;
pub mod storage;
