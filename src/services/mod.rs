//! Service layer: time parsing, lead delivery and run orchestration.
//!
//! Services are shared by the CLI and the HTTP server.

pub mod orchestrator;
pub mod relative_time;
pub mod scheduler;
pub mod webhook;

pub use orchestrator::{Engine, EngineStatus, RunSummary, RunTotals};
pub use relative_time::{parse_relative_offset, parse_relative_time};
pub use scheduler::Scheduler;
pub use webhook::{lead_sink, DeliveryError, LeadSink, LogOnlySink, WebhookClient};
