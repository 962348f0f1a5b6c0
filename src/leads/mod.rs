//! Lead pipeline: data model, lifecycle service, email templates.

pub mod model;
pub mod service;
pub mod templates;

pub use model::{Lead, LeadAction, LeadFilter, LeadStats, LeadTag, NewLead};
pub use service::LeadService;
