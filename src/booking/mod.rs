//! External scheduler integration: event lookups and webhook payloads.

pub mod calendly;
pub mod webhook;

pub use calendly::{CalendlyClient, EventLookup};
pub use webhook::{InviteeBooking, WebhookEnvelope};
