//! Lead CRM: lead capture, booking confirmation and follow-up reminders.

pub mod api;
pub mod auth;
pub mod booking;
pub mod config;
pub mod error;
pub mod leads;
pub mod mail;
pub mod store;
pub mod worker;
