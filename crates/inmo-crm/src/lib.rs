//! Client–property relationship core for a real-estate agency.
//!
//! The [`agency`] module holds the domain: contact identity rules, the property
//! sale state machine, the interaction ledger, the cascade rules fired by client
//! flag changes and the listing views built on top of them.

pub mod agency;
pub mod config;
pub mod error;
pub mod telemetry;
