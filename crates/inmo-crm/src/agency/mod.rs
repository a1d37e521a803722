//! Client–property relationship engine of the agency.
//!
//! Contacts are guarded for phone uniqueness, properties move through a small sale
//! state machine, interactions form an append-only ledger, and changes to a client's
//! commercial flags cascade onto both. Listings are computed from committed records.

pub mod cascade;
pub mod contacts;
pub mod domain;
pub mod input;
pub mod ledger;
pub mod listing;
pub mod property;
pub mod records;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use cascade::{compute_side_effects, CascadeError, CascadeSelections, FlagChange, Mutation};
pub use contacts::{normalize_phone, DuplicatePhoneError, PhoneConflict};
pub use domain::{
    Client, ClientFlags, ClientId, ClientType, ContactChannel, Email, Interaction, InteractionId,
    InterestStatus, Phone, Property, PropertyId, SaleFilter, SearchField, UnknownCode,
};
pub use input::{
    ClientProfile, ClientUpdate, ContactDetails, ContactRegistration, NewClient, NewInteraction,
    PropertyDetailsUpdate, PropertyDraft, SaleToggle,
};
pub use ledger::{InteractionPatch, OwnershipMismatch, PropertyDetails};
pub use listing::{
    ClientDetail, ClientRow, ClientRowFilter, DateRange, InteractionFilter, InteractionRow,
    PropertyRow,
};
pub use property::SaleState;
pub use records::AgencyRecords;
pub use router::{agency_router, ClientRowQuery, InteractionQuery, PropertyQuery};
pub use service::{
    AgencyError, AgencyService, ClientUpdateOutcome, PropertyStateChange, Registration,
};
pub use store::{AgencyStore, InMemoryAgencyStore, RepositoryError};
