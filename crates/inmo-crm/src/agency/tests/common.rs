use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::agency::records::AgencyRecords;
use crate::agency::{
    AgencyService, AgencyStore, ClientFlags, ClientProfile, ClientType, ClientUpdate,
    ContactChannel, ContactDetails, InMemoryAgencyStore, InteractionId, InterestStatus, NewClient,
    NewInteraction, PropertyDetails, PropertyId, RepositoryError,
};

pub(super) type MemoryService = AgencyService<InMemoryAgencyStore>;

pub(super) fn build_service() -> Arc<MemoryService> {
    Arc::new(AgencyService::new(Arc::new(InMemoryAgencyStore::new())))
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn profile(name: &str) -> ClientProfile {
    ClientProfile {
        client_type: ClientType::Particular,
        full_name: name.to_string(),
        company_name: String::new(),
        general_notes: String::new(),
        solvia_code: String::new(),
    }
}

pub(super) fn contacts(phones: &[&str], emails: &[&str]) -> ContactDetails {
    ContactDetails {
        phones: phones.iter().map(|phone| phone.to_string()).collect(),
        emails: emails.iter().map(|email| email.to_string()).collect(),
    }
}

pub(super) fn new_client(name: &str, phone: &str) -> NewClient {
    NewClient {
        profile: profile(name),
        contacts: contacts(&[phone], &[]),
    }
}

pub(super) fn interaction(code: &str, on: NaiveDate) -> NewInteraction {
    NewInteraction {
        property_code: code.to_string(),
        property: PropertyDetails::default(),
        contact_date: on,
        channel: ContactChannel::Telefono,
        status: InterestStatus::AmarilloNegociando,
        comments: String::new(),
        solvia_code: None,
    }
}

pub(super) fn typed_interaction(code: &str, property_type: &str, on: NaiveDate) -> NewInteraction {
    NewInteraction {
        property: PropertyDetails {
            property_type: property_type.to_string(),
            ..PropertyDetails::default()
        },
        ..interaction(code, on)
    }
}

/// An edit that keeps the profile and phone as created by [`new_client`].
pub(super) fn edit(name: &str, phone: &str, flags: ClientFlags) -> ClientUpdate {
    ClientUpdate {
        profile: profile(name),
        flags,
        contacts: contacts(&[phone], &[]),
        pre_venta: false,
        pre_sale_ids: Vec::new(),
        purchased_ids: Vec::new(),
    }
}

pub(super) fn buyer() -> ClientFlags {
    ClientFlags {
        posible_ocupa: false,
        comprador_final: true,
    }
}

pub(super) fn squatter() -> ClientFlags {
    ClientFlags {
        posible_ocupa: true,
        comprador_final: false,
    }
}

/// Property id recorded for an interaction.
pub(super) fn property_of(service: &MemoryService, interaction: InteractionId) -> PropertyId {
    service
        .store()
        .read(|records| records.interaction(interaction).map(|item| item.property_id))
        .expect("read")
        .expect("interaction exists")
}

pub(super) fn status_of(service: &MemoryService, interaction: InteractionId) -> InterestStatus {
    service
        .store()
        .read(|records| records.interaction(interaction).map(|item| item.status))
        .expect("read")
        .expect("interaction exists")
}

/// Store whose backend is gone; every call fails.
pub(super) struct UnavailableStore;

impl AgencyStore for UnavailableStore {
    fn read<T, F>(&self, _query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&AgencyRecords) -> T,
    {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    fn write<T, E, F>(&self, _unit_of_work: F) -> Result<T, E>
    where
        F: FnOnce(&mut AgencyRecords) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("offline".to_string()).into())
    }
}

pub(super) fn client_count(service: &MemoryService) -> usize {
    service
        .store()
        .read(|records| records.clients().count())
        .expect("read")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
