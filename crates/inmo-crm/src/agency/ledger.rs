//! Interaction ledger: property resolution by external code, appending
//! interactions and single-field patches.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::domain::{ClientId, Interaction, InteractionId, InterestStatus, Property, PropertyId};
use super::records::AgencyRecords;
use super::store::RepositoryError;

/// Descriptive property fields supplied alongside an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PropertyDetails {
    #[serde(default)]
    #[validate(length(max = 80))]
    pub property_type: String,
    #[serde(default)]
    #[validate(length(max = 160))]
    pub address: String,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub municipality: String,
}

impl PropertyDetails {
    pub fn trimmed(&self) -> Self {
        Self {
            property_type: self.property_type.trim().to_string(),
            address: self.address.trim().to_string(),
            municipality: self.municipality.trim().to_string(),
        }
    }

    /// Populates a freshly created property.
    pub fn fill(&self, property: &mut Property) {
        let details = self.trimmed();
        property.property_type = details.property_type;
        property.address = details.address;
        property.municipality = details.municipality;
    }

    /// Overwrites a field only when the incoming value is non-blank; never blanks
    /// out what is already stored. Returns whether anything changed.
    pub fn backfill(&self, property: &mut Property) -> bool {
        let details = self.trimmed();
        let mut changed = false;
        for (incoming, stored) in [
            (details.property_type, &mut property.property_type),
            (details.address, &mut property.address),
            (details.municipality, &mut property.municipality),
        ] {
            if !incoming.is_empty() && *stored != incoming {
                *stored = incoming;
                changed = true;
            }
        }
        changed
    }
}

impl AgencyRecords {
    /// Resolves a property by its exact code. A new property takes the supplied
    /// details; an existing one is backfilled with the non-blank ones.
    pub fn create_or_update_property(
        &mut self,
        code: &str,
        details: &PropertyDetails,
    ) -> Result<PropertyId, RepositoryError> {
        if let Some(id) = self.property_by_code(code).map(|property| property.id) {
            if let Some(property) = self.property_mut(id) {
                details.backfill(property);
            }
            return Ok(id);
        }
        self.create_property(code, details)
    }

    /// Resolves a property by code, reusing an existing one untouched.
    pub fn find_or_create_property(
        &mut self,
        code: &str,
        details: &PropertyDetails,
    ) -> Result<PropertyId, RepositoryError> {
        match self.property_by_code(code) {
            Some(property) => Ok(property.id),
            None => self.create_property(code, details),
        }
    }

    pub fn create_property(
        &mut self,
        code: &str,
        details: &PropertyDetails,
    ) -> Result<PropertyId, RepositoryError> {
        let id = self.insert_property(code)?;
        let property = self.property_mut(id).ok_or(RepositoryError::NotFound)?;
        details.fill(property);
        Ok(id)
    }
}

/// A single-field update of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum InteractionPatch {
    Status(InterestStatus),
    /// Stored untrimmed so inline markup survives.
    Comments(String),
    /// Trimmed; blank clears the ticket.
    TicketCode(String),
    NdaRequested(bool),
}

impl InteractionPatch {
    pub const fn field(&self) -> &'static str {
        match self {
            InteractionPatch::Status(_) => "status",
            InteractionPatch::Comments(_) => "comments",
            InteractionPatch::TicketCode(_) => "ticket_code",
            InteractionPatch::NdaRequested(_) => "nda_requested",
        }
    }

    pub fn apply(self, interaction: &mut Interaction) {
        match self {
            InteractionPatch::Status(status) => interaction.status = status,
            InteractionPatch::Comments(comments) => {
                interaction.comments = if comments.trim().is_empty() {
                    String::new()
                } else {
                    comments
                };
            }
            InteractionPatch::TicketCode(code) => {
                let code = code.trim();
                interaction.ticket_code = if code.is_empty() {
                    None
                } else {
                    Some(code.to_string())
                };
            }
            InteractionPatch::NdaRequested(requested) => interaction.nda_requested = requested,
        }
    }
}

/// Raised when a patch names an interaction of a different client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interaction {interaction} does not belong to client {client}")]
pub struct OwnershipMismatch {
    pub interaction: InteractionId,
    pub client: ClientId,
}

pub fn ensure_owner(interaction: &Interaction, client: ClientId) -> Result<(), OwnershipMismatch> {
    if interaction.client_id == client {
        Ok(())
    } else {
        Err(OwnershipMismatch {
            interaction: interaction.id,
            client,
        })
    }
}

/// Ledger order: newest contact date first, later id first on the same date.
pub fn sort_newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &Interaction,
{
    items.sort_by_key(|item| Reverse(key(item).recency()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agency::domain::{ContactChannel, PropertyId};
    use chrono::NaiveDate;

    fn interaction(id: u64, date: (i32, u32, u32)) -> Interaction {
        Interaction {
            id: InteractionId(id),
            client_id: ClientId(1),
            property_id: PropertyId(1),
            contact_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            channel: ContactChannel::Web,
            status: InterestStatus::VerdePensando,
            comments: String::new(),
            nda_requested: false,
            ticket_code: None,
            solvia_code: None,
        }
    }

    #[test]
    fn backfill_ignores_blank_values() {
        let mut property = Property::new(PropertyId(1), "SOL-001");
        PropertyDetails {
            property_type: "Flat".to_string(),
            address: "Calle Mayor 1".to_string(),
            municipality: String::new(),
        }
        .fill(&mut property);

        let changed = PropertyDetails {
            property_type: "  ".to_string(),
            address: String::new(),
            municipality: " Valencia ".to_string(),
        }
        .backfill(&mut property);

        assert!(changed);
        assert_eq!(property.property_type, "Flat");
        assert_eq!(property.address, "Calle Mayor 1");
        assert_eq!(property.municipality, "Valencia");
        assert!(!PropertyDetails::default().backfill(&mut property));
    }

    #[test]
    fn existing_property_is_backfilled_by_code() {
        let mut records = AgencyRecords::default();
        let details = PropertyDetails {
            property_type: "Flat".to_string(),
            ..PropertyDetails::default()
        };
        let first = records
            .create_or_update_property("SOL-001", &details)
            .expect("create");
        let second = records
            .create_or_update_property(
                "SOL-001",
                &PropertyDetails {
                    address: "Calle Mayor 1".to_string(),
                    ..PropertyDetails::default()
                },
            )
            .expect("update");

        assert_eq!(first, second);
        let property = records.property(first).expect("stored");
        assert_eq!(property.property_type, "Flat");
        assert_eq!(property.address, "Calle Mayor 1");
    }

    #[test]
    fn find_or_create_leaves_existing_property_alone() {
        let mut records = AgencyRecords::default();
        let id = records
            .create_property("SOL-002", &PropertyDetails::default())
            .expect("create");
        let found = records
            .find_or_create_property(
                "SOL-002",
                &PropertyDetails {
                    municipality: "Valencia".to_string(),
                    ..PropertyDetails::default()
                },
            )
            .expect("found");
        assert_eq!(found, id);
        assert_eq!(records.property(id).expect("stored").municipality, "");
    }

    #[test]
    fn comment_patch_preserves_markup() {
        let mut item = interaction(1, (2024, 5, 2));
        InteractionPatch::Comments("  <mark>call back</mark><br> ".to_string()).apply(&mut item);
        assert_eq!(item.comments, "  <mark>call back</mark><br> ");

        InteractionPatch::Comments("   ".to_string()).apply(&mut item);
        assert_eq!(item.comments, "");
    }

    #[test]
    fn blank_ticket_clears_code() {
        let mut item = interaction(1, (2024, 5, 2));
        InteractionPatch::TicketCode(" TCK-9 ".to_string()).apply(&mut item);
        assert_eq!(item.ticket_code.as_deref(), Some("TCK-9"));
        InteractionPatch::TicketCode(" ".to_string()).apply(&mut item);
        assert_eq!(item.ticket_code, None);
    }

    #[test]
    fn patch_deserializes_from_field_and_value() {
        let patch: InteractionPatch =
            serde_json::from_str(r#"{"field":"status","value":"AZUL_VISITA_REALIZADA"}"#)
                .expect("valid patch");
        assert_eq!(
            patch,
            InteractionPatch::Status(InterestStatus::AzulVisitaRealizada)
        );
        assert!(serde_json::from_str::<InteractionPatch>(r#"{"field":"colour","value":1}"#).is_err());
    }

    #[test]
    fn ownership_is_checked_against_stated_client() {
        let item = interaction(5, (2024, 5, 2));
        assert!(ensure_owner(&item, ClientId(1)).is_ok());
        let err = ensure_owner(&item, ClientId(2)).expect_err("mismatch");
        assert_eq!(err.interaction, InteractionId(5));
    }

    #[test]
    fn newest_first_breaks_date_ties_by_id() {
        let mut items = vec![
            interaction(1, (2024, 5, 2)),
            interaction(3, (2024, 4, 30)),
            interaction(2, (2024, 5, 2)),
        ];
        sort_newest_first(&mut items, |item| item);
        let ids: Vec<u64> = items.iter().map(|item| item.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
