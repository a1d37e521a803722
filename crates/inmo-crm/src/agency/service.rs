use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use super::cascade::{
    compute_side_effects, CascadeError, CascadeSelections, ClientPortfolio, FlagChange, Mutation,
};
use super::contacts::{check_phones, DuplicatePhoneError};
use super::domain::{
    Client, ClientId, Interaction, InteractionId, Property, PropertyId, SaleFilter, UnknownCode,
};
use super::input::{
    ClientUpdate, ContactRegistration, NewClient, NewInteraction, PropertyDetailsUpdate,
    PropertyDraft, SaleToggle,
};
use super::ledger::{ensure_owner, InteractionPatch, OwnershipMismatch};
use super::listing::{
    self, ClientDetail, ClientRow, ClientRowFilter, InteractionFilter, InteractionRow, PropertyRow,
};
use super::records::AgencyRecords;
use super::store::{AgencyStore, RepositoryError};

/// Facade over the agency store. Every mutating call is one unit of work: the guard,
/// the cascade and the writes it implies commit together or not at all.
pub struct AgencyService<S> {
    store: Arc<S>,
}

impl<S> Clone for AgencyService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Identifiers created by the contact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub client_id: ClientId,
    pub property_id: PropertyId,
    pub interaction_id: InteractionId,
}

/// Result of a client edit, including the cascade it triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientUpdateOutcome {
    pub client: Client,
    pub mutations: Vec<Mutation>,
}

/// Property after a sale or reservation toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyStateChange {
    pub property: Property,
    pub changed: bool,
}

impl<S> AgencyService<S>
where
    S: AgencyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn create_client(&self, new_client: NewClient) -> Result<ClientId, AgencyError> {
        new_client.validate()?;
        let phones = new_client.contacts.phone_slots();
        let emails = new_client.contacts.email_slots();

        let id = self.store.write(|records| {
            guard_phones(records, &phones, None)?;
            let id = records.insert_client(|id| {
                let mut client = Client::new(id);
                new_client.profile.apply_to(&mut client);
                client
            });
            records.replace_phones(id, &phones)?;
            records.replace_emails(id, &emails);
            Ok::<_, AgencyError>(id)
        })?;

        info!(client_id = %id, "client created");
        Ok(id)
    }

    /// Saves a client edit and runs the cascade rules for its flag changes.
    pub fn update_client(
        &self,
        id: ClientId,
        update: ClientUpdate,
    ) -> Result<ClientUpdateOutcome, AgencyError> {
        update.validate()?;
        let phones = update.contacts.phone_slots();
        let emails = update.contacts.email_slots();
        let selections = CascadeSelections {
            pre_venta: update.pre_venta,
            pre_sale_ids: update.pre_sale_ids.clone(),
            purchased_ids: update.purchased_ids.clone(),
        };

        let outcome = self.store.write(|records| {
            let previous = records
                .client(id)
                .map(|client| client.flags)
                .ok_or(AgencyError::NotFound {
                    entity: "client",
                    id: id.0,
                })?;
            guard_phones(records, &phones, Some(id))?;

            let change = FlagChange {
                previous,
                next: update.flags,
            };
            let portfolio = ClientPortfolio::collect(records, id, &selections)?;
            let mutations = compute_side_effects(id, change, &selections, &portfolio)?;
            for mutation in &mutations {
                records.apply(*mutation)?;
            }

            let client = records.client_mut(id).ok_or(RepositoryError::NotFound)?;
            update.profile.apply_to(client);
            client.flags = update.flags;
            let client = client.clone();

            records.replace_phones(id, &phones)?;
            records.replace_emails(id, &emails);
            Ok::<_, AgencyError>(ClientUpdateOutcome { client, mutations })
        })?;

        info!(
            client_id = %id,
            mutations = outcome.mutations.len(),
            "client updated"
        );
        Ok(outcome)
    }

    /// The contact form: client, contacts, property and first interaction together.
    pub fn register_contact(
        &self,
        registration: ContactRegistration,
    ) -> Result<Registration, AgencyError> {
        registration.validate()?;
        let phones = registration.contacts.phone_slots();
        let emails = registration.contacts.email_slots();

        let created = self.store.write(|records| {
            guard_phones(records, &phones, None)?;
            let client_id = records.insert_client(|id| {
                let mut client = Client::new(id);
                registration.client.apply_to(&mut client);
                client
            });
            records.replace_phones(client_id, &phones)?;
            records.replace_emails(client_id, &emails);

            let interaction = &registration.interaction;
            let property_id =
                records.find_or_create_property(&interaction.code(), &interaction.property)?;
            let interaction_id = append_interaction(records, client_id, property_id, interaction);
            Ok::<_, AgencyError>(Registration {
                client_id,
                property_id,
                interaction_id,
            })
        })?;

        info!(
            client_id = %created.client_id,
            property_id = %created.property_id,
            "contact registered"
        );
        Ok(created)
    }

    /// Appends an interaction, creating or backfilling its property by code.
    pub fn record_interaction(
        &self,
        client_id: ClientId,
        interaction: NewInteraction,
    ) -> Result<InteractionId, AgencyError> {
        interaction.validate()?;

        let id = self.store.write(|records| {
            if records.client(client_id).is_none() {
                return Err(AgencyError::NotFound {
                    entity: "client",
                    id: client_id.0,
                });
            }
            let property_id =
                records.create_or_update_property(&interaction.code(), &interaction.property)?;
            Ok(append_interaction(records, client_id, property_id, &interaction))
        })?;

        info!(client_id = %client_id, interaction_id = %id, "interaction recorded");
        Ok(id)
    }

    /// Changes one field of one interaction after checking it belongs to `client_id`.
    pub fn patch_interaction(
        &self,
        client_id: ClientId,
        interaction_id: InteractionId,
        patch: InteractionPatch,
    ) -> Result<Interaction, AgencyError> {
        patch.validate()?;
        let field = patch.field();

        let updated = self.store.write(|records| {
            let interaction =
                records
                    .interaction_mut(interaction_id)
                    .ok_or(AgencyError::NotFound {
                        entity: "interaction",
                        id: interaction_id.0,
                    })?;
            ensure_owner(interaction, client_id)?;
            patch.apply(interaction);
            Ok::<_, AgencyError>(interaction.clone())
        });

        match &updated {
            Ok(_) => debug!(%client_id, %interaction_id, field, "interaction patched"),
            Err(AgencyError::OwnershipMismatch(_)) => {
                warn!(%client_id, %interaction_id, "patch rejected: interaction owned by another client")
            }
            Err(_) => {}
        }
        updated
    }

    pub fn set_property_sold(
        &self,
        property_id: PropertyId,
        toggle: SaleToggle,
    ) -> Result<PropertyStateChange, AgencyError> {
        let change = self.toggle_property(property_id, toggle, |property, client, enabled| {
            property.toggle_sold(client, enabled)
        })?;
        info!(
            %property_id,
            client_id = %toggle.client_id,
            sold = toggle.enabled,
            changed = change.changed,
            "property sale toggled"
        );
        Ok(change)
    }

    pub fn set_property_pre_sold(
        &self,
        property_id: PropertyId,
        toggle: SaleToggle,
    ) -> Result<PropertyStateChange, AgencyError> {
        let change = self.toggle_property(property_id, toggle, |property, client, enabled| {
            property.toggle_pre_sold(client, enabled)
        })?;
        info!(
            %property_id,
            client_id = %toggle.client_id,
            pre_sold = toggle.enabled,
            changed = change.changed,
            "property reservation toggled"
        );
        Ok(change)
    }

    fn toggle_property<F>(
        &self,
        property_id: PropertyId,
        toggle: SaleToggle,
        transition: F,
    ) -> Result<PropertyStateChange, AgencyError>
    where
        F: FnOnce(&mut Property, ClientId, bool) -> bool,
    {
        self.store.write(|records| {
            if records.client(toggle.client_id).is_none() {
                return Err(AgencyError::NotFound {
                    entity: "client",
                    id: toggle.client_id.0,
                });
            }
            let property = records
                .property_mut(property_id)
                .ok_or(AgencyError::NotFound {
                    entity: "property",
                    id: property_id.0,
                })?;
            let changed = transition(property, toggle.client_id, toggle.enabled);
            Ok(PropertyStateChange {
                property: property.clone(),
                changed,
            })
        })
    }

    pub fn list_client_rows(&self, filter: &ClientRowFilter) -> Result<Vec<ClientRow>, AgencyError> {
        Ok(self
            .store
            .read(|records| listing::build_client_rows(records, filter))?)
    }

    pub fn list_interactions(
        &self,
        filter: &InteractionFilter,
    ) -> Result<Vec<InteractionRow>, AgencyError> {
        Ok(self
            .store
            .read(|records| listing::list_interactions(records, filter))?)
    }

    pub fn client_detail(&self, id: ClientId) -> Result<ClientDetail, AgencyError> {
        self.store
            .read(|records| listing::client_detail(records, id))?
            .ok_or(AgencyError::NotFound {
                entity: "client",
                id: id.0,
            })
    }

    pub fn list_properties(
        &self,
        query: Option<&str>,
        sale: SaleFilter,
    ) -> Result<Vec<PropertyRow>, AgencyError> {
        Ok(self
            .store
            .read(|records| listing::list_properties(records, query, sale))?)
    }

    pub fn available_properties(&self) -> Result<Vec<Property>, AgencyError> {
        Ok(self.store.read(listing::available_properties)?)
    }

    pub fn create_property(&self, draft: PropertyDraft) -> Result<Property, AgencyError> {
        draft.validate()?;
        let code = draft.property_code.trim().to_string();

        let property = self.store.write(|records| {
            if records.property_by_code(&code).is_some() {
                return Err(AgencyError::DuplicatePropertyCode(code.clone()));
            }
            let id = records.create_property(&code, &draft.details)?;
            records
                .property(id)
                .cloned()
                .ok_or(AgencyError::Repository(RepositoryError::NotFound))
        })?;

        info!(property_id = %property.id, code = %property.property_code, "property created");
        Ok(property)
    }

    pub fn update_property_details(
        &self,
        id: PropertyId,
        details: PropertyDetailsUpdate,
    ) -> Result<Property, AgencyError> {
        details.validate()?;
        let code = details.code();
        self.store.write(|records| {
            if records.property(id).is_none() {
                return Err(AgencyError::NotFound {
                    entity: "property",
                    id: id.0,
                });
            }
            if let Some(code) = &code {
                if records
                    .property_by_code(code)
                    .is_some_and(|holder| holder.id != id)
                {
                    return Err(AgencyError::DuplicatePropertyCode(code.clone()));
                }
                records.recode_property(id, code)?;
            }
            let property = records.property_mut(id).ok_or(RepositoryError::NotFound)?;
            details.apply_to(property);
            Ok(property.clone())
        })
    }
}

fn guard_phones(
    records: &AgencyRecords,
    phones: &super::contacts::PhoneSlots,
    editing: Option<ClientId>,
) -> Result<(), AgencyError> {
    check_phones(phones, editing, records).map_err(|err| {
        warn!(owner = ?err.owner(), editing = ?editing, "duplicate phone rejected");
        AgencyError::DuplicatePhone(err)
    })
}

fn append_interaction(
    records: &mut AgencyRecords,
    client_id: ClientId,
    property_id: PropertyId,
    interaction: &NewInteraction,
) -> InteractionId {
    records.insert_interaction(|id| Interaction {
        id,
        client_id,
        property_id,
        contact_date: interaction.contact_date,
        channel: interaction.channel,
        status: interaction.status,
        comments: interaction.comments.clone(),
        nda_requested: false,
        ticket_code: None,
        solvia_code: interaction.solvia_code(),
    })
}

/// Error raised by the agency service.
#[derive(Debug, thiserror::Error)]
pub enum AgencyError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    DuplicatePhone(#[from] DuplicatePhoneError),
    #[error("property code {0} already exists")]
    DuplicatePropertyCode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error(transparent)]
    OwnershipMismatch(#[from] OwnershipMismatch),
    #[error(transparent)]
    Cascade(#[from] CascadeError),
    #[error(transparent)]
    Filter(#[from] UnknownCode),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
