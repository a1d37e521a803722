//! Arena of agency records keyed by identifier.
//!
//! Relations are plain ids; the query functions below resolve them and hand back
//! owned values or shared borrows, never references that outlive the records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::contacts::{EmailSlots, PhoneOwnership, PhoneSlots};
use super::domain::{
    Client, ClientId, Email, EmailId, Interaction, InteractionId, Phone, PhoneId, Property,
    PropertyId,
};
use super::ledger::sort_newest_first;
use super::store::RepositoryError;

#[derive(Debug, Clone, Default)]
pub struct AgencyRecords {
    clients: BTreeMap<ClientId, Client>,
    phones: BTreeMap<PhoneId, Phone>,
    emails: BTreeMap<EmailId, Email>,
    properties: BTreeMap<PropertyId, Property>,
    interactions: BTreeMap<InteractionId, Interaction>,
    /// Unique index over normalized phone numbers.
    phone_index: HashMap<String, PhoneId>,
    /// Unique index over property codes.
    code_index: HashMap<String, PropertyId>,
    sequence: u64,
}

impl AgencyRecords {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    // --- clients -------------------------------------------------------------

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> + '_ {
        self.clients.values()
    }

    /// Inserts a client built by `build` from its newly assigned id.
    pub fn insert_client<F>(&mut self, build: F) -> ClientId
    where
        F: FnOnce(ClientId) -> Client,
    {
        let id = ClientId(self.next_id());
        let mut client = build(id);
        client.id = id;
        self.clients.insert(id, client);
        id
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    // --- phones and emails ---------------------------------------------------

    /// Phones for a set of clients, each list ordered by slot.
    pub fn phones_for(&self, clients: &BTreeSet<ClientId>) -> BTreeMap<ClientId, Vec<Phone>> {
        let mut grouped: BTreeMap<ClientId, Vec<Phone>> = BTreeMap::new();
        for phone in self.phones.values() {
            if clients.contains(&phone.client_id) {
                grouped.entry(phone.client_id).or_default().push(phone.clone());
            }
        }
        for list in grouped.values_mut() {
            list.sort_by_key(|phone| (phone.position, phone.id));
        }
        grouped
    }

    /// Emails for a set of clients, each list ordered by slot.
    pub fn emails_for(&self, clients: &BTreeSet<ClientId>) -> BTreeMap<ClientId, Vec<Email>> {
        let mut grouped: BTreeMap<ClientId, Vec<Email>> = BTreeMap::new();
        for email in self.emails.values() {
            if clients.contains(&email.client_id) {
                grouped.entry(email.client_id).or_default().push(email.clone());
            }
        }
        for list in grouped.values_mut() {
            list.sort_by_key(|email| (email.position, email.id));
        }
        grouped
    }

    /// Writes every phone slot of `client`: filled slots are inserted or updated,
    /// empty slots drop whatever was stored there.
    ///
    /// Fails with [`RepositoryError::Conflict`] if a number is indexed for another
    /// client; the caller's unit of work is then discarded.
    pub fn replace_phones(
        &mut self,
        client: ClientId,
        slots: &PhoneSlots,
    ) -> Result<(), RepositoryError> {
        let current: BTreeMap<u8, PhoneId> = self
            .phones
            .values()
            .filter(|phone| phone.client_id == client)
            .map(|phone| (phone.position, phone.id))
            .collect();
        for id in current.values() {
            if let Some(phone) = self.phones.get(id) {
                self.phone_index.remove(&phone.number);
            }
        }

        for position in 1..=super::contacts::PHONE_SLOTS as u8 {
            let existing = current.get(&position).copied();
            let Some(number) = slots.get(position) else {
                if let Some(id) = existing {
                    self.phones.remove(&id);
                }
                continue;
            };
            if self.phone_index.contains_key(number) {
                return Err(RepositoryError::Conflict(format!(
                    "phone number {number} is already indexed"
                )));
            }
            let id = match existing {
                Some(id) => id,
                None => PhoneId(self.next_id()),
            };
            self.phone_index.insert(number.to_string(), id);
            self.phones.insert(
                id,
                Phone {
                    id,
                    client_id: client,
                    number: number.to_string(),
                    position,
                },
            );
        }
        Ok(())
    }

    pub fn replace_emails(&mut self, client: ClientId, slots: &EmailSlots) {
        for position in 1..=super::contacts::EMAIL_SLOTS as u8 {
            let existing = self
                .emails
                .values()
                .find(|email| email.client_id == client && email.position == position)
                .map(|email| email.id);

            match (existing, slots.get(position)) {
                (None, None) => {}
                (Some(id), None) => {
                    self.emails.remove(&id);
                }
                (existing, Some(address)) => {
                    let id = match existing {
                        Some(id) => id,
                        None => EmailId(self.next_id()),
                    };
                    self.emails.insert(
                        id,
                        Email {
                            id,
                            client_id: client,
                            address: address.to_string(),
                            position,
                        },
                    );
                }
            }
        }
    }

    // --- properties ----------------------------------------------------------

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(&id)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(&id)
    }

    pub fn property_by_code(&self, code: &str) -> Option<&Property> {
        self.code_index
            .get(code)
            .and_then(|id| self.properties.get(id))
    }

    /// Properties ordered by their external code.
    pub fn properties_by_code(&self) -> Vec<&Property> {
        let mut properties: Vec<&Property> = self.properties.values().collect();
        properties.sort_by(|a, b| a.property_code.cmp(&b.property_code).then(a.id.cmp(&b.id)));
        properties
    }

    pub fn properties_sold_to(&self, client: ClientId) -> Vec<&Property> {
        self.properties
            .values()
            .filter(|property| property.is_sold() && property.sold_client() == Some(client))
            .collect()
    }

    pub fn insert_property(&mut self, code: &str) -> Result<PropertyId, RepositoryError> {
        if self.code_index.contains_key(code) {
            return Err(RepositoryError::Conflict(format!(
                "property code {code} already exists"
            )));
        }
        let id = PropertyId(self.next_id());
        self.code_index.insert(code.to_string(), id);
        self.properties.insert(id, Property::new(id, code));
        Ok(id)
    }

    /// Renames a property, keeping the code index unique.
    pub fn recode_property(&mut self, id: PropertyId, code: &str) -> Result<(), RepositoryError> {
        match self.code_index.get(code) {
            Some(holder) if *holder != id => {
                return Err(RepositoryError::Conflict(format!(
                    "property code {code} already exists"
                )))
            }
            Some(_) => return Ok(()),
            None => {}
        }
        let property = self.properties.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        self.code_index.remove(&property.property_code);
        property.property_code = code.to_string();
        self.code_index.insert(code.to_string(), id);
        Ok(())
    }

    /// Number of interactions recorded against each property.
    pub fn interest_counts(&self) -> HashMap<PropertyId, usize> {
        let mut counts = HashMap::new();
        for interaction in self.interactions.values() {
            *counts.entry(interaction.property_id).or_insert(0) += 1;
        }
        counts
    }

    // --- interactions --------------------------------------------------------

    pub fn interaction(&self, id: InteractionId) -> Option<&Interaction> {
        self.interactions.get(&id)
    }

    pub fn interaction_mut(&mut self, id: InteractionId) -> Option<&mut Interaction> {
        self.interactions.get_mut(&id)
    }

    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> + '_ {
        self.interactions.values()
    }

    /// A client's interactions in ledger order.
    pub fn interactions_of(&self, client: ClientId) -> Vec<&Interaction> {
        let mut items: Vec<&Interaction> = self
            .interactions
            .values()
            .filter(|interaction| interaction.client_id == client)
            .collect();
        sort_newest_first(&mut items, |item| item);
        items
    }

    /// Appends an interaction built from its newly assigned id.
    pub fn insert_interaction<F>(&mut self, build: F) -> InteractionId
    where
        F: FnOnce(InteractionId) -> Interaction,
    {
        let id = InteractionId(self.next_id());
        let mut interaction = build(id);
        interaction.id = id;
        self.interactions.insert(id, interaction);
        id
    }
}

impl PhoneOwnership for AgencyRecords {
    fn phone_owner(&self, normalized: &str) -> Option<ClientId> {
        self.phone_index
            .get(normalized)
            .and_then(|id| self.phones.get(id))
            .map(|phone| phone.client_id)
    }
}
