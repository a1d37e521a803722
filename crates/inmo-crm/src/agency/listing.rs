//! Read-only views: the per-client last interaction, the client and interaction
//! listings, the property catalog and the client detail page.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::contacts::{phone_digits, EMAIL_SLOTS, PHONE_SLOTS};
use super::domain::{
    Client, ClientId, ClientType, ContactChannel, Email, Interaction, InteractionId,
    InterestStatus, Phone, Property, PropertyId, SaleFilter, SearchField, UnknownCode,
};
use super::property::SaleState;
use super::records::AgencyRecords;

/// Most recent interaction of every client that has one: latest contact date,
/// ties broken by the highest id.
pub fn last_interaction_per_client(records: &AgencyRecords) -> BTreeMap<ClientId, &Interaction> {
    let mut latest: BTreeMap<ClientId, &Interaction> = BTreeMap::new();
    for interaction in records.interactions() {
        latest
            .entry(interaction.client_id)
            .and_modify(|current| {
                if interaction.recency() > current.recency() {
                    *current = interaction;
                }
            })
            .or_insert(interaction);
    }
    latest
}

/// `ALL`, blank or absent disable the filter; any other value must name a client type.
pub fn parse_client_type_filter(raw: Option<&str>) -> Result<Option<ClientType>, UnknownCode> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(value) => value.parse::<ClientType>().map(Some),
    }
}

/// Inclusive contact-date bounds. A missing date never satisfies a set bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn admits(&self, date: Option<NaiveDate>) -> bool {
        match (self.from, self.to, date) {
            (None, None, _) => true,
            (_, _, None) => false,
            (from, to, Some(date)) => {
                from.map_or(true, |from| date >= from) && to.map_or(true, |to| date <= to)
            }
        }
    }
}

/// Lower-cased free-text needle plus its digits for loose phone matching.
#[derive(Debug, Clone)]
struct TextQuery {
    needle: String,
    digits: String,
}

impl TextQuery {
    fn new(raw: Option<&str>) -> Option<Self> {
        let needle = raw?.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let digits = phone_digits(&needle);
        Some(Self { needle, digits })
    }

    fn text(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }

    /// Matches an enum code as written (`rosa_descarta`) and as words (`rosa descarta`).
    fn code(&self, code: &str) -> bool {
        let raw = code.to_lowercase();
        raw.contains(&self.needle) || raw.replace('_', " ").contains(&self.needle)
    }

    fn phone(&self, number: &str) -> bool {
        self.text(number) || (!self.digits.is_empty() && phone_digits(number).contains(&self.digits))
    }
}

// --- client rows ----------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRowFilter {
    pub query: Option<String>,
    pub client_type: Option<ClientType>,
    pub range: DateRange,
}

/// Last interaction of a client together with its property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastContact {
    pub interaction_id: InteractionId,
    pub contact_date: NaiveDate,
    pub channel: ContactChannel,
    pub status: InterestStatus,
    pub property_id: PropertyId,
    pub property_code: String,
    pub property_type: String,
    pub address: String,
    pub municipality: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRow {
    pub client_id: ClientId,
    pub client_type: ClientType,
    pub full_name: String,
    pub general_notes: String,
    pub solvia_code: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub last_contact: Option<LastContact>,
}

impl ClientRow {
    fn last_contact_date(&self) -> Option<NaiveDate> {
        self.last_contact.as_ref().map(|last| last.contact_date)
    }

    fn matches(&self, query: &TextQuery) -> bool {
        let own = query.text(&self.full_name)
            || query.text(&self.solvia_code)
            || query.text(&self.general_notes)
            || query.code(self.client_type.code());
        let last = self.last_contact.as_ref().is_some_and(|last| {
            query.code(last.status.code())
                || query.code(last.channel.code())
                || query.text(&last.property_code)
                || query.text(&last.property_type)
                || query.text(&last.address)
                || query.text(&last.municipality)
        });
        own || last
            || self.phones.iter().any(|phone| query.phone(phone))
            || self.emails.iter().any(|email| query.text(email))
    }
}

/// Client listing: every client with its contacts and last interaction, filtered by
/// type, last-contact date range and free text, newest contact first (clients without
/// interactions last), then by descending client id.
pub fn build_client_rows(records: &AgencyRecords, filter: &ClientRowFilter) -> Vec<ClientRow> {
    let latest = last_interaction_per_client(records);
    let ids: BTreeSet<ClientId> = records.clients().map(|client| client.id).collect();
    let mut phones = records.phones_for(&ids);
    let mut emails = records.emails_for(&ids);
    let query = TextQuery::new(filter.query.as_deref());

    let mut rows: Vec<ClientRow> = records
        .clients()
        .map(|client| ClientRow {
            client_id: client.id,
            client_type: client.client_type,
            full_name: client.full_name.clone(),
            general_notes: client.general_notes.clone(),
            solvia_code: client.solvia_code.clone(),
            phones: numbers(phones.remove(&client.id)),
            emails: addresses(emails.remove(&client.id)),
            last_contact: latest
                .get(&client.id)
                .map(|interaction| last_contact(records, interaction)),
        })
        .filter(|row| filter.client_type.map_or(true, |wanted| row.client_type == wanted))
        .filter(|row| filter.range.admits(row.last_contact_date()))
        .filter(|row| query.as_ref().map_or(true, |query| row.matches(query)))
        .collect();

    rows.sort_by(|a, b| {
        let by_date = match (a.last_contact_date(), b.last_contact_date()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then(b.client_id.cmp(&a.client_id))
    });
    rows
}

fn last_contact(records: &AgencyRecords, interaction: &Interaction) -> LastContact {
    let property = records.property(interaction.property_id);
    let field = |pick: fn(&Property) -> &String| property.map(pick).cloned().unwrap_or_default();
    LastContact {
        interaction_id: interaction.id,
        contact_date: interaction.contact_date,
        channel: interaction.channel,
        status: interaction.status,
        property_id: interaction.property_id,
        property_code: field(|p| &p.property_code),
        property_type: field(|p| &p.property_type),
        address: field(|p| &p.address),
        municipality: field(|p| &p.municipality),
    }
}

fn numbers(phones: Option<Vec<Phone>>) -> Vec<String> {
    phones
        .unwrap_or_default()
        .into_iter()
        .map(|phone| phone.number)
        .filter(|number| !number.trim().is_empty())
        .collect()
}

fn addresses(emails: Option<Vec<Email>>) -> Vec<String> {
    emails
        .unwrap_or_default()
        .into_iter()
        .map(|email| email.address)
        .filter(|address| !address.trim().is_empty())
        .collect()
}

// --- interaction rows -----------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionFilter {
    /// Empty means every status.
    pub statuses: Vec<InterestStatus>,
    pub channel: Option<ContactChannel>,
    pub query: Option<String>,
    pub search_field: SearchField,
    pub range: DateRange,
    pub nda_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionRow {
    pub interaction_id: InteractionId,
    pub contact_date: NaiveDate,
    pub channel: ContactChannel,
    pub status: InterestStatus,
    pub comments: String,
    pub nda_requested: bool,
    pub ticket_code: Option<String>,
    pub solvia_code: Option<String>,
    pub client_id: ClientId,
    pub client_name: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub property_id: PropertyId,
    pub property_code: String,
    pub property_type: String,
    pub address: String,
    pub municipality: String,
}

impl InteractionRow {
    fn matches(&self, query: &TextQuery, field: SearchField) -> bool {
        let client = || {
            query.text(&self.client_name)
                || self.phones.iter().any(|phone| query.phone(phone))
                || self.emails.iter().any(|email| query.text(email))
        };
        let property = || {
            query.text(&self.property_code)
                || query.text(&self.property_type)
                || query.text(&self.address)
                || query.text(&self.municipality)
        };
        let comments = || query.text(&self.comments);
        let labels = || query.code(self.status.code()) || query.code(self.channel.code());
        let reference = || {
            self.solvia_code.as_deref().is_some_and(|code| query.text(code))
                || self.ticket_code.as_deref().is_some_and(|code| query.text(code))
        };

        match field {
            SearchField::All => client() || property() || comments() || reference() || labels(),
            SearchField::Client => client(),
            SearchField::Property => property(),
            SearchField::Comments => comments(),
            SearchField::Reference => reference(),
        }
    }
}

/// Interaction listing, newest first. Contacts of the clients involved are fetched
/// in one batch.
pub fn list_interactions(records: &AgencyRecords, filter: &InteractionFilter) -> Vec<InteractionRow> {
    let selected: Vec<&Interaction> = records
        .interactions()
        .filter(|interaction| {
            filter.statuses.is_empty() || filter.statuses.contains(&interaction.status)
        })
        .filter(|interaction| filter.channel.map_or(true, |channel| interaction.channel == channel))
        .filter(|interaction| filter.range.admits(Some(interaction.contact_date)))
        .filter(|interaction| !filter.nda_only || interaction.nda_requested)
        .collect();

    let ids: BTreeSet<ClientId> = selected.iter().map(|interaction| interaction.client_id).collect();
    let phones = records.phones_for(&ids);
    let emails = records.emails_for(&ids);
    let query = TextQuery::new(filter.query.as_deref());

    let mut rows: Vec<InteractionRow> = selected
        .into_iter()
        .map(|interaction| {
            let client = records.client(interaction.client_id);
            let property = records.property(interaction.property_id);
            let property_field =
                |pick: fn(&Property) -> &String| property.map(pick).cloned().unwrap_or_default();
            InteractionRow {
                interaction_id: interaction.id,
                contact_date: interaction.contact_date,
                channel: interaction.channel,
                status: interaction.status,
                comments: interaction.comments.clone(),
                nda_requested: interaction.nda_requested,
                ticket_code: interaction.ticket_code.clone(),
                solvia_code: interaction.solvia_code.clone(),
                client_id: interaction.client_id,
                client_name: client.map(|c| c.full_name.clone()).unwrap_or_default(),
                phones: numbers(phones.get(&interaction.client_id).cloned()),
                emails: addresses(emails.get(&interaction.client_id).cloned()),
                property_id: interaction.property_id,
                property_code: property_field(|p| &p.property_code),
                property_type: property_field(|p| &p.property_type),
                address: property_field(|p| &p.address),
                municipality: property_field(|p| &p.municipality),
            }
        })
        .filter(|row| {
            query
                .as_ref()
                .map_or(true, |query| row.matches(query, filter.search_field))
        })
        .collect();

    rows.sort_by(|a, b| {
        b.contact_date
            .cmp(&a.contact_date)
            .then(b.interaction_id.cmp(&a.interaction_id))
    });
    rows
}

// --- property catalog -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRow {
    #[serde(flatten)]
    pub property: Property,
    pub sale_state: SaleState,
    /// Number of interactions recorded against the property.
    pub interest_count: usize,
}

/// Catalog ordered by property code, filtered by code/address/municipality/type text
/// and by sale state.
pub fn list_properties(
    records: &AgencyRecords,
    query: Option<&str>,
    sale: SaleFilter,
) -> Vec<PropertyRow> {
    let query = TextQuery::new(query);
    let counts = records.interest_counts();
    records
        .properties_by_code()
        .into_iter()
        .filter(|property| match sale {
            SaleFilter::All => true,
            SaleFilter::Sold => property.is_sold(),
            SaleFilter::Active => !property.is_sold(),
        })
        .filter(|property| {
            query.as_ref().map_or(true, |query| {
                query.text(&property.property_code)
                    || query.text(&property.address)
                    || query.text(&property.municipality)
                    || query.text(&property.property_type)
            })
        })
        .map(|property| PropertyRow {
            property: property.clone(),
            sale_state: property.sale_state(),
            interest_count: counts.get(&property.id).copied().unwrap_or(0),
        })
        .collect()
}

/// Properties that can still be reserved or bought.
pub fn available_properties(records: &AgencyRecords) -> Vec<Property> {
    records
        .properties_by_code()
        .into_iter()
        .filter(|property| !property.is_sold())
        .cloned()
        .collect()
}

// --- client detail --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionWithProperty {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub property_code: String,
    pub property_type: String,
    pub address: String,
    pub municipality: String,
    pub sale_state: Option<SaleState>,
}

/// Pre-sale and purchase selections derived from the current property states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub pre_venta: bool,
    pub pre_sale_ids: Vec<PropertyId>,
    pub purchased_ids: Vec<PropertyId>,
}

/// Prefill for the next interaction of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NextInteractionDefaults {
    pub channel: ContactChannel,
    pub status: InterestStatus,
    pub property_code: String,
    pub property_type: String,
    pub address: String,
    pub municipality: String,
    pub solvia_code: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDetail {
    pub client: Client,
    /// One entry per slot, `None` when empty.
    pub phones: Vec<Option<String>>,
    pub emails: Vec<Option<String>>,
    pub interactions: Vec<InteractionWithProperty>,
    pub selection: SelectionState,
    pub next_interaction: NextInteractionDefaults,
}

pub fn client_detail(records: &AgencyRecords, id: ClientId) -> Option<ClientDetail> {
    let client = records.client(id)?.clone();
    let ids = BTreeSet::from([id]);

    let mut phones = vec![None; PHONE_SLOTS];
    for phone in records.phones_for(&ids).remove(&id).unwrap_or_default() {
        if let Some(slot) = usize::from(phone.position).checked_sub(1).and_then(|i| phones.get_mut(i)) {
            *slot = Some(phone.number);
        }
    }
    let mut emails = vec![None; EMAIL_SLOTS];
    for email in records.emails_for(&ids).remove(&id).unwrap_or_default() {
        if let Some(slot) = usize::from(email.position).checked_sub(1).and_then(|i| emails.get_mut(i)) {
            *slot = Some(email.address);
        }
    }

    let ledger = records.interactions_of(id);
    let properties: Vec<&Property> = {
        let mut seen = BTreeSet::new();
        ledger
            .iter()
            .filter(|interaction| seen.insert(interaction.property_id))
            .filter_map(|interaction| records.property(interaction.property_id))
            .collect()
    };

    let pre_sale_ids: Vec<PropertyId> = properties
        .iter()
        .filter(|property| property.is_pre_vendido() && !property.is_sold())
        .map(|property| property.id)
        .collect();
    let purchased_ids: Vec<PropertyId> = if client.flags.comprador_final {
        properties
            .iter()
            .filter(|property| property.is_sold())
            .map(|property| property.id)
            .collect()
    } else {
        Vec::new()
    };
    let selection = SelectionState {
        pre_venta: !pre_sale_ids.is_empty(),
        pre_sale_ids,
        purchased_ids,
    };

    let mut next_interaction = NextInteractionDefaults {
        solvia_code: client.solvia_code.trim().to_string(),
        phone: phones[0].clone().unwrap_or_default(),
        email: emails[0].clone().unwrap_or_default(),
        ..NextInteractionDefaults::default()
    };
    if let Some(last) = ledger.first() {
        next_interaction.channel = last.channel;
        next_interaction.status = last.status;
        if let Some(property) = records.property(last.property_id) {
            for (value, target) in [
                (&property.property_code, &mut next_interaction.property_code),
                (&property.property_type, &mut next_interaction.property_type),
                (&property.address, &mut next_interaction.address),
                (&property.municipality, &mut next_interaction.municipality),
            ] {
                if !value.trim().is_empty() {
                    *target = value.clone();
                }
            }
        }
    }

    let interactions = ledger
        .into_iter()
        .map(|interaction| {
            let property = records.property(interaction.property_id);
            let field = |pick: fn(&Property) -> &String| property.map(pick).cloned().unwrap_or_default();
            InteractionWithProperty {
                interaction: interaction.clone(),
                property_code: field(|p| &p.property_code),
                property_type: field(|p| &p.property_type),
                address: field(|p| &p.address),
                municipality: field(|p| &p.municipality),
                sale_state: property.map(Property::sale_state),
            }
        })
        .collect();

    Some(ClientDetail {
        client,
        phones,
        emails,
        interactions,
        selection,
        next_interaction,
    })
}
