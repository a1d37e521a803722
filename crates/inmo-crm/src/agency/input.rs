//! Request payloads and their field validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use super::contacts::{normalize_phone, EmailSlots, PhoneSlots};
use super::domain::{
    Client, ClientFlags, ClientId, ClientType, ContactChannel, InterestStatus, Property,
    PropertyId,
};
use super::ledger::{InteractionPatch, PropertyDetails};

fn not_blank(value: &String) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn phone_values(phones: &Vec<String>) -> Result<(), ValidationError> {
    if phones.first().map_or(true, |first| first.trim().is_empty()) {
        let mut err = ValidationError::new("required");
        err.message = Some("phone 1 is required".into());
        return Err(err);
    }
    for (index, phone) in phones.iter().enumerate() {
        if phone.chars().count() > 30 {
            let mut err = ValidationError::new("length");
            err.add_param("position".into(), &(index + 1));
            err.add_param("max".into(), &30);
            return Err(err);
        }
        if !phone.trim().is_empty() && normalize_phone(phone).trim_start_matches('+').is_empty() {
            let mut err = ValidationError::new("phone");
            err.add_param("position".into(), &(index + 1));
            err.message = Some("phone has no digits".into());
            return Err(err);
        }
    }
    Ok(())
}

fn email_values(emails: &Vec<String>) -> Result<(), ValidationError> {
    for (index, email) in emails.iter().enumerate() {
        let email = email.trim();
        if email.is_empty() {
            continue;
        }
        if email.chars().count() > 140 || !email.validate_email() {
            let mut err = ValidationError::new("email");
            err.add_param("position".into(), &(index + 1));
            return Err(err);
        }
    }
    Ok(())
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// Identity and free-text fields of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClientProfile {
    #[serde(default)]
    pub client_type: ClientType,
    #[validate(length(max = 140), custom(function = "not_blank"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub company_name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub general_notes: String,
    #[serde(default)]
    #[validate(length(max = 60))]
    pub solvia_code: String,
}

impl ClientProfile {
    pub fn apply_to(&self, client: &mut Client) {
        client.client_type = self.client_type;
        client.full_name = trimmed(&self.full_name);
        client.company_name = trimmed(&self.company_name);
        client.general_notes = self.general_notes.clone();
        client.solvia_code = trimmed(&self.solvia_code);
    }
}

/// Phone and email slots as submitted; position `n` is index `n - 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactDetails {
    #[validate(length(max = 3), custom(function = "phone_values"))]
    pub phones: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 2), custom(function = "email_values"))]
    pub emails: Vec<String>,
}

impl ContactDetails {
    pub fn phone_slots(&self) -> PhoneSlots {
        PhoneSlots::from_raw(&self.phones)
    }

    pub fn email_slots(&self) -> EmailSlots {
        EmailSlots::from_raw(&self.emails)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewClient {
    #[validate(nested)]
    pub profile: ClientProfile,
    #[validate(nested)]
    pub contacts: ContactDetails,
}

/// Full client edit: profile, flags, contacts and the cascade selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClientUpdate {
    #[validate(nested)]
    pub profile: ClientProfile,
    #[serde(default)]
    pub flags: ClientFlags,
    #[validate(nested)]
    pub contacts: ContactDetails,
    #[serde(default)]
    pub pre_venta: bool,
    #[serde(default)]
    pub pre_sale_ids: Vec<PropertyId>,
    #[serde(default)]
    pub purchased_ids: Vec<PropertyId>,
}

/// An interaction as entered on the client page, identifying the property by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewInteraction {
    #[validate(length(max = 60), custom(function = "not_blank"))]
    pub property_code: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub property: PropertyDetails,
    pub contact_date: NaiveDate,
    #[serde(default)]
    pub channel: ContactChannel,
    #[serde(default)]
    pub status: InterestStatus,
    #[serde(default)]
    #[validate(length(max = 1200))]
    pub comments: String,
    #[serde(default)]
    #[validate(length(max = 60))]
    pub solvia_code: Option<String>,
}

impl NewInteraction {
    pub fn code(&self) -> String {
        trimmed(&self.property_code)
    }

    pub fn solvia_code(&self) -> Option<String> {
        self.solvia_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
    }
}

/// The agency contact form: a new client together with their first interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactRegistration {
    #[validate(nested)]
    pub client: ClientProfile,
    #[validate(nested)]
    pub contacts: ContactDetails,
    #[validate(nested)]
    pub interaction: NewInteraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PropertyDraft {
    #[validate(length(max = 60), custom(function = "not_blank"))]
    pub property_code: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub details: PropertyDetails,
}

/// Complete replacement of a property's descriptive fields, optionally renaming it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PropertyDetailsUpdate {
    /// New listing code; absent or blank keeps the current one.
    #[serde(default)]
    #[validate(length(max = 60))]
    pub property_code: Option<String>,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub property_type: String,
    #[serde(default)]
    #[validate(length(max = 160))]
    pub address: String,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub municipality: String,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub province: String,
    #[serde(default)]
    #[validate(length(max = 300))]
    pub notes: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    #[serde(default)]
    pub occupied: bool,
    #[serde(default)]
    pub has_alarm: bool,
    #[serde(default)]
    #[validate(length(max = 60))]
    pub alarm_code: String,
}

impl PropertyDetailsUpdate {
    pub fn code(&self) -> Option<String> {
        self.property_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
    }

    /// Overwrites every descriptive field; the alarm code only survives while an
    /// alarm is fitted.
    pub fn apply_to(&self, property: &mut Property) {
        property.property_type = trimmed(&self.property_type);
        property.address = trimmed(&self.address);
        property.municipality = trimmed(&self.municipality);
        property.province = trimmed(&self.province);
        property.notes = trimmed(&self.notes);
        property.description = trimmed(&self.description);
        property.occupied = self.occupied;
        property.has_alarm = self.has_alarm;
        property.alarm_code = if self.has_alarm {
            trimmed(&self.alarm_code)
        } else {
            String::new()
        };
    }
}

/// Body of the sale and reservation toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleToggle {
    pub client_id: ClientId,
    pub enabled: bool,
}

impl Validate for InteractionPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let (limit, value) = match self {
            InteractionPatch::Comments(value) => (1200, value),
            InteractionPatch::TicketCode(value) => (60, value),
            InteractionPatch::Status(_) | InteractionPatch::NdaRequested(_) => return Ok(()),
        };
        if value.chars().count() <= limit {
            return Ok(());
        }
        let mut err = ValidationError::new("length");
        err.add_param("max".into(), &limit);
        let mut errors = ValidationErrors::new();
        errors.add(self.field(), err);
        Err(errors)
    }
}
