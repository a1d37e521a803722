use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a client record.
    ClientId
);
record_id!(
    /// Identifier of a property record.
    PropertyId
);
record_id!(
    /// Identifier of a client–property interaction. Higher ids were created later.
    InteractionId
);
record_id!(PhoneId);
record_id!(EmailId);

/// Raised when a string does not name a member of one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $code)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Upper snake case code used on the wire and in listings.
            pub const fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCode;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let trimmed = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.code().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| UnknownCode {
                        kind: $kind,
                        value: raw.to_string(),
                    })
            }
        }
    };
}

coded_enum!(
    /// Legal nature of a client.
    ClientType, "client type" {
        Particular => "PARTICULAR",
        Empresa => "EMPRESA",
    }
);

coded_enum!(
    /// Channel through which a client reached the agency.
    ContactChannel, "contact channel" {
        Telefono => "TELEFONO",
        Whatsapp => "WHATSAPP",
        Email => "EMAIL",
        Web => "WEB",
        Idealista => "IDEALISTA",
        Fotocasa => "FOTOCASA",
        Oficina => "OFICINA",
        /// Catch-all for channels without their own code.
        Otro => "OTRO",
    }
);

coded_enum!(
    /// Funnel stage of a client's interest in a property.
    InterestStatus, "interest status" {
        VerdePensando => "VERDE_PENSANDO",
        AmarilloNegociando => "AMARILLO_NEGOCIANDO",
        AzulVisitaProgramada => "AZUL_VISITA_PROGRAMADA",
        AzulVisitaRealizada => "AZUL_VISITA_REALIZADA",
        NaranjaOferta => "NARANJA_OFERTA",
        /// Terminal stage: the client is no longer interested or was ruled out.
        RosaDescarta => "ROSA_DESCARTA",
    }
);

coded_enum!(
    /// Which fields the interaction listing's free text is matched against.
    SearchField, "search field" {
        All => "ALL",
        /// Client name, phones and emails.
        Client => "CLIENT",
        /// Property code, type, address and municipality.
        Property => "PROPERTY",
        Comments => "COMMENTS",
        /// Interaction reference code and ticket code.
        Reference => "REFERENCE",
    }
);

coded_enum!(
    /// Sale filter of the property catalog.
    SaleFilter, "sale filter" {
        All => "ALL",
        Sold => "SOLD",
        /// Anything not sold, reserved or not.
        Active => "ACTIVE",
    }
);

impl Default for SearchField {
    fn default() -> Self {
        SearchField::All
    }
}

impl Default for SaleFilter {
    fn default() -> Self {
        SaleFilter::All
    }
}

impl Default for ClientType {
    fn default() -> Self {
        ClientType::Particular
    }
}

impl Default for ContactChannel {
    fn default() -> Self {
        ContactChannel::Otro
    }
}

impl Default for InterestStatus {
    fn default() -> Self {
        InterestStatus::VerdePensando
    }
}

impl InterestStatus {
    /// Status forced onto interactions invalidated by a cascade.
    pub const DISCARDED: InterestStatus = InterestStatus::RosaDescarta;

    pub const fn is_discarded(self) -> bool {
        matches!(self, InterestStatus::RosaDescarta)
    }
}

/// Commercial flags whose transitions drive the cascade rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFlags {
    /// Possible squatter.
    #[serde(default)]
    pub posible_ocupa: bool,
    /// Confirmed buyer.
    #[serde(default)]
    pub comprador_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub client_type: ClientType,
    pub full_name: String,
    pub company_name: String,
    pub general_notes: String,
    /// Code from the external listing system; cross-reference only.
    pub solvia_code: String,
    pub flags: ClientFlags,
}

impl Client {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            client_type: ClientType::default(),
            full_name: String::new(),
            company_name: String::new(),
            general_notes: String::new(),
            solvia_code: String::new(),
            flags: ClientFlags::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: PhoneId,
    pub client_id: ClientId,
    /// Normalized number, see [`crate::agency::contacts::normalize_phone`].
    pub number: String,
    /// Slot 1..=3.
    pub position: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    pub client_id: ClientId,
    pub address: String,
    /// Slot 1..=2.
    pub position: u8,
}

/// A property tracked by its external listing code.
///
/// The sale fields are private so every change goes through the state machine in
/// [`crate::agency::property`], which keeps `sold` and `pre_vendido` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub property_code: String,
    pub property_type: String,
    pub address: String,
    pub municipality: String,
    pub province: String,
    pub notes: String,
    pub description: String,
    pub occupied: bool,
    pub has_alarm: bool,
    pub alarm_code: String,
    pub(crate) sold: bool,
    pub(crate) sold_client: Option<ClientId>,
    pub(crate) pre_vendido: bool,
    pub(crate) pre_vendido_client: Option<ClientId>,
}

impl Property {
    /// A fresh, available property with blank descriptive fields.
    pub fn new(id: PropertyId, property_code: impl Into<String>) -> Self {
        Self {
            id,
            property_code: property_code.into(),
            property_type: String::new(),
            address: String::new(),
            municipality: String::new(),
            province: String::new(),
            notes: String::new(),
            description: String::new(),
            occupied: false,
            has_alarm: false,
            alarm_code: String::new(),
            sold: false,
            sold_client: None,
            pre_vendido: false,
            pre_vendido_client: None,
        }
    }

    pub fn is_sold(&self) -> bool {
        self.sold
    }

    pub fn sold_client(&self) -> Option<ClientId> {
        self.sold_client
    }

    pub fn is_pre_vendido(&self) -> bool {
        self.pre_vendido
    }

    pub fn pre_vendido_client(&self) -> Option<ClientId> {
        self.pre_vendido_client
    }
}

/// Recorded contact event between one client and one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub client_id: ClientId,
    pub property_id: PropertyId,
    pub contact_date: NaiveDate,
    pub channel: ContactChannel,
    pub status: InterestStatus,
    /// May contain inline HTML markup; stored verbatim.
    pub comments: String,
    pub nda_requested: bool,
    pub ticket_code: Option<String>,
    pub solvia_code: Option<String>,
}

impl Interaction {
    /// Sort key for "most recent first": later date wins, then the later id.
    pub fn recency(&self) -> (NaiveDate, InteractionId) {
        (self.contact_date, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_case_insensitively() {
        assert_eq!(
            "rosa_descarta".parse::<InterestStatus>(),
            Ok(InterestStatus::RosaDescarta)
        );
        assert_eq!(" Empresa ".parse::<ClientType>(), Ok(ClientType::Empresa));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let err = "CARRIER_PIGEON"
            .parse::<ContactChannel>()
            .expect_err("unknown channel");
        assert_eq!(err.kind, "contact channel");
        assert_eq!(err.value, "CARRIER_PIGEON");
    }

    #[test]
    fn serde_uses_upper_snake_codes() {
        let json = serde_json::to_string(&InterestStatus::AzulVisitaProgramada).expect("serialize");
        assert_eq!(json, "\"AZUL_VISITA_PROGRAMADA\"");
        assert!(serde_json::from_str::<InterestStatus>("\"LILA\"").is_err());
    }

    #[test]
    fn identifiers_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&ClientId(42)).expect("serialize");
        assert_eq!(json, "42");
    }
}
