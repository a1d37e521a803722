use chrono::NaiveDate;
use inmo_crm::agency::{
    AgencyError, AgencyService, AgencyStore, ClientId, ClientProfile, ClientType, ContactChannel,
    ContactDetails, InteractionId, InterestStatus, NewClient, NewInteraction, PropertyDetails,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Identifiers of the records created by [`seed_demo_portfolio`].
#[derive(Debug, Clone)]
pub(crate) struct DemoPortfolio {
    pub(crate) buyer: ClientId,
    pub(crate) squatter: ClientId,
    pub(crate) company: ClientId,
    pub(crate) buyer_interactions: Vec<InteractionId>,
    pub(crate) squatter_interactions: Vec<InteractionId>,
}

struct DemoContact {
    name: &'static str,
    client_type: ClientType,
    company: &'static str,
    phones: &'static [&'static str],
    emails: &'static [&'static str],
}

struct DemoInterest {
    code: &'static str,
    property_type: &'static str,
    municipality: &'static str,
    on: (i32, u32, u32),
    channel: ContactChannel,
    status: InterestStatus,
    comments: &'static str,
}

const BUYER: DemoContact = DemoContact {
    name: "Lucía Ferrer",
    client_type: ClientType::Particular,
    company: "",
    phones: &["+34 600 111 222"],
    emails: &["lucia.ferrer@example.com"],
};

const SQUATTER: DemoContact = DemoContact {
    name: "Marcos Gil",
    client_type: ClientType::Particular,
    company: "",
    phones: &["611 222 333", "962 000 111"],
    emails: &[],
};

const COMPANY: DemoContact = DemoContact {
    name: "Elena Ruiz",
    client_type: ClientType::Empresa,
    company: "Inversiones Turia SL",
    phones: &["622-333-444"],
    emails: &["compras@turia.example.com", "elena@turia.example.com"],
};

const BUYER_INTERESTS: &[DemoInterest] = &[
    DemoInterest {
        code: "SOL-001",
        property_type: "Flat",
        municipality: "Valencia",
        on: (2024, 5, 2),
        channel: ContactChannel::Idealista,
        status: InterestStatus::AzulVisitaRealizada,
        comments: "<p>Visited with her partner, wants a second look.</p>",
    },
    DemoInterest {
        code: "SOL-002",
        property_type: "Duplex",
        municipality: "Paterna",
        on: (2024, 5, 9),
        channel: ContactChannel::Telefono,
        status: InterestStatus::NaranjaOferta,
        comments: "Offer sent below asking price.",
    },
];

const SQUATTER_INTERESTS: &[DemoInterest] = &[
    DemoInterest {
        code: "SOL-003",
        property_type: "House",
        municipality: "Torrent",
        on: (2024, 4, 18),
        channel: ContactChannel::Whatsapp,
        status: InterestStatus::VerdePensando,
        comments: "",
    },
    DemoInterest {
        code: "SOL-001",
        property_type: "Flat",
        municipality: "Valencia",
        on: (2024, 4, 20),
        channel: ContactChannel::Oficina,
        status: InterestStatus::AmarilloNegociando,
        comments: "Asked whether the flat is currently occupied.",
    },
];

const COMPANY_INTERESTS: &[DemoInterest] = &[DemoInterest {
    code: "SOL-004",
    property_type: "Commercial premises",
    municipality: "Valencia",
    on: (2024, 3, 30),
    channel: ContactChannel::Email,
    status: InterestStatus::AzulVisitaProgramada,
    comments: "NDA requested before sharing the rent roll.",
}];

/// Loads three clients with overlapping interests into an empty store.
pub(crate) fn seed_demo_portfolio<S>(
    service: &AgencyService<S>,
) -> Result<DemoPortfolio, AgencyError>
where
    S: AgencyStore + 'static,
{
    let buyer = seed_client(service, &BUYER)?;
    let squatter = seed_client(service, &SQUATTER)?;
    let company = seed_client(service, &COMPANY)?;

    let buyer_interactions = seed_interests(service, buyer, BUYER_INTERESTS)?;
    let squatter_interactions = seed_interests(service, squatter, SQUATTER_INTERESTS)?;
    seed_interests(service, company, COMPANY_INTERESTS)?;

    info!(
        clients = 3,
        interactions = buyer_interactions.len() + squatter_interactions.len() + 1,
        "demo portfolio seeded"
    );

    Ok(DemoPortfolio {
        buyer,
        squatter,
        company,
        buyer_interactions,
        squatter_interactions,
    })
}

fn seed_client<S>(service: &AgencyService<S>, contact: &DemoContact) -> Result<ClientId, AgencyError>
where
    S: AgencyStore + 'static,
{
    service.create_client(NewClient {
        profile: ClientProfile {
            client_type: contact.client_type,
            full_name: contact.name.to_string(),
            company_name: contact.company.to_string(),
            ..ClientProfile::default()
        },
        contacts: ContactDetails {
            phones: contact.phones.iter().map(|phone| phone.to_string()).collect(),
            emails: contact.emails.iter().map(|email| email.to_string()).collect(),
        },
    })
}

fn seed_interests<S>(
    service: &AgencyService<S>,
    client: ClientId,
    interests: &[DemoInterest],
) -> Result<Vec<InteractionId>, AgencyError>
where
    S: AgencyStore + 'static,
{
    interests
        .iter()
        .map(|interest| {
            let (year, month, day) = interest.on;
            let contact_date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
            service.record_interaction(
                client,
                NewInteraction {
                    property_code: interest.code.to_string(),
                    property: PropertyDetails {
                        property_type: interest.property_type.to_string(),
                        municipality: interest.municipality.to_string(),
                        ..PropertyDetails::default()
                    },
                    contact_date,
                    channel: interest.channel,
                    status: interest.status,
                    comments: interest.comments.to_string(),
                    solvia_code: None,
                },
            )
        })
        .collect()
}
