use crate::infra::{seed_demo_portfolio, DemoPortfolio};
use clap::Args;
use inmo_crm::agency::{
    AgencyService, ClientFlags, ClientProfile, ClientRowFilter, ClientUpdate, ContactDetails,
    InMemoryAgencyStore, InteractionFilter, InterestStatus, SaleFilter, UnknownCode,
};
use chrono::NaiveDate;
use inmo_crm::agency::{ClientId, DateRange, PropertyId};
use inmo_crm::error::AppError;
use std::sync::Arc;

type DemoService = AgencyService<InMemoryAgencyStore>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Free-text filter applied to the client listing.
    #[arg(long)]
    pub(crate) query: Option<String>,
    /// Client type filter for the listing (PARTICULAR, EMPRESA or ALL).
    #[arg(long = "type")]
    pub(crate) client_type: Option<String>,
    /// Earliest last-contact date to list (YYYY-MM-DD).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Latest last-contact date to list (YYYY-MM-DD).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) to: Option<NaiveDate>,
    /// Only print the listings; skip the purchase and squatter scenarios.
    #[arg(long)]
    pub(crate) skip_cascade: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        query,
        client_type,
        from,
        to,
        skip_cascade,
    } = args;

    let service = AgencyService::new(Arc::new(InMemoryAgencyStore::new()));
    let portfolio = seed_demo_portfolio(&service)?;

    println!("Agency portfolio demo");
    println!(
        "- seeded clients #{} (buyer, {} interests), #{} (squatter, {} interests), #{} (company)",
        portfolio.buyer,
        portfolio.buyer_interactions.len(),
        portfolio.squatter,
        portfolio.squatter_interactions.len(),
        portfolio.company
    );
    let filter = client_filter(query, client_type.as_deref(), DateRange { from, to })
        .map_err(|err| AppError::Agency(err.into()))?;
    render_clients(&service, &filter)?;

    if skip_cascade {
        return Ok(());
    }

    run_purchase(&service, &portfolio)?;
    run_squatter_flag(&service, &portfolio)?;
    render_discarded(&service)?;
    render_catalog(&service)?;

    Ok(())
}

fn client_filter(
    query: Option<String>,
    client_type: Option<&str>,
    range: DateRange,
) -> Result<ClientRowFilter, UnknownCode> {
    Ok(ClientRowFilter {
        query,
        client_type: inmo_crm::agency::listing::parse_client_type_filter(client_type)?,
        range,
    })
}

fn render_clients(service: &DemoService, filter: &ClientRowFilter) -> Result<(), AppError> {
    let rows = service.list_client_rows(filter)?;
    println!("\nClients ({} matching)", rows.len());
    for row in rows {
        let last = row
            .last_contact
            .map(|last| {
                format!(
                    "{} {} via {} [{}]",
                    last.contact_date, last.property_code, last.channel, last.status
                )
            })
            .unwrap_or_else(|| "no contact yet".to_string());
        println!(
            "- #{} {} ({}) | phones: {} | {}",
            row.client_id,
            row.full_name,
            row.client_type,
            row.phones.join(", "),
            last
        );
    }
    Ok(())
}

/// Rebuilds the edit form of a client with new flags and sale selections.
fn edit_for(
    service: &DemoService,
    client: ClientId,
    flags: ClientFlags,
    purchased_ids: Vec<PropertyId>,
) -> Result<ClientUpdate, AppError> {
    let detail = service.client_detail(client)?;
    let current = detail.client;
    Ok(ClientUpdate {
        profile: ClientProfile {
            client_type: current.client_type,
            full_name: current.full_name,
            company_name: current.company_name,
            general_notes: current.general_notes,
            solvia_code: current.solvia_code,
        },
        flags,
        contacts: ContactDetails {
            phones: detail.phones.into_iter().map(Option::unwrap_or_default).collect(),
            emails: detail.emails.into_iter().map(Option::unwrap_or_default).collect(),
        },
        pre_venta: detail.selection.pre_venta,
        pre_sale_ids: detail.selection.pre_sale_ids,
        purchased_ids,
    })
}

fn run_purchase(service: &DemoService, portfolio: &DemoPortfolio) -> Result<(), AppError> {
    let detail = service.client_detail(portfolio.buyer)?;
    let Some(target) = detail
        .interactions
        .iter()
        .find(|item| item.property_code == "SOL-001")
    else {
        println!("\nPurchase scenario skipped: SOL-001 not in the buyer's interests");
        return Ok(());
    };
    let property = target.interaction.property_id;

    let flags = ClientFlags {
        comprador_final: true,
        ..detail.client.flags
    };
    let update = edit_for(service, portfolio.buyer, flags, vec![property])?;
    let outcome = service.update_client(portfolio.buyer, update)?;

    println!(
        "\n{} confirmed as buyer of SOL-001 ({} side effects)",
        outcome.client.full_name,
        outcome.mutations.len()
    );
    for mutation in &outcome.mutations {
        match serde_json::to_string(mutation) {
            Ok(json) => println!("  - {json}"),
            Err(err) => println!("  - side effect unavailable: {err}"),
        }
    }
    Ok(())
}

fn run_squatter_flag(service: &DemoService, portfolio: &DemoPortfolio) -> Result<(), AppError> {
    let flags = ClientFlags {
        posible_ocupa: true,
        comprador_final: false,
    };
    let update = edit_for(service, portfolio.squatter, flags, Vec::new())?;
    let outcome = service.update_client(portfolio.squatter, update)?;
    println!(
        "\n{} flagged as possible squatter: {} of {} interactions discarded",
        outcome.client.full_name,
        outcome.mutations.len(),
        portfolio.squatter_interactions.len()
    );
    Ok(())
}

fn render_discarded(service: &DemoService) -> Result<(), AppError> {
    let rows = service.list_interactions(&InteractionFilter {
        statuses: vec![InterestStatus::DISCARDED],
        ..InteractionFilter::default()
    })?;
    println!("\nDiscarded interest ({} rows)", rows.len());
    for row in rows {
        println!(
            "- {} {} | {} | {}",
            row.contact_date, row.property_code, row.client_name, row.channel
        );
    }
    Ok(())
}

fn render_catalog(service: &DemoService) -> Result<(), AppError> {
    let rows = service.list_properties(None, SaleFilter::All)?;
    println!("\nCatalog");
    for row in rows {
        let state = match serde_json::to_value(row.sale_state) {
            Ok(value) => value["state"].as_str().unwrap_or("UNKNOWN").to_string(),
            Err(_) => "UNKNOWN".to_string(),
        };
        println!(
            "- {} {} ({}) | {} | {} interested",
            row.property.property_code,
            row.property.property_type,
            row.property.municipality,
            state,
            row.interest_count
        );
    }
    Ok(())
}
