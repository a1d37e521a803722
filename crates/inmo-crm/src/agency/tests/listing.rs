use super::common::*;

use crate::agency::listing::last_interaction_per_client;
use crate::agency::{
    AgencyStore, ClientRowFilter, ClientType, ContactChannel, DateRange, InteractionFilter,
    InteractionPatch, InterestStatus, NewClient, SaleFilter, SearchField,
};

#[test]
fn last_interaction_breaks_date_ties_by_id() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "600111222"))
        .expect("created");
    let bruno = service
        .create_client(new_client("Bruno", "611000000"))
        .expect("created");
    service
        .record_interaction(ana, interaction("P1", date(2024, 5, 2)))
        .expect("p1");
    let tie = service
        .record_interaction(ana, interaction("P2", date(2024, 5, 2)))
        .expect("p2");
    service
        .record_interaction(ana, interaction("P3", date(2024, 4, 30)))
        .expect("p3");

    let latest = service
        .store()
        .read(|records| {
            last_interaction_per_client(records)
                .into_iter()
                .map(|(client, interaction)| (client, interaction.id))
                .collect::<Vec<_>>()
        })
        .expect("read");
    assert_eq!(latest, vec![(ana, tie)]);
    assert!(latest.iter().all(|(client, _)| *client != bruno));
}

#[test]
fn rows_sort_by_last_contact_with_empty_clients_last() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "600111222"))
        .expect("created");
    let bruno = service
        .create_client(new_client("Bruno", "611000000"))
        .expect("created");
    let carla = service
        .create_client(new_client("Carla", "622000000"))
        .expect("created");
    let dani = service
        .create_client(new_client("Dani", "633000000"))
        .expect("created");
    service
        .record_interaction(ana, interaction("P1", date(2024, 5, 1)))
        .expect("ana");
    service
        .record_interaction(carla, interaction("P2", date(2024, 6, 1)))
        .expect("carla");

    let rows = service
        .list_client_rows(&ClientRowFilter::default())
        .expect("rows");
    let order: Vec<_> = rows.iter().map(|row| row.client_id).collect();
    assert_eq!(order, vec![carla, ana, dani, bruno]);
    assert_eq!(
        rows[0].last_contact.as_ref().map(|last| last.property_code.as_str()),
        Some("P2")
    );
}

#[test]
fn status_words_match_free_text() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "600111222"))
        .expect("created");
    service
        .create_client(new_client("Bruno", "611000000"))
        .expect("created");
    let id = service
        .record_interaction(ana, interaction("P1", date(2024, 5, 1)))
        .expect("recorded");
    service
        .patch_interaction(ana, id, InteractionPatch::Status(InterestStatus::RosaDescarta))
        .expect("patched");

    for query in ["descarta", "ROSA DESCARTA", "rosa_desc"] {
        let rows = service
            .list_client_rows(&ClientRowFilter {
                query: Some(query.to_string()),
                ..ClientRowFilter::default()
            })
            .expect("rows");
        let ids: Vec<_> = rows.iter().map(|row| row.client_id).collect();
        assert_eq!(ids, vec![ana], "query {query}");
    }
}

#[test]
fn phone_digits_match_formatted_query() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "+34 600 111 222"))
        .expect("created");

    let rows = service
        .list_client_rows(&ClientRowFilter {
            query: Some("600-111".to_string()),
            ..ClientRowFilter::default()
        })
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].client_id, ana);
}

#[test]
fn type_and_date_filters_apply_to_last_contact() {
    let service = build_service();
    let mut company = new_client("Inmo SL", "600111222");
    company.profile.client_type = ClientType::Empresa;
    let empresa = service.create_client(company).expect("created");
    let particular = service
        .create_client(new_client("Ana", "611000000"))
        .expect("created");
    service
        .record_interaction(empresa, interaction("P1", date(2024, 5, 10)))
        .expect("recorded");

    let companies = service
        .list_client_rows(&ClientRowFilter {
            client_type: Some(ClientType::Empresa),
            ..ClientRowFilter::default()
        })
        .expect("rows");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].client_id, empresa);

    let in_may = service
        .list_client_rows(&ClientRowFilter {
            range: DateRange {
                from: Some(date(2024, 5, 10)),
                to: Some(date(2024, 5, 10)),
            },
            ..ClientRowFilter::default()
        })
        .expect("rows");
    let ids: Vec<_> = in_may.iter().map(|row| row.client_id).collect();
    assert_eq!(ids, vec![empresa]);
    assert!(!ids.contains(&particular));
}

#[test]
fn interaction_listing_filters_by_field_and_nda() {
    let service = build_service();
    let ana = service
        .create_client(NewClient {
            profile: profile("Ana"),
            contacts: contacts(&["600111222"], &["ana@example.com"]),
        })
        .expect("created");
    let mut with_comment = interaction("P1", date(2024, 5, 1));
    with_comment.comments = "Wants a <b>terrace</b>".to_string();
    with_comment.channel = ContactChannel::Idealista;
    let first = service
        .record_interaction(ana, with_comment)
        .expect("first");
    let second = service
        .record_interaction(ana, interaction("TERRACE-9", date(2024, 5, 3)))
        .expect("second");
    service
        .patch_interaction(ana, second, InteractionPatch::NdaRequested(true))
        .expect("nda");

    let by_comment = service
        .list_interactions(&InteractionFilter {
            query: Some("terrace".to_string()),
            search_field: SearchField::Comments,
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert_eq!(
        by_comment.iter().map(|row| row.interaction_id).collect::<Vec<_>>(),
        vec![first]
    );

    let anywhere = service
        .list_interactions(&InteractionFilter {
            query: Some("terrace".to_string()),
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert_eq!(
        anywhere.iter().map(|row| row.interaction_id).collect::<Vec<_>>(),
        vec![second, first]
    );
    assert_eq!(anywhere[0].emails, vec!["ana@example.com".to_string()]);

    let nda = service
        .list_interactions(&InteractionFilter {
            nda_only: true,
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert_eq!(nda.len(), 1);

    let idealista = service
        .list_interactions(&InteractionFilter {
            channel: Some(ContactChannel::Idealista),
            statuses: vec![InterestStatus::AmarilloNegociando],
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert_eq!(idealista.len(), 1);
    assert_eq!(idealista[0].interaction_id, first);
}

#[test]
fn reference_search_matches_ticket_codes() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "600111222"))
        .expect("created");
    let id = service
        .record_interaction(ana, interaction("P1", date(2024, 5, 1)))
        .expect("recorded");
    service
        .patch_interaction(ana, id, InteractionPatch::TicketCode("TCK-42".to_string()))
        .expect("ticket");

    let rows = service
        .list_interactions(&InteractionFilter {
            query: Some("tck-42".to_string()),
            search_field: SearchField::Reference,
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert_eq!(rows.len(), 1);

    let by_client = service
        .list_interactions(&InteractionFilter {
            query: Some("tck-42".to_string()),
            search_field: SearchField::Client,
            ..InteractionFilter::default()
        })
        .expect("rows");
    assert!(by_client.is_empty());
}

#[test]
fn catalog_sale_filter_and_available_view() {
    let service = build_service();
    let ana = service
        .create_client(new_client("Ana", "600111222"))
        .expect("created");
    let sold = property_of(
        &service,
        service
            .record_interaction(ana, interaction("B-2", date(2024, 5, 1)))
            .expect("b"),
    );
    service
        .record_interaction(ana, interaction("A-1", date(2024, 5, 2)))
        .expect("a");
    service
        .set_property_sold(
            sold,
            crate::agency::SaleToggle {
                client_id: ana,
                enabled: true,
            },
        )
        .expect("sold");

    let all = service
        .list_properties(None, SaleFilter::All)
        .expect("all");
    let codes: Vec<_> = all.iter().map(|row| row.property.property_code.as_str()).collect();
    assert_eq!(codes, vec!["A-1", "B-2"]);

    let sold_rows = service
        .list_properties(None, SaleFilter::Sold)
        .expect("sold");
    assert_eq!(sold_rows.len(), 1);
    assert_eq!(sold_rows[0].property.id, sold);

    let active = service
        .list_properties(None, SaleFilter::Active)
        .expect("active");
    assert_eq!(active[0].property.property_code, "A-1");
    assert_eq!(service.available_properties().expect("available").len(), 1);
}

#[test]
fn detail_prefills_next_interaction_from_latest() {
    let service = build_service();
    let ana = service
        .create_client(NewClient {
            profile: crate::agency::ClientProfile {
                solvia_code: " SV-7 ".to_string(),
                ..profile("Ana")
            },
            contacts: contacts(&["600111222", "611000000"], &["ana@example.com"]),
        })
        .expect("created");
    service
        .record_interaction(ana, typed_interaction("P1", "Flat", date(2024, 5, 1)))
        .expect("older");
    let mut newer = typed_interaction("P2", "Garage", date(2024, 5, 9));
    newer.channel = ContactChannel::Whatsapp;
    service.record_interaction(ana, newer).expect("newer");

    let detail = service.client_detail(ana).expect("detail");
    let next = &detail.next_interaction;
    assert_eq!(next.channel, ContactChannel::Whatsapp);
    assert_eq!(next.property_code, "P2");
    assert_eq!(next.property_type, "Garage");
    assert_eq!(next.solvia_code, "SV-7");
    assert_eq!(next.phone, "600111222");
    assert_eq!(next.email, "ana@example.com");
    assert_eq!(detail.interactions[0].property_code, "P2");
}
