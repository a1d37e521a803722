use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::cascade::CascadeError;
use super::contacts::DuplicatePhoneError;
use super::domain::{
    ClientId, ContactChannel, InteractionId, InterestStatus, PropertyId, SaleFilter, SearchField,
    UnknownCode,
};
use super::input::{
    ClientUpdate, ContactRegistration, NewClient, NewInteraction, PropertyDetailsUpdate,
    PropertyDraft, SaleToggle,
};
use super::ledger::InteractionPatch;
use super::listing::{parse_client_type_filter, ClientRowFilter, DateRange, InteractionFilter};
use super::service::{AgencyError, AgencyService};
use super::store::AgencyStore;

/// Router builder exposing the agency endpoints.
pub fn agency_router<S>(service: Arc<AgencyService<S>>) -> Router
where
    S: AgencyStore + 'static,
{
    Router::new()
        .route("/api/v1/contacts", post(register_contact_handler::<S>))
        .route(
            "/api/v1/clients",
            post(create_client_handler::<S>).get(list_clients_handler::<S>),
        )
        .route(
            "/api/v1/clients/:client_id",
            get(client_detail_handler::<S>).put(update_client_handler::<S>),
        )
        .route(
            "/api/v1/clients/:client_id/interactions",
            post(record_interaction_handler::<S>),
        )
        .route(
            "/api/v1/clients/:client_id/interactions/:interaction_id",
            patch(patch_interaction_handler::<S>),
        )
        .route("/api/v1/interactions", get(list_interactions_handler::<S>))
        .route(
            "/api/v1/properties",
            get(list_properties_handler::<S>).post(create_property_handler::<S>),
        )
        .route(
            "/api/v1/properties/available",
            get(available_properties_handler::<S>),
        )
        .route(
            "/api/v1/properties/:property_id",
            put(update_property_handler::<S>),
        )
        .route(
            "/api/v1/properties/:property_id/sold",
            put(property_sold_handler::<S>),
        )
        .route(
            "/api/v1/properties/:property_id/pre-sold",
            put(property_pre_sold_handler::<S>),
        )
        .with_state(service)
}

/// Query string of the client listing.
#[derive(Debug, Default, Deserialize)]
pub struct ClientRowQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub client_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ClientRowQuery {
    pub fn into_filter(self) -> Result<ClientRowFilter, UnknownCode> {
        Ok(ClientRowFilter {
            client_type: parse_client_type_filter(self.client_type.as_deref())?,
            query: self.q,
            range: DateRange {
                from: self.from,
                to: self.to,
            },
        })
    }
}

/// Query string of the interaction listing. `statuses` is a comma separated list.
#[derive(Debug, Default, Deserialize)]
pub struct InteractionQuery {
    pub statuses: Option<String>,
    pub channel: Option<String>,
    pub q: Option<String>,
    pub search_field: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub nda_only: bool,
}

impl InteractionQuery {
    pub fn into_filter(self) -> Result<InteractionFilter, UnknownCode> {
        let statuses = self
            .statuses
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|raw| !raw.trim().is_empty())
            .map(str::parse::<InterestStatus>)
            .collect::<Result<Vec<_>, _>>()?;
        let channel = non_blank(self.channel.as_deref())
            .map(str::parse::<ContactChannel>)
            .transpose()?;
        let search_field = non_blank(self.search_field.as_deref())
            .map(str::parse::<SearchField>)
            .transpose()?
            .unwrap_or_default();

        Ok(InteractionFilter {
            statuses,
            channel,
            query: self.q,
            search_field,
            range: DateRange {
                from: self.from,
                to: self.to,
            },
            nda_only: self.nda_only,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PropertyQuery {
    pub q: Option<String>,
    pub sale: Option<String>,
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) async fn register_contact_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    axum::Json(registration): axum::Json<ContactRegistration>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.register_contact(registration) {
        Ok(created) => (StatusCode::CREATED, axum::Json(created)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_client_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    axum::Json(new_client): axum::Json<NewClient>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.create_client(new_client) {
        Ok(client_id) => (
            StatusCode::CREATED,
            axum::Json(json!({ "client_id": client_id })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_clients_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Query(query): Query<ClientRowQuery>,
) -> Response
where
    S: AgencyStore + 'static,
{
    let result = query
        .into_filter()
        .map_err(AgencyError::from)
        .and_then(|filter| service.list_client_rows(&filter));
    match result {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn client_detail_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(client_id): Path<u64>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.client_detail(ClientId(client_id)) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_client_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(client_id): Path<u64>,
    axum::Json(update): axum::Json<ClientUpdate>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.update_client(ClientId(client_id), update) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn record_interaction_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(client_id): Path<u64>,
    axum::Json(interaction): axum::Json<NewInteraction>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.record_interaction(ClientId(client_id), interaction) {
        Ok(interaction_id) => (
            StatusCode::CREATED,
            axum::Json(json!({ "interaction_id": interaction_id })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn patch_interaction_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path((client_id, interaction_id)): Path<(u64, u64)>,
    axum::Json(patch): axum::Json<InteractionPatch>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.patch_interaction(ClientId(client_id), InteractionId(interaction_id), patch) {
        Ok(interaction) => (StatusCode::OK, axum::Json(interaction)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_interactions_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Query(query): Query<InteractionQuery>,
) -> Response
where
    S: AgencyStore + 'static,
{
    let result = query
        .into_filter()
        .map_err(AgencyError::from)
        .and_then(|filter| service.list_interactions(&filter));
    match result {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_properties_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Query(query): Query<PropertyQuery>,
) -> Response
where
    S: AgencyStore + 'static,
{
    let sale = match non_blank(query.sale.as_deref()).map(str::parse::<SaleFilter>) {
        None => SaleFilter::default(),
        Some(Ok(sale)) => sale,
        Some(Err(error)) => return error_response(error.into()),
    };
    match service.list_properties(query.q.as_deref(), sale) {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn available_properties_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.available_properties() {
        Ok(properties) => (StatusCode::OK, axum::Json(properties)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_property_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    axum::Json(draft): axum::Json<PropertyDraft>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.create_property(draft) {
        Ok(property) => (StatusCode::CREATED, axum::Json(property)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_property_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(property_id): Path<u64>,
    axum::Json(details): axum::Json<PropertyDetailsUpdate>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.update_property_details(PropertyId(property_id), details) {
        Ok(property) => (StatusCode::OK, axum::Json(property)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn property_sold_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(property_id): Path<u64>,
    axum::Json(toggle): axum::Json<SaleToggle>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.set_property_sold(PropertyId(property_id), toggle) {
        Ok(change) => (StatusCode::OK, axum::Json(change)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn property_pre_sold_handler<S>(
    State(service): State<Arc<AgencyService<S>>>,
    Path(property_id): Path<u64>,
    axum::Json(toggle): axum::Json<SaleToggle>,
) -> Response
where
    S: AgencyStore + 'static,
{
    match service.set_property_pre_sold(PropertyId(property_id), toggle) {
        Ok(change) => (StatusCode::OK, axum::Json(change)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Maps service failures onto status codes with a JSON `error` body.
pub(crate) fn error_response(error: AgencyError) -> Response {
    match error {
        AgencyError::Validation(errors) => {
            let payload = json!({
                "error": "validation failed",
                "fields": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        AgencyError::DuplicatePhone(error) => duplicate_phone_response(&error),
        AgencyError::DuplicatePropertyCode(_) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        AgencyError::NotFound { .. } | AgencyError::Cascade(CascadeError::UnknownProperty(_)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        AgencyError::OwnershipMismatch(_) | AgencyError::Filter(_) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        AgencyError::Repository(_) => {
            let payload = json!({
                "error": "could not save changes",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn duplicate_phone_response(error: &DuplicatePhoneError) -> Response {
    let status = if error.is_within_submission() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CONFLICT
    };
    let payload = json!({
        "error": error.to_string(),
        "owner_id": error.owner(),
        "conflicts": error.conflicts,
    });
    (status, axum::Json(payload)).into_response()
}
