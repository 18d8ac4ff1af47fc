use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use campus_core::errors::CampusError;
use campus_protocol::scheduling::{
    Allocation, AllocationPatch, AllocationQuery, AttributeValue, Booking, BookingQuery,
    CreateAllocationRequest, CreateBookingRequest, ResourceDetail, SetAttributeRequest,
    UpdateBookingStatusRequest,
};
use uuid::Uuid;

use crate::service::SchedulingService;

/// Helper used by the binary (and tests) to compose the REST API router.
#[derive(Clone)]
pub struct SchedulingApi {
    state: ApiState,
}

#[derive(Clone)]
struct ApiState {
    service: SchedulingService,
}

impl SchedulingApi {
    pub fn new(service: SchedulingService) -> Self {
        Self {
            state: ApiState { service },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/v1/bookings", get(list_bookings).post(create_booking))
            .route("/v1/bookings/:id", get(get_booking))
            .route("/v1/bookings/:id/status", patch(update_booking_status))
            .route(
                "/v1/allocations",
                get(list_allocations).post(create_allocation),
            )
            .route(
                "/v1/allocations/:id",
                get(get_allocation).patch(update_allocation),
            )
            .route("/v1/resources/:id", get(get_resource))
            .route(
                "/v1/attributes/:entity_type/:entity_id",
                get(get_attributes),
            )
            .route(
                "/v1/attributes/:entity_type/:entity_id/:name",
                put(set_attribute),
            )
            .with_state(self.state)
    }
}

type AppResult<T> = Result<T, AppError>;

async fn health_check() -> &'static str {
    "ok"
}

async fn create_booking(
    State(state): State<ApiState>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<Booking>> {
    let booking = state.service.create_booking(payload).await?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let booking = state.service.get_booking(id).await?;
    Ok(Json(booking))
}

async fn list_bookings(
    State(state): State<ApiState>,
    Query(query): Query<BookingQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = state.service.list_bookings(&query).await?;
    Ok(Json(bookings))
}

async fn update_booking_status(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> AppResult<Json<Booking>> {
    let booking = state.service.update_booking_status(id, payload).await?;
    Ok(Json(booking))
}

async fn create_allocation(
    State(state): State<ApiState>,
    Json(payload): Json<CreateAllocationRequest>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.service.create_allocation(payload).await?;
    Ok(Json(allocation))
}

async fn get_allocation(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.service.get_allocation(id).await?;
    Ok(Json(allocation))
}

async fn list_allocations(
    State(state): State<ApiState>,
    Query(query): Query<AllocationQuery>,
) -> AppResult<Json<Vec<Allocation>>> {
    let allocations = state.service.list_allocations(&query).await?;
    Ok(Json(allocations))
}

async fn update_allocation(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AllocationPatch>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.service.update_allocation(id, payload).await?;
    Ok(Json(allocation))
}

async fn get_resource(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ResourceDetail>> {
    let resource = state.service.get_resource(id).await?;
    Ok(Json(resource))
}

async fn get_attributes(
    State(state): State<ApiState>,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> AppResult<Json<BTreeMap<String, AttributeValue>>> {
    let attributes = state
        .service
        .get_attributes(&entity_type, entity_id)
        .await?;
    Ok(Json(attributes))
}

async fn set_attribute(
    State(state): State<ApiState>,
    Path((entity_type, entity_id, name)): Path<(String, Uuid, String)>,
    Json(payload): Json<SetAttributeRequest>,
) -> AppResult<StatusCode> {
    state
        .service
        .set_attribute(&entity_type, entity_id, &name, payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<CampusError> for AppError {
    fn from(err: CampusError) -> Self {
        let status = match &err {
            CampusError::InvalidInput(_) | CampusError::UnknownAttribute(_) => {
                StatusCode::BAD_REQUEST
            }
            CampusError::Forbidden(_) => StatusCode::FORBIDDEN,
            CampusError::NotFound(_) => StatusCode::NOT_FOUND,
            CampusError::Conflict(_) | CampusError::ProhibitedTransition(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_conventional_status_codes() {
        let cases = [
            (CampusError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                CampusError::UnknownAttribute("resource.color".into()),
                StatusCode::BAD_REQUEST,
            ),
            (CampusError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CampusError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CampusError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                CampusError::ProhibitedTransition("x".into()),
                StatusCode::CONFLICT,
            ),
            (
                CampusError::DatabaseError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }
}
