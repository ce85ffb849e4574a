use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::context::{Actor, RequestContext};
use super::domain::{
    ApprenticeshipFilter, ApprenticeshipFlag, ApprenticeshipId, ApprenticeshipTypeId, UserId,
};
use super::records::{
    ApprenticeshipUpdate, NewApprenticeship, NewApprenticeshipType, RecordService,
    RecordServiceError,
};
use super::store::RecordStore;
use super::transitions::{
    ConfirmFlag, StatusTransitionService, TransitionError, TransitionRequest,
};
use crate::notify::NotificationOutbox;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Services shared by every registry handler.
pub struct RegistryState<S, O> {
    pub records: Arc<RecordService<S>>,
    pub transitions: Arc<StatusTransitionService<S, O>>,
}

impl<S, O> Clone for RegistryState<S, O> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            transitions: Arc::clone(&self.transitions),
        }
    }
}

/// `{ "success": true, "result": ... }` envelope used by mutation endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub result: T,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// Router builder exposing apprenticeship CRUD, the type taxonomy, and flag transitions.
pub fn registry_router<S, O>(state: RegistryState<S, O>) -> Router
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    Router::new()
        .route(
            "/api/v1/apprenticeships",
            get(list_handler::<S, O>).post(create_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeships/details",
            get(details_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeships/overview",
            get(overview_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeships/transitions/:flag",
            post(transition_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeships/:id",
            get(get_handler::<S, O>)
                .put(update_handler::<S, O>)
                .delete(delete_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeships/:id/confirm/:flag",
            post(confirm_handler::<S, O>),
        )
        .route(
            "/api/v1/users/:user_id/apprenticeship",
            get(by_user_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeship-types",
            get(list_types_handler::<S, O>).post(create_type_handler::<S, O>),
        )
        .route(
            "/api/v1/apprenticeship-types/:id",
            axum::routing::delete(delete_type_handler::<S, O>),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    let payload = json!({
        "error": message,
        "kind": kind,
    });
    (status, Json(payload)).into_response()
}

impl IntoResponse for TransitionError {
    fn into_response(self) -> Response {
        let status = match &self {
            TransitionError::Conflict { .. } => StatusCode::CONFLICT,
            TransitionError::NotFound(_) => StatusCode::NOT_FOUND,
            TransitionError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            TransitionError::StoreFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.kind(), self.to_string())
    }
}

impl IntoResponse for RecordServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecordServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecordServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            RecordServiceError::Conflict(_) => StatusCode::CONFLICT,
            RecordServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.kind(), self.to_string())
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let request_id = header_value(headers, REQUEST_ID_HEADER)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap_or_else(Uuid::new_v4);

    let actor = header_value(headers, ACTOR_ID_HEADER).map(|user_id| Actor {
        user_id: UserId::from(user_id),
    });

    RequestContext::new(request_id, actor)
}

#[async_trait]
impl<St> FromRequestParts<St> for RequestContext
where
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        Ok(context_from_headers(&parts.headers))
    }
}

fn parse_flag(raw: &str) -> Result<ApprenticeshipFlag, Response> {
    ApprenticeshipFlag::parse(raw).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("unknown apprenticeship flag '{raw}'"),
        )
    })
}

pub(crate) async fn list_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    Query(filter): Query<ApprenticeshipFilter>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.list(&filter) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn details_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    Query(filter): Query<ApprenticeshipFilter>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.list_details(&filter) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn overview_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.overview(&ctx) {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    Path(id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.get(&ApprenticeshipId(id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn by_user_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.find_by_user(&UserId(user_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Json(input): Json<NewApprenticeship>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.create(&ctx, input) {
        Ok(record) => (StatusCode::CREATED, Json(Envelope::ok(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(input): Json<ApprenticeshipUpdate>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    if input.id.as_str() != id {
        return RecordServiceError::Validation(format!(
            "body id '{}' does not match path id '{id}'",
            input.id
        ))
        .into_response();
    }

    match state.records.update(&ctx, input) {
        Ok(record) => (StatusCode::OK, Json(Envelope::ok(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.delete(&ctx, &ApprenticeshipId(id)) {
        Ok(record) => (StatusCode::OK, Json(Envelope::ok(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmBody {
    pub(crate) user_id: UserId,
}

pub(crate) async fn confirm_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Path((id, flag)): Path<(String, String)>,
    Json(body): Json<ConfirmBody>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    let flag = match parse_flag(&flag) {
        Ok(flag) => flag,
        Err(response) => return response,
    };

    let request = ConfirmFlag {
        apprenticeship_id: ApprenticeshipId(id),
        user_id: body.user_id,
        flag,
    };
    match state.transitions.confirm(&ctx, request) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Legacy body: `{ "id": ..., "user_id": ..., "<flag>": bool }`.
///
/// The flag key must name the same flag as the path.
#[derive(Debug, Deserialize)]
pub(crate) struct TransitionBody {
    pub(crate) id: ApprenticeshipId,
    pub(crate) user_id: UserId,
    #[serde(flatten)]
    pub(crate) fields: BTreeMap<String, serde_json::Value>,
}

impl TransitionBody {
    fn requested_value(&self, flag: ApprenticeshipFlag) -> Result<bool, RecordServiceError> {
        if let Some(other) = ApprenticeshipFlag::ALL
            .into_iter()
            .find(|other| *other != flag && self.fields.contains_key(other.label()))
        {
            return Err(RecordServiceError::Validation(format!(
                "body field '{}' does not match path flag '{}'",
                other.label(),
                flag.label()
            )));
        }

        match self.fields.get(flag.label()) {
            Some(serde_json::Value::Bool(value)) => Ok(*value),
            Some(_) => Err(RecordServiceError::Validation(format!(
                "'{}' must be a boolean",
                flag.label()
            ))),
            None => Err(RecordServiceError::Validation(format!(
                "body is missing '{}'",
                flag.label()
            ))),
        }
    }
}

pub(crate) async fn transition_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Path(flag): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    let flag = match parse_flag(&flag) {
        Ok(flag) => flag,
        Err(response) => return response,
    };
    let requested_value = match body.requested_value(flag) {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };

    let request = TransitionRequest {
        apprenticeship_id: body.id,
        user_id: body.user_id,
        flag,
        requested_value,
    };
    match state.transitions.apply(&ctx, request) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_types_handler<S, O>(State(state): State<RegistryState<S, O>>) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.list_types() {
        Ok(types) => (StatusCode::OK, Json(types)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_type_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Json(input): Json<NewApprenticeshipType>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.create_type(&ctx, input) {
        Ok(record) => (StatusCode::CREATED, Json(Envelope::ok(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_type_handler<S, O>(
    State(state): State<RegistryState<S, O>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    match state.records.delete_type(&ctx, &ApprenticeshipTypeId(id)) {
        Ok(record) => (StatusCode::OK, Json(Envelope::ok(record))).into_response(),
        Err(err) => err.into_response(),
    }
}
