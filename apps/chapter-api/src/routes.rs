use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chapter_service::{Error as ServiceError, SearchRequest, TieredSearchResponse};

use crate::state::AppState;

const QUOTA_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
	pub account_id: Uuid,
	pub query: String,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<SearchBody>,
) -> Result<Json<TieredSearchResponse>, ApiError> {
	authorize(&state, &headers)?;

	for attempt in 1..=QUOTA_WRITE_ATTEMPTS {
		let Some(account) = state.accounts.fetch(payload.account_id).await? else {
			return Err(json_error(
				StatusCode::NOT_FOUND,
				"ACCOUNT_NOT_FOUND",
				format!("Account {} does not exist.", payload.account_id),
				Some(vec!["$.account_id".to_string()]),
			));
		};
		let queries_used = u32::try_from(account.queries_used).unwrap_or_default();
		let response = state
			.service
			.perform_search(SearchRequest {
				query: payload.query.clone(),
				plan: account.plan,
				queries_used,
			})
			.await?;

		if response.upgrade_required {
			return Ok(Json(response));
		}

		if state
			.accounts
			.store_queries_used(account.account_id, queries_used, response.queries_used)
			.await?
		{
			return Ok(Json(response));
		}

		// Another search advanced the counter; rerun against the fresh value.
		tracing::info!(
			account_id = %account.account_id,
			attempt,
			"Query counter moved during search. Retrying."
		);
	}

	Err(json_error(
		StatusCode::CONFLICT,
		"QUOTA_CONFLICT",
		"The query counter kept changing during the search. Retry the request.",
		None,
	))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(expected) = state.api_auth_token.as_deref() else {
		return Ok(());
	};
	let presented = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim);

	if presented == Some(expected) {
		return Ok(());
	}

	Err(json_error(
		StatusCode::UNAUTHORIZED,
		"UNAUTHORIZED",
		"Missing or invalid bearer token.",
		None,
	))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => json_error(
				StatusCode::BAD_REQUEST,
				"INVALID_REQUEST",
				message,
				Some(vec!["$.query".to_string()]),
			),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			ServiceError::RetrievalUnavailable { message } =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "RETRIEVAL_UNAVAILABLE", message, None),
			ServiceError::Timeout { operation } => json_error(
				StatusCode::GATEWAY_TIMEOUT,
				"TIMEOUT",
				format!("{operation} timed out."),
				None,
			),
			ServiceError::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message, None),
			ServiceError::Storage { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message, None),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
