//! HTTP adapter: axum routes onto the synchronous handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::apartment::{ApartmentForm, ApartmentId};
use crate::booking::{BookingForm, BookingId, StatusForm};
use crate::config::Config;
use crate::error::AppError;
use crate::handlers::{self, HandlerResult, ListQuery, Request, Response};
use crate::session::SessionRegistry;
use crate::store::Store;
use crate::user::User;

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionRegistry,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            config: Arc::new(config),
        }
    }

    /// Resolves the requester from the trusted identity header.
    fn identify(&self, headers: &HeaderMap) -> Result<Option<User>, AppError> {
        let username = headers
            .get(self.config.identity_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty());
        match username {
            Some(name) => Ok(Some(
                self.store.ensure_user(name, self.config.is_staff(name))?,
            )),
            None => Ok(None),
        }
    }

    /// Runs the handler off the async workers, since the store blocks.
    async fn dispatch<F>(self, headers: HeaderMap, uri: Uri, handler: F) -> axum::response::Response
    where
        F: FnOnce(&mut Request<'_>) -> HandlerResult + Send + 'static,
    {
        match tokio::task::spawn_blocking(move || self.run(&headers, &uri, handler)).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Handler task join error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }

    fn run<F>(&self, headers: &HeaderMap, uri: &Uri, handler: F) -> axum::response::Response
    where
        F: FnOnce(&mut Request<'_>) -> HandlerResult,
    {
        let cookie = session_cookie(headers);
        let (key, mut session) = self.sessions.load(cookie.as_deref());
        let user = match self.identify(headers) {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        };
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let result = {
            let mut req = Request {
                store: self.store.as_ref(),
                session: &mut session,
                user: user.as_ref(),
                now: Utc::now(),
            };
            let result = handler(&mut req);
            handlers::respond(&mut req, result, path)
        };
        let kept = self.sessions.save(key.clone(), session);

        let mut response = match result {
            Ok(Response::Render { view, context }) => {
                Json(json!({ "view": view.template(), "context": context })).into_response()
            }
            Ok(Response::Redirect(route)) => {
                Redirect::to(&route.url(&self.config.login_url)).into_response()
            }
            Err(e) => e.into_response(),
        };
        if kept && cookie.as_deref() != Some(key.as_str()) {
            let value = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, key);
            match HeaderValue::from_str(&value) {
                Ok(v) => {
                    response.headers_mut().append(header::SET_COOKIE, v);
                }
                Err(e) => log::error!("Fail to set session cookie: {}", e),
            }
        }
        response
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Storage(e) => {
                log::error!("Storage failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self {
            AppError::Storage(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/apartments/list/", get(apartment_list))
        .route(
            "/apartments/create/",
            get(apartment_create_form).post(apartment_create),
        )
        .route("/apartments/favorites/", get(favorites_list))
        .route("/apartments/{id}/", get(apartment_detail))
        .route(
            "/apartments/{id}/update/",
            get(apartment_update_form).post(apartment_update),
        )
        .route(
            "/apartments/{id}/delete/",
            get(apartment_delete_confirm).post(apartment_delete),
        )
        .route("/apartments/{id}/add-to-favorites/", post(add_to_favorites))
        .route(
            "/apartments/{id}/remove-from-favorites/",
            post(remove_from_favorites),
        )
        .route(
            "/apartments/{id}/book/",
            get(booking_create_form).post(booking_create),
        )
        .route("/apartments/bookings/", get(booking_list))
        .route("/apartments/bookings/{id}/", get(booking_detail))
        .route(
            "/apartments/bookings/{id}/cancel/",
            get(booking_cancel_confirm).post(booking_cancel),
        )
        .route(
            "/apartments/bookings/{id}/status/",
            post(booking_set_status),
        )
        .with_state(state)
}

async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, handlers::home).await
}

async fn apartment_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let page_size = state.config.page_size;
    state
        .dispatch(headers, uri, move |req| {
            handlers::apartment_list(req, &query, page_size)
        })
        .await
}

async fn apartment_detail(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_detail(req, id)).await
}

async fn apartment_create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, handlers::apartment_create_form).await
}

async fn apartment_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<ApartmentForm>,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_create(req, &form)).await
}

async fn apartment_update_form(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_update_form(req, id)).await
}

async fn apartment_update(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<ApartmentForm>,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_update(req, id, &form)).await
}

async fn apartment_delete_confirm(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_delete_confirm(req, id)).await
}

async fn apartment_delete(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::apartment_delete(req, id)).await
}

async fn add_to_favorites(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::add_to_favorites(req, id)).await
}

async fn remove_from_favorites(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::remove_from_favorites(req, id)).await
}

async fn favorites_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, handlers::favorites_list).await
}

async fn booking_create_form(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_create_form(req, id)).await
}

async fn booking_create(
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<BookingForm>,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_create(req, id, &form)).await
}

async fn booking_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, handlers::booking_list).await
}

async fn booking_detail(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_detail(req, id)).await
}

async fn booking_cancel_confirm(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_cancel_confirm(req, id)).await
}

async fn booking_cancel(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_cancel(req, id)).await
}

async fn booking_set_status(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<StatusForm>,
) -> impl IntoResponse {
    state.dispatch(headers, uri, move |req| handlers::booking_set_status(req, id, &form)).await
}
