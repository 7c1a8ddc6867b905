use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt as _;

use rentdesk::config::{Config, ConfigBuilder};
use rentdesk::db::utils::DatabaseSource;
use rentdesk::db::SqliteStore;
use rentdesk::session::SessionRegistry;
use rentdesk::store::{ApartmentFilter, Store};
use rentdesk::web::{router, AppState};

const APARTMENT_BODY: &str = "title=Sunny+loft&description=Bright+loft+with+a+view+over+the+river\
    &apartment_type=2B&price=1000.00&square_meters=64.5&floor=7\
    &address=12+Riverside+Street%2C+Kyiv&is_available=on";

fn setup() -> (Router, Arc<SqliteStore>) {
    let (app, store, _) = setup_with_sessions();
    (app, store)
}

fn setup_with_sessions() -> (Router, Arc<SqliteStore>, SessionRegistry) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config: Config = ConfigBuilder::default()
        .database(DatabaseSource::Memory)
        .staff_users(vec!["admin".to_string()])
        .build()
        .unwrap();
    let state = AppState::new(store.clone(), config);
    let sessions = state.sessions.clone();
    (router(state), store, sessions)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-remote-user", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, user: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(user) = user {
        builder = builder.header("x-remote-user", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn staff_creates_apartment_and_is_redirected() {
    let (app, store) = setup();
    let response = app
        .oneshot(post("/apartments/create/", Some("admin"), APARTMENT_BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let created = store.apartments(&ApartmentFilter::default()).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(location(&response), format!("/apartments/{}/", created[0].id));
    assert!(response.headers().get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn non_staff_create_is_refused() {
    let (app, store) = setup();
    let response = app
        .oneshot(post("/apartments/create/", Some("olena"), APARTMENT_BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/apartments/list/");
    assert_eq!(
        store.count_apartments(&ApartmentFilter::default()).unwrap(),
        0
    );
}

#[tokio::test]
async fn anonymous_booking_redirects_to_login() {
    let (app, _) = setup();
    let response = app
        .oneshot(get("/apartments/bookings/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/accounts/login/?next=%2Fapartments%2Fbookings%2F"
    );
}

#[tokio::test]
async fn invalid_form_renders_errors() {
    let (app, store) = setup();
    let body = APARTMENT_BODY.replace("title=Sunny+loft", "title=Cozy");
    let response = app
        .oneshot(post("/apartments/create/", Some("admin"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["view"], "apartments/apartment_form.html");
    assert_eq!(json["context"]["errors"][0]["field"], "title");
    assert_eq!(json["context"]["errors"][0]["kind"], "field_too_short");
    assert_eq!(
        store.count_apartments(&ApartmentFilter::default()).unwrap(),
        0
    );
}

#[tokio::test]
async fn unknown_apartment_is_404() {
    let (app, _) = setup();
    let response = app.oneshot(get("/apartments/5/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorites_follow_the_session_cookie() {
    let (app, _) = setup();
    let response = app
        .clone()
        .oneshot(post("/apartments/create/", Some("admin"), APARTMENT_BODY))
        .await
        .unwrap();
    let detail = location(&response).to_string();
    let id = detail.trim_matches('/').rsplit('/').next().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post(&format!("/apartments/{id}/add-to-favorites/"), None, ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .uri("/apartments/favorites/")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let json = json_body(response).await;
    assert_eq!(json["view"], "apartments/favorites_list.html");
    assert_eq!(json["context"]["favorites_count"], 1);
    assert_eq!(json["context"]["messages"][0]["level"], "success");

    // A fresh client has no favorites.
    let response = app
        .oneshot(get("/apartments/favorites/", None))
        .await
        .unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let json = json_body(response).await;
    assert_eq!(json["context"]["favorites_count"], 0);
}

#[tokio::test]
async fn booking_through_http_freezes_price() {
    let (app, store) = setup();
    app.clone()
        .oneshot(post("/apartments/create/", Some("admin"), APARTMENT_BODY))
        .await
        .unwrap();
    let apartment = store.apartments(&ApartmentFilter::default()).unwrap()[0].clone();

    let today = chrono::Utc::now().date_naive();
    let start = today + chrono::Duration::days(10);
    let end = start + chrono::Duration::days(3);
    let body = format!("start_date={start}&end_date={end}&notes=");
    let response = app
        .clone()
        .oneshot(post(
            &format!("/apartments/{}/book/", apartment.id),
            Some("olena"),
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let bookings = store.bookings(None).unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(
        location(&response),
        format!("/apartments/bookings/{}/", bookings[0].id)
    );
    assert_eq!(bookings[0].total_price, apartment.price * rust_decimal::Decimal::from(3));

    let response = app
        .clone()
        .oneshot(get(
            &format!("/apartments/bookings/{}/", bookings[0].id),
            Some("taras"),
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), "/apartments/bookings/");

    let response = app
        .oneshot(get(
            &format!("/apartments/bookings/{}/", bookings[0].id),
            Some("olena"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["context"]["booking"]["status"], "pending");
    assert_eq!(json["context"]["nights"], 3);
}

#[tokio::test]
async fn cookieless_visitors_leave_no_sessions_behind() {
    let (app, _, sessions) = setup_with_sessions();
    for _ in 0..50 {
        let response = app.clone().oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
    assert!(sessions.is_empty());

    let response = app
        .oneshot(post("/apartments/create/", Some("admin"), APARTMENT_BODY))
        .await
        .unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_some());
    assert_eq!(sessions.len(), 1);
}
