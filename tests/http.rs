use std::sync::Arc;

use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

use trackmyshow::docstore::mock::{MockConnector, MockDocumentStore};
use trackmyshow::environment::Environment;
use trackmyshow::routes;

struct Fixture {
    connector: Arc<MockConnector>,
    environment: Environment,
}

impl Fixture {
    fn new(available: bool) -> Self {
        let logger = Arc::new(log::discard());
        let connector = Arc::new(MockConnector::new(Arc::new(MockDocumentStore::new()), available));
        let environment = Environment::with_connector(logger, connector.clone());

        Fixture { connector, environment }
    }

    async fn send(&self, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let logger = self.environment.logger.clone();
        let filter = routes::make_routes(self.environment.clone())
            .recover(move |r| routes::format_rejection(logger.clone(), r));

        let mut request = warp::test::request().method(method).path(path);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&filter).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);

        (response.status(), body)
    }

    async fn create_article(&self, title: &str, status: &str) -> Value {
        let (status_code, body) = self
            .send(
                "POST",
                "/articles",
                Some(json!({
                    "title": title,
                    "author": "Jo Writer",
                    "description": "About the show",
                    "status": status,
                    "tags": ["jazz"],
                })),
            )
            .await;

        assert_eq!(status_code, StatusCode::CREATED, "{}", body);
        body["data"].clone()
    }
}

#[tokio::test]
async fn creating_and_retrieving_an_article() {
    let fixture = Fixture::new(true);

    let article = fixture.create_article("Hello World", "draft").await;
    assert_eq!(article["slug"], "hello-world");
    assert_eq!(article["publishedAt"], Value::Null);
    assert_eq!(article["createdBy"], "admin-1");

    let path = format!("/articles/{}", article["id"].as_str().expect("id"));
    let (status, body) = fixture.send("GET", &path, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["title"], "Hello World");
    assert_eq!(fixture.connector.store().len("articles"), 1);
}

#[tokio::test]
async fn missing_article_is_not_found() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture.send("GET", "/articles/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["operation"], "retrieveArticle");
    assert_eq!(body["id"], "nope");
}

#[tokio::test]
async fn invalid_articles_are_rejected() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture
        .send("POST", "/articles", Some(json!({ "author": "Jo", "description": "d" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["operation"], "createArticle");

    let (status, body) = fixture
        .send("POST", "/articles", Some(json!({ "title": 7, "author": "Jo" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    assert_eq!(fixture.connector.store().len("articles"), 0);
}

#[tokio::test]
async fn listing_is_paginated() {
    let fixture = Fixture::new(true);

    for i in 0..12 {
        fixture.create_article(&format!("Article {}", i), "published").await;
    }

    let (status, body) = fixture
        .send("GET", "/articles?page=3&limit=5&sortBy=title&sortOrder=asc", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        body["data"]["pagination"],
        json!({
            "currentPage": 3,
            "totalPages": 3,
            "totalItems": 12,
            "hasNext": false,
            "hasPrev": true,
        })
    );
}

#[tokio::test]
async fn unknown_status_filter_is_a_bad_request() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture.send("GET", "/articles?status=archived", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "listArticles");
}

#[tokio::test]
async fn only_published_articles_are_visible_by_slug() {
    let fixture = Fixture::new(true);

    let article = fixture.create_article("Opening Night", "draft").await;

    let (status, _) = fixture.send("GET", "/articles/slug/opening-night", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let path = format!("/articles/{}/status", article["id"].as_str().expect("id"));
    let (status, body) = fixture
        .send("PATCH", &path, Some(json!({ "status": "published", "userId": "editor-7" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updatedBy"], "editor-7");
    assert!(body["data"]["publishedAt"].is_string());

    let (status, body) = fixture.send("GET", "/articles/slug/opening-night", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], article["id"]);
}

#[tokio::test]
async fn deleting_articles() {
    let fixture = Fixture::new(true);

    let article = fixture.create_article("Short Lived", "draft").await;
    let path = format!("/articles/{}", article["id"].as_str().expect("id"));

    let (status, body) = fixture.send("DELETE", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_none());

    let (status, body) = fixture.send("DELETE", &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "deleteArticle");
}

#[tokio::test]
async fn store_failures_are_server_errors() {
    let fixture = Fixture::new(true);
    fixture.connector.store().set_failing(true);

    let (status, body) = fixture.send("GET", "/articles", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "operation_failed");
}

#[tokio::test]
async fn unavailable_store_falls_back_to_memory() {
    let fixture = Fixture::new(false);

    let article = fixture.create_article("Offline", "published").await;
    assert_eq!(article["id"], "1");

    let (status, body) = fixture.send("GET", "/articles/published/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);

    assert_eq!(fixture.connector.store().len("articles"), 0);
}

#[tokio::test]
async fn organizer_lifecycle() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture
        .send(
            "POST",
            "/organizers",
            Some(json!({
                "name": "Blue Note Events",
                "email": "hello@bluenote.example",
                "category": "music",
                "address": { "city": "Lyon", "country": "France" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(body["data"]["slug"], "blue-note-events");

    let id = body["data"]["id"].as_str().expect("id").to_owned();

    let (status, body) = fixture
        .send(
            "PATCH",
            &format!("/organizers/{}/verification", id),
            Some(json!({ "verified": true, "verificationNotes": "checked" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verifiedBy"], "admin-1");

    let (_, body) = fixture.send("GET", "/organizers/public/verified", None).await;
    assert_eq!(body["data"]["pagination"]["totalItems"], 0);

    let (status, _) = fixture
        .send("PATCH", &format!("/organizers/{}/status", id), Some(json!({ "status": "active" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = fixture.send("GET", "/organizers/public/verified?city=Lyon", None).await;
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);

    let (status, body) = fixture.send("GET", &format!("/organizers/{}/stats", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["followersCount"], 0);

    let (status, body) = fixture.send("GET", &format!("/organizers/{}/shows", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = fixture.send("GET", "/organizers/slug/blue-note-events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
}

#[tokio::test]
async fn shows_of_missing_organizer_are_not_found() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture.send("GET", "/organizers/nope/shows", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "organizerShows");
    assert_eq!(body["id"], "nope");
}

#[tokio::test]
async fn published_list_leaves_out_drafts() {
    let fixture = Fixture::new(true);

    fixture.create_article("Draft Piece", "draft").await;
    let published = fixture.create_article("Live Piece", "published").await;

    let (status, body) = fixture.send("GET", "/articles/published/list", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);
    assert_eq!(body["data"]["items"][0]["id"], published["id"]);
}

#[tokio::test]
async fn organizer_status_must_be_known() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture
        .send("PATCH", "/organizers/1/status", Some(json!({ "status": "banned" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "updateOrganizer");
}

#[tokio::test]
async fn organizer_categories_are_listed() {
    let fixture = Fixture::new(true);

    let (status, body) = fixture.send("GET", "/organizers/categories", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(10));
}

#[tokio::test]
async fn healthz_reports_version() {
    let fixture = Fixture::new(true);
    let filter = routes::admin::make_healthz_route(fixture.environment.clone());

    let response = warp::test::request().method("GET").path("/healthz").reply(&filter).await;
    let body: Value = serde_json::from_slice(response.body()).expect("parse healthz body");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["version"], info::VERSION);
}
