//! End-to-end tests of the HTTP routes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

use gridmatch::{
    API_KEY_HEADER, AppState, AuthError, DirectorySink, GameRepository, HOF_KEY, HallOfFame,
    Identity, IdentityProvider, MatchService, MatchSettings, router,
};

/// Accepts codes of the form `ok-<login>`.
#[derive(Debug)]
struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn exchange_code(&self, code: &str) -> Result<Identity, AuthError> {
        code.strip_prefix("ok-")
            .map(|login| Identity::new(login.to_string(), format!("{}@example.com", login)))
            .ok_or_else(|| AuthError::new("bad code"))
    }
}

struct TestApp {
    _db: NamedTempFile,
    site: TempDir,
    app: Router,
}

fn setup_app(settings: MatchSettings) -> TestApp {
    let db = NamedTempFile::new().expect("Failed to create temp file");
    let repo = GameRepository::new(db.path().to_str().expect("Invalid path").to_string())
        .expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");

    let site = tempfile::tempdir().expect("Failed to create temp dir");
    let state = AppState {
        service: MatchService::new(repo, settings),
        identity: Arc::new(StubIdentity),
        hall_of_fame: HallOfFame::new(
            Arc::new(DirectorySink::new(site.path())),
            HOF_KEY.to_string(),
            Duration::from_secs(5),
        ),
    };
    TestApp {
        _db: db,
        site,
        app: router(state),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Body failed")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(key) = api_key {
        builder = builder.header(API_KEY_HEADER, key);
    }
    builder.body(Body::empty()).expect("Valid request")
}

fn put_match(api_key: &str) -> Request<Body> {
    Request::put("/match")
        .header(API_KEY_HEADER, api_key)
        .body(Body::empty())
        .expect("Valid request")
}

fn post_move(match_id: &str, api_key: &str, body: &str) -> Request<Body> {
    Request::post(format!("/match/{}", match_id))
        .header(API_KEY_HEADER, api_key)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Valid request")
}

async fn login(app: &Router, login: &str) -> String {
    let (status, body) = send(app, get(&format!("/gh-oauth?code=ok-{}", login), None)).await;
    assert_eq!(status, StatusCode::OK);
    body["x-api-key"]
        .as_str()
        .expect("Key in response")
        .to_string()
}

#[tokio::test]
async fn test_login_issues_stable_key() {
    let test = setup_app(MatchSettings::default());
    let first = login(&test.app, "alice").await;
    let second = login(&test.app, "alice").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_login_failures() {
    let test = setup_app(MatchSettings::default());
    let (status, _) = send(&test.app, get("/gh-oauth", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&test.app, get("/gh-oauth?code=forged", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_or_unknown_key_is_forbidden() {
    let test = setup_app(MatchSettings::default());
    let request = Request::put("/match").body(Body::empty()).expect("Valid request");
    let (status, _) = send(&test.app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&test.app, put_match("bogus")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_play_match_to_the_end() {
    let test = setup_app(MatchSettings {
        board_size: 3,
        initial_moves: 1,
    });
    let key = login(&test.app, "bob").await;

    let (status, created) = send(&test.app, put_match(&key)).await;
    assert_eq!(status, StatusCode::OK);
    let match_id = created["match_id"].as_str().expect("Match id").to_string();

    let (status, state) = send(&test.app, get(&format!("/match/{}", match_id), Some(&key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "active");
    assert_eq!(state["score"], 0);
    assert_eq!(state["board"].as_array().expect("Board rows").len(), 3);
    assert_eq!(state["board"][0][0]["state"], "unrevealed");

    let (status, bad) = send(&test.app, post_move(&match_id, &key, r#"{"x": 9, "y": 0}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(bad["error"].is_string());

    let (status, bad) = send(&test.app, post_move(&match_id, &key, "garbage")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(bad["error"].is_string());

    // Play unrevealed cells until the budget runs out.
    let mut state = state;
    while state["status"] == "active" {
        let (x, y) = (0..3)
            .flat_map(|y| (0..3).map(move |x| (x, y)))
            .find(|(x, y)| state["board"][*y][*x]["state"] == "unrevealed")
            .expect("Open cell while active");
        let (status, next) = send(
            &test.app,
            post_move(&match_id, &key, &json!({"x": x, "y": y.to_string()}).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        state = next;
    }
    assert_eq!(state["status"], "finished");
    let final_score = state["score"].as_i64().expect("Score");
    assert!(final_score > 0);

    // Finished matches return their state for any payload.
    let (status, frozen) = send(&test.app, post_move(&match_id, &key, "garbage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(frozen, state);

    let (status, results) = send(
        &test.app,
        get(&format!("/match/{}/results", match_id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        results,
        json!({"players": [{"user": "bob", "score": final_score}]})
    );

    let (status, board) = send(&test.app, get("/leaderboard", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board, json!([{"user_id": "bob", "score": final_score as f64}]));

    // Publication runs in the background; give it a moment to land.
    let page = test.site.path().join(HOF_KEY);
    for _ in 0..50 {
        if std::fs::read_to_string(&page).is_ok_and(|html| html.contains("bob")) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Hall of fame was not published");
}

#[tokio::test]
async fn test_matches_are_private_to_their_key() {
    let test = setup_app(MatchSettings::default());
    let owner = login(&test.app, "carol").await;
    let other = login(&test.app, "dave").await;

    let (_, created) = send(&test.app, put_match(&owner)).await;
    let match_id = created["match_id"].as_str().expect("Match id").to_string();

    let (status, _) = send(&test.app, get(&format!("/match/{}", match_id), Some(&other))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, post_move(&match_id, &other, r#"{"x": 0, "y": 0}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, get("/match/unknown", Some(&owner))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
