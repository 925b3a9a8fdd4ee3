use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;
use crate::aggregate::InactivePolls;
use crate::config::CorsConfig;
use crate::entities::prelude::*;
use crate::realtime::PollEvent;
use crate::state::testing::test_state;

async fn app(visibility: InactivePolls) -> (Router, AppState) {
    let state = test_state(visibility).await;
    let cors = CorsConfig {
        allowed_origins: vec!["*".to_string()],
    };
    (router(state.clone(), &cors), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request builds"))
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is json")
    };
    (status, value)
}

async fn create_poll(app: &Router, question: &str, options: &[&str]) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/polls",
        Some(json!({ "question": question, "options": options })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["poll"].clone()
}

fn option_id(poll: &Value, index: usize) -> String {
    poll["options"][index]["id"]
        .as_str()
        .expect("option id")
        .to_string()
}

#[tokio::test]
async fn tea_or_coffee_walkthrough() {
    let (app, state) = app(InactivePolls::Include).await;
    let mut events = state.events.subscribe();

    let poll = create_poll(&app, "Tea or coffee?", &["Tea", "Coffee"]).await;
    assert_eq!(poll["createdBy"], "Anonymous");
    assert_eq!(poll["isActive"], true);
    assert_eq!(poll["totalVotes"], 0);
    for option in poll["options"].as_array().unwrap() {
        assert_eq!(option["votes"], 0);
        assert_eq!(option["percentage"], 0.0);
    }
    let poll_id = poll["id"].as_str().unwrap().to_string();
    let tea = option_id(&poll, 0);
    let coffee = option_id(&poll, 1);

    let uri = format!("/api/polls/{poll_id}/vote");
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "userId": "u1", "optionId": tea })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote submitted");
    assert_eq!(body["poll"]["options"][0]["votes"], 1);
    assert_eq!(body["poll"]["options"][0]["percentage"], 100.0);
    assert_eq!(body["poll"]["options"][1]["votes"], 0);
    assert_eq!(body["poll"]["options"][1]["percentage"], 0.0);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "userId": "u1", "optionId": coffee })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote updated");
    assert_eq!(body["poll"]["totalVotes"], 1);
    assert_eq!(body["poll"]["options"][0]["votes"], 0);
    assert_eq!(body["poll"]["options"][0]["percentage"], 0.0);
    assert_eq!(body["poll"]["options"][1]["votes"], 1);
    assert_eq!(body["poll"]["options"][1]["percentage"], 100.0);

    assert_eq!(Vote::find().count(&state.database).await.unwrap(), 1);

    let created = events.recv().await.expect("created event");
    assert_eq!(created.name(), "poll:created");
    let first_vote = events.recv().await.expect("first vote event");
    let second_vote = events.recv().await.expect("second vote event");
    match (&*first_vote, &*second_vote) {
        (PollEvent::VoteUpdated(first), PollEvent::VoteUpdated(second)) => {
            assert_eq!(first.previous_option_id, None);
            assert_eq!(second.previous_option_id.as_deref(), Some(tea.as_str()));
            assert_eq!(second.option_id, coffee);
            assert_eq!(second.poll.total_votes, 1);
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn option_count_outside_bounds_persists_nothing() {
    let (app, state) = app(InactivePolls::Include).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/polls",
        Some(json!({ "question": "Lonely?", "options": ["Only"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let eleven: Vec<String> = (0..11).map(|i| format!("Option {i}")).collect();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/polls",
        Some(json!({ "question": "Too many?", "options": eleven })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Maximum 10 options allowed");

    assert_eq!(Poll::find().count(&state.database).await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_create_requests_use_the_error_envelope() {
    let (app, _) = app(InactivePolls::Include).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/polls",
        Some(json!({ "options": ["a", "b"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "question is required");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/polls")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn created_by_is_kept_when_given() {
    let (app, _) = app(InactivePolls::Include).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/polls",
        Some(json!({ "question": "Cats?", "options": ["Yes", "No"], "createdBy": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["poll"]["createdBy"], "Ada");
    assert_eq!(body["poll"]["options"][1]["order"], 1);
}

#[tokio::test]
async fn vote_validation_order_and_invalid_option() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Tea or coffee?", &["Tea", "Coffee"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let uri = format!("/api/polls/{poll_id}/vote");

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "optionId": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "userId is required");

    let missing_poll = format!("/api/polls/{}/vote", uuid::Uuid::new_v4());
    let (status, _) = send(
        &app,
        Method::POST,
        &missing_poll,
        Some(json!({ "userId": "u1", "optionId": option_id(&poll, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polls/not-a-uuid/vote",
        Some(json!({ "userId": "u1", "optionId": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "userId": "u1", "optionId": "not-an-option" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid option");

    assert_eq!(Vote::find().count(&state.database).await.unwrap(), 0);
}

#[tokio::test]
async fn option_counts_sum_to_total_votes() {
    let (app, _) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Pick one", &["A", "B", "C"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let uri = format!("/api/polls/{poll_id}/vote");

    let choices = [0, 1, 0, 2, 0, 1, 0];
    for (voter, choice) in choices.iter().enumerate() {
        let (status, _) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "userId": format!("voter-{voter}"), "optionId": option_id(&poll, *choice) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, Method::GET, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let aggregate = &body["poll"];
    assert_eq!(aggregate["totalVotes"], 7);
    let summed: u64 = aggregate["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|option| option["votes"].as_u64().unwrap())
        .sum();
    assert_eq!(summed, 7);
    assert_eq!(aggregate["options"][0]["percentage"], 57.1);
    assert_eq!(aggregate["options"][1]["percentage"], 28.6);
    assert_eq!(aggregate["options"][2]["percentage"], 14.3);
}

#[tokio::test]
async fn removing_a_vote_and_looking_it_up() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Tea or coffee?", &["Tea", "Coffee"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let tea = option_id(&poll, 0);

    let lookup = format!("/api/polls/{poll_id}/vote/user?userId=u1");
    let (_, body) = send(&app, Method::GET, &lookup, None).await;
    assert_eq!(body["voted"], false);
    assert_eq!(body["optionId"], Value::Null);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/polls/{poll_id}/vote/user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let vote_uri = format!("/api/polls/{poll_id}/vote");
    send(
        &app,
        Method::POST,
        &vote_uri,
        Some(json!({ "userId": "u1", "optionId": tea })),
    )
    .await;
    let (_, body) = send(&app, Method::GET, &lookup, None).await;
    assert_eq!(body["voted"], true);
    assert_eq!(body["optionId"], tea.as_str());

    let mut events = state.events.subscribe();
    let (status, body) = send(&app, Method::DELETE, &vote_uri, Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote removed");
    assert_eq!(body["poll"]["totalVotes"], 0);
    let removed = events.recv().await.expect("removal event");
    assert_eq!(removed.name(), "vote:removed");

    let (_, body) = send(&app, Method::DELETE, &vote_uri, Some(json!({ "userId": "u1" }))).await;
    assert_eq!(body["message"], "No vote to remove");
    assert!(events.try_recv().is_err());

    let (status, _) = send(&app, Method::DELETE, &vote_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_then_unlike_restores_count() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Like me?", &["Yes", "No"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let like_uri = format!("/api/polls/{poll_id}/like");
    let lookup = format!("/api/polls/{poll_id}/like/user?userId=u1");

    send(&app, Method::POST, &like_uri, Some(json!({ "userId": "u2" }))).await;
    let (_, before) = send(&app, Method::GET, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(before["poll"]["totalLikes"], 1);

    let mut events = state.events.subscribe();
    let (status, body) = send(&app, Method::POST, &like_uri, Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], true);
    assert_eq!(body["totalLikes"], 2);
    let (_, body) = send(&app, Method::GET, &lookup, None).await;
    assert_eq!(body["liked"], true);

    let (_, body) = send(&app, Method::POST, &like_uri, Some(json!({ "userId": "u1" }))).await;
    assert_eq!(body["liked"], false);
    assert_eq!(body["totalLikes"], 1);
    let (_, body) = send(&app, Method::GET, &lookup, None).await;
    assert_eq!(body["liked"], false);

    let first = events.recv().await.expect("like event");
    let second = events.recv().await.expect("unlike event");
    match (&*first, &*second) {
        (PollEvent::LikeUpdated(like), PollEvent::LikeUpdated(unlike)) => {
            assert!(like.liked);
            assert!(!unlike.liked);
            assert_eq!(unlike.poll.total_likes, 1);
        }
        other => panic!("unexpected events: {other:?}"),
    }

    let (status, _) = send(&app, Method::POST, &like_uri, Some(json!({ "userId": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let missing = format!("/api/polls/{}/like", uuid::Uuid::new_v4());
    let (status, _) = send(&app, Method::POST, &missing, Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_is_active_only_and_newest_first() {
    let (app, _) = app(InactivePolls::Include).await;
    let first = create_poll(&app, "First?", &["a", "b"]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = create_poll(&app, "Second?", &["a", "b"]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = create_poll(&app, "Third?", &["a", "b"]).await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/polls/{}", second["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Poll deleted successfully");

    let (status, body) = send(&app, Method::GET, "/api/polls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["polls"][0]["id"], third["id"]);
    assert_eq!(body["polls"][1]["id"], first["id"]);
}

#[tokio::test]
async fn deleted_poll_stays_resolvable_when_inactive_polls_are_served() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Gone?", &["Yes", "No"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let mut events = state.events.subscribe();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let deleted = events.recv().await.expect("deletion event");
    assert_eq!(deleted.name(), "poll:deleted");
    assert_eq!(deleted.poll_id().map(|id| id.to_string()).as_deref(), Some(poll_id));

    let (status, body) = send(&app, Method::GET, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poll"]["isActive"], false);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{poll_id}/vote"),
        Some(json!({ "userId": "u1", "optionId": option_id(&poll, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = Poll::find_by_id(uuid::Uuid::parse_str(poll_id).unwrap())
        .one(&state.database)
        .await
        .unwrap()
        .expect("row retained");
    assert!(!stored.is_active);
}

#[tokio::test]
async fn deleted_poll_is_hidden_when_inactive_polls_are_excluded() {
    let (app, state) = app(InactivePolls::Exclude).await;
    let poll = create_poll(&app, "Gone?", &["Yes", "No"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    send(
        &app,
        Method::POST,
        &format!("/api/polls/{poll_id}/like"),
        Some(json!({ "userId": "u1" })),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Poll not found");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{poll_id}/vote"),
        Some(json!({ "userId": "u1", "optionId": option_id(&poll, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, Method::GET, "/api/polls", None).await;
    assert_eq!(body["count"], 0);

    assert_eq!(Poll::find().count(&state.database).await.unwrap(), 1);
    assert_eq!(Like::find().count(&state.database).await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_routes_and_health() {
    let (app, _) = app(InactivePolls::Include).await;

    let (status, body) = send(&app, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "message": "Route not found" }));

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "live");

    let (status, body) = send(&app, Method::GET, "/api/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["polls"], "/api/polls");
}

#[tokio::test]
async fn server_error_detail_follows_the_state() {
    for expose in [false, true] {
        let state = test_state(InactivePolls::Include)
            .await
            .with_error_detail(expose);
        state
            .database
            .execute_unprepared("DROP TABLE likes")
            .await
            .expect("table drops");
        let cors = CorsConfig {
            allowed_origins: vec!["*".to_string()],
        };
        let app = router(state, &cors);

        let uri = format!("/api/polls/{}/like/user?userId=u1", uuid::Uuid::new_v4());
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal Server Error");
        assert_eq!(body.get("detail").is_some(), expose, "expose = {expose}");
    }
}

#[tokio::test]
async fn client_errors_never_carry_detail() {
    let state = test_state(InactivePolls::Include)
        .await
        .with_error_detail(true);
    let cors = CorsConfig {
        allowed_origins: vec!["*".to_string()],
    };
    let app = router(state, &cors);

    let (status, body) = send(&app, Method::GET, "/api/polls/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "message": "Poll not found" }));
}

#[tokio::test]
async fn voter_ids_are_kept_verbatim() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Tea or coffee?", &["Tea", "Coffee"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let uri = format!("/api/polls/{poll_id}/vote");
    let mut events = state.events.subscribe();

    let (status, first) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "userId": "u1", "optionId": option_id(&poll, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Vote submitted");

    let (status, second) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "userId": " u1 ", "optionId": option_id(&poll, 1) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "Vote submitted");
    assert_eq!(second["poll"]["totalVotes"], 2);
    assert_eq!(Vote::find().count(&state.database).await.unwrap(), 2);

    events.recv().await.expect("first vote event");
    let padded = events.recv().await.expect("second vote event");
    match &*padded {
        PollEvent::VoteUpdated(update) => assert_eq!(update.user_id, " u1 "),
        other => panic!("unexpected event: {other:?}"),
    }

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/polls/{poll_id}/vote/user?userId=%20u1%20"),
        None,
    )
    .await;
    assert_eq!(body["optionId"], option_id(&poll, 1).as_str());
}

#[tokio::test]
async fn concurrent_first_votes_converge_on_one_row() {
    let (app, state) = app(InactivePolls::Include).await;
    let poll = create_poll(&app, "Tea or coffee?", &["Tea", "Coffee"]).await;
    let poll_id = poll["id"].as_str().unwrap();
    let uri = format!("/api/polls/{poll_id}/vote");

    let tea = json!({ "userId": "u1", "optionId": option_id(&poll, 0) });
    let coffee = json!({ "userId": "u1", "optionId": option_id(&poll, 1) });
    let ((first, _), (second, _)) = tokio::join!(
        send(&app, Method::POST, &uri, Some(tea)),
        send(&app, Method::POST, &uri, Some(coffee)),
    );
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);

    assert_eq!(Vote::find().count(&state.database).await.unwrap(), 1);
    let (_, body) = send(&app, Method::GET, &format!("/api/polls/{poll_id}"), None).await;
    assert_eq!(body["poll"]["totalVotes"], 1);
}
