#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use origin_scheduler::{
	AuthStrategy, Error, RequestOptions, ResponseBody, Scheduler, SchedulerConfig,
	auth::ClientCredentials,
	error::AttemptError,
	url::Url,
};

fn config(server: &MockServer) -> SchedulerConfig {
	SchedulerConfig::new(Url::parse(&server.base_url()).expect("Mock origin should parse."))
		.with_post_auth_fetch_freeze(Duration::ZERO)
		.with_log_requests(false)
}

#[tokio::test]
async fn oauth2_credentials_authorize_origin_calls() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"issued-token\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let items = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/items")
				.header("authorization", "Bearer issued-token")
				.header("content-type", "application/json")
				.json_body(json!({ "name": "widget" }));
			then.status(201).header("content-type", "application/json").json_body(json!({ "id": 7 }));
		})
		.await;
	let settings = ClientCredentials::new(
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."),
		"client",
		"secret",
	);
	let scheduler =
		Scheduler::new(config(&server).with_authorisation(AuthStrategy::OAuth2(settings)))
			.expect("Scheduler should build.");
	let (first, second) = tokio::join!(
		scheduler.submit(RequestOptions::post("/items").with_json(json!({ "name": "widget" }))),
		scheduler.submit(RequestOptions::post("/items").with_json(json!({ "name": "widget" }))),
	);

	for response in [first, second] {
		let response = response.expect("Authorized calls should succeed.");

		assert_eq!(response.status, 201);
		assert_eq!(response.body, ResponseBody::Json(json!({ "id": 7 })));
	}

	token.assert_calls_async(1).await;
	items.assert_calls_async(2).await;
}

#[tokio::test]
async fn rejected_statuses_are_retried_until_exhausted() {
	let server = MockServer::start_async().await;
	let missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/missing");
			then.status(404).body("not here");
		})
		.await;
	let scheduler = Scheduler::new(config(&server).with_max_attempts_per_request(2))
		.expect("Scheduler should build.");
	let err = scheduler
		.submit(RequestOptions::get("/missing").not_json())
		.await
		.expect_err("404 responses should exhaust the ceiling.");

	match err {
		Error::Exhausted { attempts: 2, last: AttemptError::Status { response } } => {
			assert_eq!(response.status, 404);
			assert_eq!(response.body, b"not here");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	missing.assert_calls_async(2).await;
}

#[tokio::test]
async fn basic_credentials_and_raw_bodies_pass_through() {
	let server = MockServer::start_async().await;
	let upload = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/upload")
				.header("authorization", "Basic dXNlcjpwYXNz")
				.header("content-type", "text/plain")
				.body("raw payload");
			then.status(200).body("stored");
		})
		.await;
	let scheduler =
		Scheduler::new(config(&server).with_authorisation(AuthStrategy::basic("user", "pass")))
			.expect("Scheduler should build.");
	let response = scheduler
		.submit(
			RequestOptions::new(origin_scheduler::Method::PUT, "/upload")
				.with_header("content-type", "text/plain")
				.with_bytes("raw payload")
				.not_json(),
		)
		.await
		.expect("Upload should succeed.");

	assert_eq!(response.body, ResponseBody::Bytes(b"stored".to_vec()));

	upload.assert_async().await;
}
