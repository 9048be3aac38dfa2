//! Demonstrates a scheduler configured from JSON that mints OAuth 2.0 client-credentials tokens
//! and dispatches a burst of requests against a mock origin under a concurrency ceiling.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use origin_scheduler::{RequestOptions, Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let orders_mock = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"status": "shipped"
			}));
		})
		.await;
	let config = SchedulerConfig::from_json_str(&format!(
		r#"{{
			"origin": "{origin}",
			"getAuthorisation": {{
				"auth_method": "oauth2",
				"uri": "{origin}/token",
				"client_id": "demo-client",
				"client_secret": "demo-secret"
			}},
			"checkedOutMax": 2,
			"postAuthFetchFreeze": 250
		}}"#,
		origin = server.base_url(),
	))?;
	let scheduler = Scheduler::new(config)?;
	let pending = (1..=4)
		.map(|id| scheduler.submit(RequestOptions::get(format!("/orders/{id}"))))
		.collect::<Vec<_>>();
	let urgent = scheduler.submit_priority(RequestOptions::get("/orders/urgent"));
	let response = urgent.await?;

	println!("Urgent order answered with {} after {} attempt(s).", response.status, response.attempts);

	for (index, handle) in pending.into_iter().enumerate() {
		let response = handle.await?;

		println!("Order #{} body: {:?}.", index + 1, response.body);
	}

	token_mock.assert_calls_async(1).await;
	orders_mock.assert_calls_async(5).await;

	println!("One token exchange served {} dispatch attempts.", scheduler.metrics().attempts());

	Ok(())
}
