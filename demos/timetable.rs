//! Signs in against a mocked timetable backend, lets the access token expire, and shows the
//! client refreshing it transparently before printing the weekly grid.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use timetable_client::{
	api::Day,
	client::AuthClient,
	config::ClientConfig,
	redirect::{FnRedirect, UnauthenticatedReason},
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"meta": { "user_id": null, "status": 200 },
				"data": { "access_token": "demo-a1", "refresh_token": "demo-r1", "token_type": "bearer" }
			}));
		})
		.await;
	let expired_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/timetable").header("authorization", "bearer demo-a1");
			then.status(401)
				.header("content-type", "application/json")
				.json_body(json!({ "code": "AUTHORIZATION_FAILED", "message": "Token expired." }));
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"meta": { "user_id": null, "status": 200 },
				"data": { "access_token": "demo-a2", "refresh_token": "demo-r2", "token_type": "bearer" }
			}));
		})
		.await;
	let timetable_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/timetable").header("authorization", "bearer demo-a2");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"meta": { "user_id": "01HDEMO", "status": 200 },
				"data": {
					"username": "demo",
					"name": "Demo Student",
					"timetable": [
						{
							"division": 1,
							"room": "A101",
							"subject": "Physics",
							"teacher": "Park",
							"periods": [
								{ "period": 1, "day": "Mon" },
								{ "period": 2, "day": "Mon" },
								{ "period": 5, "day": "Wed" }
							]
						},
						{
							"division": 3,
							"subject": "Literature",
							"teacher": "Han",
							"periods": [{ "period": 3, "day": "Mon" }]
						}
					]
				}
			}));
		})
		.await;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let config = ClientConfig::builder(Url::parse(&server.url("/api"))?)
		.login_entry_point("/login")
		.build()?;
	let client = AuthClient::new(store, config).with_redirect(Arc::new(FnRedirect(
		|location: &str, reason: UnauthenticatedReason| {
			println!("Session ended ({reason}); redirecting to {location}.")
		},
	)));

	client.login("demo", "correct horse").await?;

	let timetable = client.fetch_timetable().await?;

	println!("Timetable for {}:", timetable.name);

	for day in Day::ALL {
		for block in timetable.blocks_on(day) {
			let Some(class) = timetable.class_of(block) else { continue };

			println!(
				"  {day} periods {}-{}: {} with {} ({})",
				block.period_from,
				block.period_to,
				class.subject,
				class.teacher,
				class.room.as_deref().unwrap_or("room TBA"),
			);
		}
	}

	println!(
		"Refresh attempts: {}, joins: {}.",
		client.refresh_metrics.attempts(),
		client.refresh_metrics.joins()
	);

	login_mock.assert_async().await;
	expired_mock.assert_async().await;
	refresh_mock.assert_async().await;
	timetable_mock.assert_async().await;

	Ok(())
}
