//! HTTP access to the grid inventory API.
//!
//! Every task run authenticates once against the identity endpoint and holds
//! the bearer token for the duration of that run. Non-success responses are
//! surfaced as [`SyncError::RemoteRejected`] with the body attached, except
//! for the platform lookup where a 404 has its own meaning.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::domain::wheel::{TransferWheel, WheelPayload, WheelstackPayload};
use crate::error::{Result, SyncError};

/// Document-store operations used by the pipeline.
#[async_trait]
pub trait GridApi: Send + Sync {
	/// Resolves a platform name to its document id.
	async fn resolve_platform(&self, name: &str) -> Result<String>;

	/// Creates a wheel document and returns its id.
	async fn create_wheel(&self, payload: &WheelPayload<'_>) -> Result<String>;

	/// Creates a wheelstack document and returns its id. Success is
	/// specifically 201; anything else fails the stack.
	async fn create_wheelstack(&self, payload: &WheelstackPayload<'_>) -> Result<String>;

	/// Flags one wheel's transfer as propagated.
	async fn mark_transferred(&self, wheel_id: &str) -> Result<()>;

	/// Deletes one wheel document.
	async fn delete_wheel(&self, wheel_id: &str) -> Result<()>;

	/// All wheels with an unpropagated transfer, scan data included.
	async fn fetch_pending_transfers(&self) -> Result<Vec<TransferWheel>>;
}

#[derive(Deserialize)]
struct DocumentId {
	#[serde(rename = "_id")]
	id: String,
}

#[derive(Deserialize)]
struct AccessToken {
	access_token: String,
}

/// Builds the HTTP client shared by all runs. The timeout covers the whole
/// request, connect included.
pub fn http_client(api: &ApiConfig) -> Result<Client> {
	Ok(Client::builder().timeout(api.timeout).build()?)
}

/// [`GridApi`] over HTTP, bound to a token obtained at construction.
pub struct HttpGridApi {
	client: Client,
	base_url: String,
	token: String,
}

impl HttpGridApi {
	/// Logs in with the configured credentials. Any failure here, transport
	/// or response, is [`SyncError::AuthFailed`] and aborts the run before
	/// it touches a store.
	pub async fn login(client: Client, api: &ApiConfig) -> Result<Self> {
		let url = format!("{}/users/login", api.auth_address);
		let response = client
			.post(&url)
			.form(&[
				("username", api.auth_login.as_str()),
				("password", api.auth_password.as_str()),
			])
			.send()
			.await
			.map_err(|e| SyncError::AuthFailed(e.to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			return Err(SyncError::AuthFailed(format!("{status}: {body}")));
		}

		let token: AccessToken = response
			.json()
			.await
			.map_err(|e| SyncError::AuthFailed(e.to_string()))?;

		Ok(Self {
			client,
			base_url: api.base_url.clone(),
			token: token.access_token,
		})
	}

	async fn rejected(response: Response) -> SyncError {
		let status = response.status();
		let body = response.text().await.unwrap_or_default();
		SyncError::RemoteRejected { status, body }
	}
}

#[async_trait]
impl GridApi for HttpGridApi {
	async fn resolve_platform(&self, name: &str) -> Result<String> {
		let url = format!("{}/platform/name/{name}", self.base_url);
		let response = self
			.client
			.get(&url)
			.bearer_auth(&self.token)
			.send()
			.await?;

		if response.status() == StatusCode::NOT_FOUND {
			return Err(SyncError::PlatformNotFound(name.to_string()));
		}
		if !response.status().is_success() {
			return Err(Self::rejected(response).await);
		}

		let document: DocumentId = response.json().await?;
		Ok(document.id)
	}

	async fn create_wheel(&self, payload: &WheelPayload<'_>) -> Result<String> {
		let url = format!("{}/wheels", self.base_url);
		let response = self
			.client
			.post(&url)
			.bearer_auth(&self.token)
			.json(payload)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(Self::rejected(response).await);
		}

		let document: DocumentId = response.json().await?;
		Ok(document.id)
	}

	async fn create_wheelstack(&self, payload: &WheelstackPayload<'_>) -> Result<String> {
		let url = format!("{}/wheelstacks", self.base_url);
		let response = self
			.client
			.post(&url)
			.bearer_auth(&self.token)
			.json(payload)
			.send()
			.await?;

		if response.status() != StatusCode::CREATED {
			return Err(Self::rejected(response).await);
		}

		let document: DocumentId = response.json().await?;
		Ok(document.id)
	}

	async fn mark_transferred(&self, wheel_id: &str) -> Result<()> {
		let url = format!(
			"{}/wheels/transfer/update/{wheel_id}?transfer_status=true",
			self.base_url
		);
		let response = self
			.client
			.patch(&url)
			.bearer_auth(&self.token)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(Self::rejected(response).await);
		}
		Ok(())
	}

	async fn delete_wheel(&self, wheel_id: &str) -> Result<()> {
		let url = format!("{}/wheels/{wheel_id}", self.base_url);
		let response = self
			.client
			.delete(&url)
			.bearer_auth(&self.token)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(Self::rejected(response).await);
		}
		Ok(())
	}

	async fn fetch_pending_transfers(&self) -> Result<Vec<TransferWheel>> {
		let url = format!(
			"{}/wheels/transfer/all?include_data=true&transfer_status=false&correct_status=true",
			self.base_url
		);
		let response = self
			.client
			.get(&url)
			.bearer_auth(&self.token)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(Self::rejected(response).await);
		}

		Ok(response.json().await?)
	}
}
