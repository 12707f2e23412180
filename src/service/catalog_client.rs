//! Catalog dialect HTTP client: `player_api.php` authenticate / categories /
//! streams (§4.1 "Contract — Catalog fetch", §6 "Upstream wire formats").

use std::time::Duration;

use reqwest::Client;

use crate::error::Error;
use crate::models::{CatalogAuthResponse, CatalogCategory, CatalogStream};
use crate::Result;

/// Thin session wrapper over one upstream's `player_api.php`. Holds no
/// server-side session token — every request re-sends `username`/`password`
/// as query params, matching the upstream's stateless auth model.
pub struct CatalogClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// `authenticate`: the first call of any catalog refresh. A non-success
    /// response is an `Authentication` error, not `NetworkTransient` — it
    /// means the credentials were rejected, not that the network failed.
    pub async fn authenticate(&self) -> Result<CatalogAuthResponse> {
        let url = format!("{}/player_api.php", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = truncated_body(resp).await;
            return Err(Error::UpstreamStatus { status: status.as_u16(), snippet: body });
        }

        let body = resp.text().await.map_err(Error::Http)?;
        let parsed: CatalogAuthResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Deserialization { context: format!("authenticate response: {e}") })?;
        if !parsed.is_authenticated() {
            return Err(Error::Authentication("catalog authenticate rejected credentials".to_string()));
        }
        Ok(parsed)
    }

    pub async fn get_live_categories(&self) -> Result<Vec<CatalogCategory>> {
        self.action("get_live_categories").await
    }

    /// A single bulk request for every live stream the account can see; the
    /// caller filters by enabled category ids client-side (§4.1).
    pub async fn get_live_streams(&self) -> Result<Vec<CatalogStream>> {
        self.action("get_live_streams").await
    }

    async fn action<T: serde::de::DeserializeOwned>(&self, action: &str) -> Result<T> {
        let url = format!("{}/player_api.php", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("action", action),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = truncated_body(resp).await;
            return Err(Error::UpstreamStatus { status: status.as_u16(), snippet: body });
        }

        let body = resp.text().await.map_err(Error::Http)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Deserialization { context: format!("{action} response: {e}") })
    }
}

async fn truncated_body(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) => text.chars().take(500).collect(),
        Err(_) => String::new(),
    }
}

/// Connect/read timeouts and refused connections are transient; everything
/// else reqwest can raise at the transport layer is not retriable here.
fn classify_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::NetworkTransient(err.to_string())
    } else {
        Error::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_normalizes_trailing_slash_in_base_url() {
        let client = CatalogClient::new("http://host:80/", "u", "p", "ua/1.0").unwrap();
        assert_eq!(client.base_url(), "http://host:80");
    }
}
