//! User-info endpoint lookup through the provider's discovery document.

use flowery_domain::constants::DISCOVERY_PATH;
use tracing::{debug, warn};

use crate::http::HttpClient;

#[derive(Clone)]
pub struct DiscoveryResolver {
    discovery_url: String,
    http: HttpClient,
}

impl DiscoveryResolver {
    /// `authority` may carry a trailing slash.
    pub fn new(authority: &str, http: HttpClient) -> Self {
        let discovery_url = format!("{}{}", authority.trim_end_matches('/'), DISCOVERY_PATH);
        Self { discovery_url, http }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    /// Fetch the document and read `userinfo_endpoint`.
    ///
    /// Any failure yields `None`; nothing is cached here.
    pub async fn userinfo_endpoint(&self) -> Option<String> {
        debug!(url = %self.discovery_url, "fetching discovery document");
        let document = match self.http.get_json(&self.discovery_url).await {
            Ok(document) => document,
            Err(err) => {
                warn!(url = %self.discovery_url, error = %err, "discovery document unavailable");
                return None;
            }
        };

        let endpoint = document
            .get("userinfo_endpoint")
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        if endpoint.is_none() {
            warn!(url = %self.discovery_url, "discovery document has no userinfo_endpoint");
        }
        endpoint
    }
}
