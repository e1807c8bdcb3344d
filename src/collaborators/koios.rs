//! Policy holder lookup against a Koios indexer.

use super::{check_status, CollaboratorError, HolderSource, PolicyHolder};
use crate::config::{validate_policy_id, Config, Network};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Koios caps responses at 1000 rows.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct KoiosClient {
    http: Client,
    base_url_override: Option<Url>,
    token: Option<String>,
    page_size: usize,
}

impl KoiosClient {
    pub fn new(timeout: Duration) -> Result<Self, CollaboratorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url_override: None,
            token: None,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, CollaboratorError> {
        let mut client = Self::new(Duration::from_secs(config.request_timeout_secs))?;
        client.base_url_override = config.koios_url_override.clone();
        client.token = config.koios_token.clone();
        Ok(client)
    }

    /// Query a fixed endpoint regardless of the requested network.
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url_override = Some(url);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn endpoint(&self, network: Network) -> String {
        let base = match &self.base_url_override {
            Some(url) => url.as_str().to_string(),
            None => network.koios_url().to_string(),
        };
        format!("{}/policy_asset_addresses", base.trim_end_matches('/'))
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        policy_id: &str,
        offset: usize,
    ) -> Result<Vec<PolicyHolder>, CollaboratorError> {
        let offset = offset.to_string();
        let limit = self.page_size.to_string();
        let mut request = self.http.get(endpoint).query(&[
            ("_asset_policy", policy_id),
            ("offset", offset.as_str()),
            ("limit", limit.as_str()),
        ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = check_status(request.send().await?).await?;
        let page = response.json::<Vec<PolicyHolder>>().await?;
        Ok(page)
    }
}

#[async_trait]
impl HolderSource for KoiosClient {
    async fn fetch_addresses_from_policy(
        &self,
        policy_id: &str,
        network: Network,
    ) -> Result<Vec<PolicyHolder>, CollaboratorError> {
        let policy_id = validate_policy_id(policy_id)
            .map_err(|e| CollaboratorError::InvalidInput(e.to_string()))?;
        let endpoint = self.endpoint(network);
        info!("Fetching holders of policy {} on {}", policy_id, network);

        let mut holders = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch_page(&endpoint, &policy_id, offset).await?;
            let count = page.len();
            debug!("Koios page at offset {} returned {} rows", offset, count);
            if count == 0 {
                break;
            }
            holders.extend(page);
            offset += count;
        }
        Ok(holders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_http::{serve, Incoming, Reply};
    use crate::types::test_support::sample_address;

    fn holders_json(addresses: &[String]) -> String {
        let rows: Vec<String> = addresses
            .iter()
            .map(|a| format!(r#"{{"asset_name":"4e4654","payment_address":"{}","quantity":"1"}}"#, a))
            .collect();
        format!("[{}]", rows.join(","))
    }

    #[test]
    fn test_endpoint_per_network() {
        let client = KoiosClient::new(Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(Network::Preview),
            "https://preview.koios.rest/api/v1/policy_asset_addresses"
        );
        let client = client.with_base_url(Url::parse("http://127.0.0.1:9/api/v1/").unwrap());
        assert_eq!(
            client.endpoint(Network::Mainnet),
            "http://127.0.0.1:9/api/v1/policy_asset_addresses"
        );
    }

    #[tokio::test]
    async fn test_rejects_bad_policy_id_without_request() {
        let client = KoiosClient::new(Duration::from_secs(1)).unwrap();
        let result = client.fetch_addresses_from_policy("nothex", Network::Mainnet).await;
        assert!(matches!(result, Err(CollaboratorError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_paginates_until_empty_page() {
        let first = holders_json(&[sample_address('a'), sample_address('c')]);
        let second = holders_json(&[sample_address('x')]);
        let base = serve(move |request: &Incoming| {
            assert_eq!(request.param("_asset_policy"), Some("ab".repeat(28).as_str()));
            assert_eq!(request.param("limit"), Some("2"));
            match request.param("offset") {
                Some("0") => Reply::ok(first.clone()),
                Some("2") => Reply::ok(second.clone()),
                Some("3") => Reply::ok("[]".to_string()),
                _ => Reply::status(400, "unexpected offset"),
            }
        })
        .await;

        let client = KoiosClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(Url::parse(&base).unwrap())
            .with_page_size(2);
        let holders = client
            .fetch_addresses_from_policy(&"ab".repeat(28), Network::Mainnet)
            .await
            .unwrap();
        let addresses: Vec<String> = holders.into_iter().map(|h| h.payment_address).collect();
        assert_eq!(
            addresses,
            vec![sample_address('a'), sample_address('c'), sample_address('x')]
        );
    }

    #[tokio::test]
    async fn test_server_page_cap_below_limit_keeps_paging() {
        let rows = [sample_address('a'), sample_address('c'), sample_address('x')];
        let base = serve(move |request: &Incoming| {
            let offset: usize = request.param("offset").unwrap().parse().unwrap();
            // Server returns one row per page whatever limit is asked for.
            Reply::ok(holders_json(&rows[offset.min(rows.len())..(offset + 1).min(rows.len())]))
        })
        .await;

        let client = KoiosClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(Url::parse(&base).unwrap());
        let holders = client
            .fetch_addresses_from_policy(&"ab".repeat(28), Network::Mainnet)
            .await
            .unwrap();
        assert_eq!(holders.len(), 3);
        assert_eq!(holders[2].payment_address, sample_address('x'));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let base = serve(|_: &Incoming| Reply::status(503, "maintenance")).await;
        let client = KoiosClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(Url::parse(&base).unwrap());
        let result = client
            .fetch_addresses_from_policy(&"ab".repeat(28), Network::Mainnet)
            .await;
        match result {
            Err(CollaboratorError::Http { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("maintenance"));
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let base = serve(|request: &Incoming| {
            if request.bearer() == Some("secret-token") {
                Reply::ok("[]".to_string())
            } else {
                Reply::status(401, "missing token")
            }
        })
        .await;
        let client = KoiosClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(Url::parse(&base).unwrap())
            .with_token("secret-token");
        let holders = client
            .fetch_addresses_from_policy(&"ab".repeat(28), Network::Mainnet)
            .await
            .unwrap();
        assert!(holders.is_empty());
    }
}
