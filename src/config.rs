use crate::retry::RetryPolicy;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Cardano networks the planner can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
}

/// Static per-network data: label, Koios endpoint, explorer.
#[derive(Clone, Debug)]
pub struct CardanoNetwork {
    pub network: Network,
    pub label: &'static str,
    pub koios_url: &'static str,
    pub explorer_url: &'static str,
}

impl CardanoNetwork {
    pub const fn new(
        network: Network,
        label: &'static str,
        koios_url: &'static str,
        explorer_url: &'static str,
    ) -> Self {
        Self {
            network,
            label,
            koios_url,
            explorer_url,
        }
    }
}

pub const NETWORKS: &[CardanoNetwork] = &[
    CardanoNetwork::new(
        Network::Mainnet,
        "Mainnet",
        "https://api.koios.rest/api/v1",
        "https://cardanoscan.io",
    ),
    CardanoNetwork::new(
        Network::Preprod,
        "Preprod",
        "https://preprod.koios.rest/api/v1",
        "https://preprod.cardanoscan.io",
    ),
    CardanoNetwork::new(
        Network::Preview,
        "Preview",
        "https://preview.koios.rest/api/v1",
        "https://preview.cardanoscan.io",
    ),
];

impl Network {
    pub fn info(&self) -> &'static CardanoNetwork {
        // NETWORKS holds one entry per variant.
        NETWORKS
            .iter()
            .find(|n| n.network == *self)
            .unwrap_or(&NETWORKS[0])
    }

    pub fn label(&self) -> &'static str {
        self.info().label
    }

    pub fn koios_url(&self) -> &'static str {
        self.info().koios_url
    }

    /// Address prefix used by payment addresses on this network.
    pub fn address_prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => crate::types::MAINNET_PREFIX,
            Network::Preprod | Network::Preview => crate::types::TESTNET_PREFIX,
        }
    }

    pub fn is_testnet(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Preprod
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        };
        f.write_str(s)
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "preprod" | "testnet" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            other => Err(anyhow!(
                "Unknown network '{}'. Expected mainnet, preprod or preview",
                other
            )),
        }
    }
}

/// Get the full URL to view a transaction on the block explorer
pub fn get_tx_explorer_url(network: Network, tx_hash: &str) -> String {
    format!("{}/transaction/{}", network.info().explorer_url, tx_hash)
}

/// Get the full URL to view an address on the block explorer
pub fn get_address_explorer_url(network: Network, address: &str) -> String {
    format!("{}/address/{}", network.info().explorer_url, address)
}

/// Check that a policy ID is 28 bytes of hex.
pub fn validate_policy_id(policy_id: &str) -> Result<String> {
    let trimmed = policy_id.trim().to_lowercase();
    if trimmed.len() != crate::types::POLICY_ID_HEX_LEN {
        return Err(anyhow!(
            "Policy ID must be {} hex characters, got {}",
            crate::types::POLICY_ID_HEX_LEN,
            trimmed.len()
        ));
    }
    hex::decode(&trimmed).map_err(|e| anyhow!("Policy ID '{}' is not hex: {}", trimmed, e))?;
    Ok(trimmed)
}

fn parse_url(raw: &str, what: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow!("Invalid {} '{}': {}", what, raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(anyhow!("{} must use http(s), got '{}'", what, scheme)),
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub network: Network,
    /// Overrides the network's default Koios endpoint.
    pub koios_url_override: Option<Url>,
    pub koios_token: Option<String>,
    pub blacklist_url: Option<Url>,
    pub retry: RetryPolicy,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            koios_url_override: None,
            koios_token: None,
            blacklist_url: None,
            retry: RetryPolicy::default(),
            request_timeout_secs: 30,
        }
    }

    /// Apply `TOKENDROP_*` environment variables on top of `self`.
    pub fn with_env(self) -> Result<Self> {
        let mut config = self;
        if let Some(v) = non_empty_var("TOKENDROP_NETWORK") {
            config.network = v.parse()?;
        }
        if let Some(raw) = non_empty_var("TOKENDROP_KOIOS_URL") {
            config.koios_url_override = Some(parse_url(&raw, "Koios URL")?);
        }
        if let Some(token) = non_empty_var("TOKENDROP_KOIOS_TOKEN") {
            config.koios_token = Some(token);
        }
        if let Some(raw) = non_empty_var("TOKENDROP_BLACKLIST_URL") {
            config.blacklist_url = Some(parse_url(&raw, "blacklist URL")?);
        }
        if let Some(v) = non_empty_var("TOKENDROP_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.retry.max_retries = v;
        }
        if let Some(v) = non_empty_var("TOKENDROP_RETRY_DELAY_MS").and_then(|v| v.parse().ok()) {
            config.retry.initial_delay_ms = v;
        }
        if let Some(v) = non_empty_var("TOKENDROP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout_secs = v;
        }
        Ok(config)
    }

    pub fn set_koios_url(&mut self, raw: &str) -> Result<()> {
        self.koios_url_override = Some(parse_url(raw, "Koios URL")?);
        Ok(())
    }

    pub fn set_blacklist_url(&mut self, raw: &str) -> Result<()> {
        self.blacklist_url = Some(parse_url(raw, "blacklist URL")?);
        Ok(())
    }

    /// Koios endpoint in effect for the configured network.
    pub fn koios_url(&self) -> Result<Url> {
        match &self.koios_url_override {
            Some(url) => Ok(url.clone()),
            None => parse_url(self.network.koios_url(), "Koios URL"),
        }
    }

    pub fn network_label(&self) -> &str {
        self.network.label()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_str() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!(" Preview ".parse::<Network>().unwrap(), Network::Preview);
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Preprod);
        assert!("ropsten".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_display_roundtrip() {
        for entry in NETWORKS {
            let parsed: Network = entry.network.to_string().parse().unwrap();
            assert_eq!(parsed, entry.network);
        }
    }

    #[test]
    fn test_network_koios_urls() {
        assert_eq!(Network::Mainnet.koios_url(), "https://api.koios.rest/api/v1");
        assert!(Network::Preprod.koios_url().starts_with("https://preprod."));
    }

    #[test]
    fn test_network_address_prefix() {
        assert_eq!(Network::Mainnet.address_prefix(), "addr1");
        assert_eq!(Network::Preview.address_prefix(), "addr_test1");
        assert!(Network::Preview.is_testnet());
    }

    #[test]
    fn test_explorer_urls() {
        assert_eq!(
            get_tx_explorer_url(Network::Mainnet, "abcd"),
            "https://cardanoscan.io/transaction/abcd"
        );
        assert_eq!(
            get_address_explorer_url(Network::Preprod, "addr_test1xyz"),
            "https://preprod.cardanoscan.io/address/addr_test1xyz"
        );
    }

    #[test]
    fn test_validate_policy_id() {
        let policy = "A".repeat(56);
        assert_eq!(validate_policy_id(&policy).unwrap(), "a".repeat(56));
        assert!(validate_policy_id("abcd").is_err());
        assert!(validate_policy_id(&"g".repeat(56)).is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.network, Network::Preprod);
        assert!(config.blacklist_url.is_none());
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_config_koios_url_override() {
        let mut config = Config::new(Network::Mainnet);
        assert_eq!(
            config.koios_url().unwrap().as_str(),
            "https://api.koios.rest/api/v1"
        );
        config.set_koios_url("http://localhost:8053/api/v1").unwrap();
        assert_eq!(config.koios_url().unwrap().host_str(), Some("localhost"));
    }

    #[test]
    fn test_config_rejects_bad_urls() {
        let mut config = Config::default();
        assert!(config.set_blacklist_url("not a url").is_err());
        assert!(config.set_blacklist_url("ftp://example.com/list").is_err());
        assert!(config.set_blacklist_url("https://example.com/list").is_ok());
    }
}
