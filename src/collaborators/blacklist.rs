//! Addresses that must never receive an airdrop (contract/script addresses,
//! exchanges). Fetched once per run before planning.

use super::{check_status, CollaboratorError};
use crate::retry::{retry_async, RetryPolicy};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

#[async_trait]
pub trait BlacklistSource: Send + Sync {
    async fn get_contract_addresses(&self) -> Result<Vec<String>, CollaboratorError>;
}

/// Fetch the blacklist under the retry policy and index it for lookups.
pub async fn fetch_blacklist<B>(
    source: &B,
    retry: &RetryPolicy,
) -> Result<HashSet<String>, CollaboratorError>
where
    B: BlacklistSource + ?Sized,
{
    let addresses = retry_async(retry, "Blacklist fetch", || source.get_contract_addresses()).await?;
    Ok(addresses
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

/// Service reply: either the list or an error message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlacklistResponse {
    Addresses { addresses: Vec<String> },
    Error { error: String },
}

#[derive(Clone)]
pub struct HttpBlacklist {
    http: Client,
    url: Url,
}

impl HttpBlacklist {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl BlacklistSource for HttpBlacklist {
    async fn get_contract_addresses(&self) -> Result<Vec<String>, CollaboratorError> {
        info!("Fetching blacklist from {}", self.url);
        let response = check_status(self.http.get(self.url.clone()).send().await?).await?;
        match response.json::<BlacklistResponse>().await? {
            BlacklistResponse::Addresses { addresses } => Ok(addresses),
            BlacklistResponse::Error { error } => Err(CollaboratorError::Service(error)),
        }
    }
}

/// Used when no blacklist service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlacklist;

#[async_trait]
impl BlacklistSource for NoBlacklist {
    async fn get_contract_addresses(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// A fixed list, e.g. loaded from a local file.
#[derive(Debug, Clone, Default)]
pub struct StaticBlacklist(pub Vec<String>);

impl StaticBlacklist {
    /// One address per line; blank lines and `#` comments are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read blacklist {}: {}", path.display(), e))?;
        Ok(Self(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect(),
        ))
    }
}

#[async_trait]
impl BlacklistSource for StaticBlacklist {
    async fn get_contract_addresses(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.0.clone())
    }
}
