//! External collaborators the planner depends on: policy holder lookup,
//! the blacklist service, and the wallet transaction pipeline.

pub mod blacklist;
pub mod koios;
pub mod simulated;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_http;

use crate::address_parser::AddressCollection;
use crate::config::Network;
use crate::retry::{retry_async, RetryPolicy, Retryable};
use crate::types::RecipientAddress;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

pub use blacklist::{fetch_blacklist, BlacklistSource, HttpBlacklist, NoBlacklist, StaticBlacklist};
pub use koios::KoiosClient;
pub use simulated::SimulatedWallet;
pub use wallet::{scan_assets, TxError, TxPipeline};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("service reported an error: {0}")]
    Service(String),
    #[error("invalid request: {0}")]
    InvalidInput(String),
}

impl Retryable for CollaboratorError {
    fn is_retryable(&self) -> bool {
        match self {
            CollaboratorError::Transport(_) => true,
            CollaboratorError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CollaboratorError::Decode(e.to_string())
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    }
}

/// Turn a non-success HTTP response into an error carrying the body.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Http {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

/// One current holder of a token under a policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyHolder {
    pub payment_address: String,
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Read-only lookup of the current holders of a policy.
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn fetch_addresses_from_policy(
        &self,
        policy_id: &str,
        network: Network,
    ) -> Result<Vec<PolicyHolder>, CollaboratorError>;
}

/// Holder addresses gathered from one or more policies.
#[derive(Debug, Clone, Default)]
pub struct HolderLookup {
    pub addresses: AddressCollection,
    /// Addresses seen more than once, within or across policies.
    pub duplicates: BTreeSet<RecipientAddress>,
    /// Holder entries whose address failed validation (script or legacy addresses).
    pub skipped: usize,
}

/// Fetch holders for every policy with retry, validating and deduplicating addresses.
pub async fn collect_policy_holders<S>(
    source: &S,
    policy_ids: &[String],
    network: Network,
    retry: &RetryPolicy,
) -> Result<HolderLookup, CollaboratorError>
where
    S: HolderSource + ?Sized,
{
    let mut lookup = HolderLookup::default();
    for policy_id in policy_ids {
        let label = format!("Holder lookup for policy {}", policy_id);
        let holders = retry_async(retry, &label, || {
            source.fetch_addresses_from_policy(policy_id, network)
        })
        .await?;

        let total = holders.len();
        let mut valid = Vec::with_capacity(total);
        for holder in holders {
            match RecipientAddress::parse(holder.payment_address.trim()) {
                Ok(address) => valid.push(address),
                Err(e) => {
                    lookup.skipped += 1;
                    warn!("Skipping holder address: {}", e);
                }
            }
        }
        let merged = lookup.addresses.extend(valid);
        lookup.duplicates.extend(merged.repeats.iter().cloned());
        info!(
            "Policy {}: {} holder entries, {} new addresses, {} already known",
            policy_id,
            total,
            merged.added,
            merged.repeats.len()
        );
    }
    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::{recipient, sample_address};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeHolders {
        by_policy: HashMap<String, Vec<String>>,
        failures_left: Mutex<u32>,
    }

    #[async_trait]
    impl HolderSource for FakeHolders {
        async fn fetch_addresses_from_policy(
            &self,
            policy_id: &str,
            _network: Network,
        ) -> Result<Vec<PolicyHolder>, CollaboratorError> {
            {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(CollaboratorError::Transport("connection reset".into()));
                }
            }
            Ok(self
                .by_policy
                .get(policy_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|payment_address| PolicyHolder {
                    payment_address,
                    asset_name: None,
                    quantity: None,
                })
                .collect())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CollaboratorError::Transport("x".into()).is_retryable());
        assert!(CollaboratorError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(CollaboratorError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!CollaboratorError::Http { status: 404, body: String::new() }.is_retryable());
        assert!(!CollaboratorError::Service("down".into()).is_retryable());
        assert!(!CollaboratorError::Decode("bad json".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_collect_merges_policies_in_order() {
        let source = FakeHolders {
            by_policy: HashMap::from([
                ("p1".to_string(), vec![sample_address('a'), sample_address('c')]),
                (
                    "p2".to_string(),
                    vec![sample_address('c'), "addr1xyz_script".to_string(), sample_address('x')],
                ),
            ]),
            failures_left: Mutex::new(1),
        };
        let lookup = collect_policy_holders(
            &source,
            &["p1".to_string(), "p2".to_string()],
            Network::Mainnet,
            &fast_retry(),
        )
        .await
        .unwrap();
        assert_eq!(
            lookup.addresses.as_slice(),
            &[recipient('a'), recipient('c'), recipient('x')]
        );
        assert_eq!(lookup.skipped, 1);
        assert_eq!(lookup.duplicates.len(), 1);
        assert!(lookup.duplicates.contains(&recipient('c')));
    }

    #[tokio::test]
    async fn test_collect_fails_when_retries_exhausted() {
        let source = FakeHolders {
            by_policy: HashMap::new(),
            failures_left: Mutex::new(10),
        };
        let result =
            collect_policy_holders(&source, &["p1".to_string()], Network::Mainnet, &fast_retry())
                .await;
        assert!(matches!(result, Err(CollaboratorError::Transport(_))));
    }
}
