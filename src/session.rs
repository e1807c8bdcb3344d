//! The airdrop session: everything the user has entered for one airdrop,
//! kept as a plain value that the executor reads.

use crate::address_parser::{normalize_addresses, parse_address_file, AddressCollection, MergeSummary};
use crate::collaborators::{collect_policy_holders, CollaboratorError, HolderSource};
use crate::config::Network;
use crate::retry::RetryPolicy;
use crate::types::{RecipientAddress, SelectedAsset};
use crate::utils;
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Input problems caught before any chain interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no asset selected")]
    NoAssetSelected,
    #[error("amount per recipient must be greater than zero")]
    ZeroAmount,
    #[error("no valid recipients")]
    NoRecipients,
}

#[derive(Debug, Clone, Default)]
pub struct AirdropSession {
    addresses: AddressCollection,
    duplicates: BTreeSet<RecipientAddress>,
    invalid: Vec<String>,
    policies: Vec<String>,
    asset: Option<SelectedAsset>,
    amount_per_recipient: u64,
}

impl AirdropSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge(&mut self, addresses: Vec<RecipientAddress>) -> MergeSummary {
        let summary = self.addresses.extend(addresses);
        self.duplicates.extend(summary.repeats.iter().cloned());
        summary
    }

    /// Add addresses from pasted text.
    pub fn add_text(&mut self, text: &str) -> MergeSummary {
        let parsed = normalize_addresses(text);
        info!("Pasted addresses: {}", parsed.summary());
        self.duplicates.extend(parsed.duplicates);
        self.invalid.extend(parsed.invalid);
        self.merge(parsed.valid_addresses)
    }

    /// Add addresses from an uploaded file.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<MergeSummary> {
        let parsed = parse_address_file(path)?;
        info!("Uploaded addresses: {}", parsed.summary());
        self.duplicates.extend(parsed.duplicates);
        self.invalid.extend(parsed.invalid);
        Ok(self.merge(parsed.valid_addresses))
    }

    /// Look up current holders of each policy and add them.
    pub async fn add_policy_holders<S>(
        &mut self,
        source: &S,
        policy_ids: &[String],
        network: Network,
        retry: &RetryPolicy,
    ) -> Result<MergeSummary, CollaboratorError>
    where
        S: HolderSource + ?Sized,
    {
        let lookup = collect_policy_holders(source, policy_ids, network, retry).await?;
        for policy in policy_ids {
            if !self.policies.contains(policy) {
                self.policies.push(policy.clone());
            }
        }
        self.duplicates.extend(lookup.duplicates);
        Ok(self.merge(lookup.addresses.as_slice().to_vec()))
    }

    pub fn clear_addresses(&mut self) {
        self.addresses.clear();
        self.duplicates.clear();
        self.invalid.clear();
        self.policies.clear();
    }

    pub fn select_asset(&mut self, asset: SelectedAsset) {
        self.asset = Some(asset);
    }

    pub fn set_amount(&mut self, amount_per_recipient: u64) {
        self.amount_per_recipient = amount_per_recipient;
    }

    /// Parse a decimal amount using the selected asset's decimals.
    pub fn set_amount_str(&mut self, input: &str) -> Result<u64> {
        let decimals = self
            .asset
            .as_ref()
            .map(|a| a.decimals)
            .ok_or_else(|| anyhow!("Select an asset before entering an amount"))?;
        let amount = utils::parse_amount_str(input, decimals)?;
        self.amount_per_recipient = amount;
        Ok(amount)
    }

    pub fn addresses(&self) -> &AddressCollection {
        &self.addresses
    }

    pub fn duplicates(&self) -> &BTreeSet<RecipientAddress> {
        &self.duplicates
    }

    pub fn invalid(&self) -> &[String] {
        &self.invalid
    }

    pub fn policies(&self) -> &[String] {
        &self.policies
    }

    pub fn asset(&self) -> Option<&SelectedAsset> {
        self.asset.as_ref()
    }

    pub fn amount_per_recipient(&self) -> u64 {
        self.amount_per_recipient
    }

    /// Cost of paying every recipient, in smallest units.
    pub fn total_cost(&self) -> u128 {
        self.amount_per_recipient as u128 * self.addresses.len() as u128
    }

    /// Check the inputs needed to start a run.
    pub fn validate(&self) -> Result<&SelectedAsset, ValidationError> {
        let asset = self.asset.as_ref().ok_or(ValidationError::NoAssetSelected)?;
        if self.amount_per_recipient == 0 {
            return Err(ValidationError::ZeroAmount);
        }
        if self.addresses.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        Ok(asset)
    }
}
