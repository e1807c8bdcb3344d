//! Common types shared across modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Main-network payment address prefix.
pub const MAINNET_PREFIX: &str = "addr1";

/// Test-network payment address prefix.
pub const TESTNET_PREFIX: &str = "addr_test1";

/// Recognized address prefixes, checked in this order.
pub const ADDRESS_PREFIXES: [&str; 2] = [MAINNET_PREFIX, TESTNET_PREFIX];

/// Bech32 data alphabet. Leaves out `1`, `b`, `i` and `o`.
pub const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Minimum number of data characters after the prefix.
pub const MIN_ADDRESS_DATA_LEN: usize = 50;

/// Length of a policy ID in hex characters (28 bytes).
pub const POLICY_ID_HEX_LEN: usize = 56;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address has no recognized prefix: {0}")]
    UnknownPrefix(String),
    #[error("address contains characters outside the bech32 alphabet: {0}")]
    InvalidCharacters(String),
    #[error("address is too short ({len} data characters, need {min}): {address}")]
    TooShort {
        address: String,
        len: usize,
        min: usize,
    },
}

/// Which network an address belongs to, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressNetwork {
    Mainnet,
    Testnet,
}

/// A payment address that passed prefix and alphabet validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipientAddress(String);

impl RecipientAddress {
    /// Validate an already-cleaned candidate. No trimming happens here.
    pub fn parse(candidate: &str) -> Result<Self, AddressError> {
        let prefix = ADDRESS_PREFIXES
            .iter()
            .find(|p| candidate.starts_with(**p))
            .ok_or_else(|| AddressError::UnknownPrefix(candidate.to_string()))?;

        let data = &candidate[prefix.len()..];
        if !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(AddressError::InvalidCharacters(candidate.to_string()));
        }
        let len = data.chars().count();
        if len < MIN_ADDRESS_DATA_LEN {
            return Err(AddressError::TooShort {
                address: candidate.to_string(),
                len,
                min: MIN_ADDRESS_DATA_LEN,
            });
        }
        Ok(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn network(&self) -> AddressNetwork {
        if self.0.starts_with(TESTNET_PREFIX) {
            AddressNetwork::Testnet
        } else {
            AddressNetwork::Mainnet
        }
    }
}

/// Check a candidate against the full address pattern.
pub fn is_valid_address(candidate: &str) -> bool {
    RecipientAddress::parse(candidate).is_ok()
}

/// Cheap prefix check used before full validation (case-insensitive).
pub fn has_address_prefix(candidate: &str) -> bool {
    let lowered = candidate.to_lowercase();
    ADDRESS_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

impl fmt::Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecipientAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecipientAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecipientAddress> for String {
    fn from(address: RecipientAddress) -> Self {
        address.0
    }
}

/// The fungible unit being distributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetUnit {
    /// Native coin, counted in lovelace.
    Lovelace,
    /// A native token: hex policy ID plus hex asset name.
    Token { policy_id: String, asset_name: String },
}

impl AssetUnit {
    /// Parse the concatenated `policy_id ++ asset_name` unit string, or `lovelace`.
    pub fn from_unit(unit: &str) -> Result<Self, anyhow::Error> {
        let unit = unit.trim();
        if unit.eq_ignore_ascii_case("lovelace") {
            return Ok(AssetUnit::Lovelace);
        }
        if unit.len() < POLICY_ID_HEX_LEN {
            return Err(anyhow::anyhow!(
                "Asset unit '{}' is shorter than a policy ID",
                unit
            ));
        }
        hex::decode(unit).map_err(|e| anyhow::anyhow!("Asset unit '{}' is not hex: {}", unit, e))?;
        let (policy_id, asset_name) = unit.split_at(POLICY_ID_HEX_LEN);
        Ok(AssetUnit::Token {
            policy_id: policy_id.to_lowercase(),
            asset_name: asset_name.to_lowercase(),
        })
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetUnit::Lovelace)
    }
}

impl fmt::Display for AssetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetUnit::Lovelace => f.write_str("lovelace"),
            AssetUnit::Token {
                policy_id,
                asset_name,
            } => write!(f, "{}{}", policy_id, asset_name),
        }
    }
}

/// Spendable amount of one unit as reported by a wallet balance scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBalance {
    pub unit: AssetUnit,
    pub quantity: u64,
}

/// The asset chosen for an airdrop, with its balance as of the last scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAsset {
    pub unit: AssetUnit,
    pub name: String,
    pub decimals: u8,
    pub available: u64,
}

impl SelectedAsset {
    pub fn lovelace(available: u64) -> Self {
        Self {
            unit: AssetUnit::Lovelace,
            name: "ADA".to_string(),
            decimals: crate::utils::ADA_DECIMALS,
            available,
        }
    }

    pub fn from_balance(balance: &AssetBalance) -> Self {
        match &balance.unit {
            AssetUnit::Lovelace => Self::lovelace(balance.quantity),
            AssetUnit::Token { asset_name, .. } => {
                // Asset names are usually UTF-8; fall back to the hex form.
                let name = hex::decode(asset_name)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| asset_name.clone());
                Self {
                    unit: balance.unit.clone(),
                    name,
                    decimals: 0,
                    available: balance.quantity,
                }
            }
        }
    }
}

/// One payment output of a batch transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: RecipientAddress,
    pub unit: AssetUnit,
    pub quantity: u64,
}

/// Build the outputs for a batch, preserving recipient order.
pub fn payment_outputs(
    recipients: &[RecipientAddress],
    unit: &AssetUnit,
    quantity: u64,
) -> Vec<PaymentOutput> {
    recipients
        .iter()
        .map(|address| PaymentOutput {
            address: address.clone(),
            unit: unit.clone(),
            quantity,
        })
        .collect()
}

/// 32-byte transaction hash, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| anyhow::anyhow!("Invalid transaction hash '{}': {}", s, e))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Transaction hash must be 32 bytes: {}", s))?;
        Ok(TxHash(array))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_address;
    use super::*;

    #[test]
    fn test_parse_mainnet_address() {
        let addr = RecipientAddress::parse(&sample_address('q')).unwrap();
        assert_eq!(addr.network(), AddressNetwork::Mainnet);
    }

    #[test]
    fn test_parse_testnet_address() {
        let raw = format!("{}{}", TESTNET_PREFIX, "x".repeat(50));
        let addr = RecipientAddress::parse(&raw).unwrap();
        assert_eq!(addr.network(), AddressNetwork::Testnet);
    }

    #[test]
    fn test_parse_rejects_ambiguous_characters() {
        for bad in ['b', 'i', 'o', '1'] {
            let raw = format!("addr1{}{}", bad, "q".repeat(55));
            assert!(matches!(
                RecipientAddress::parse(&raw),
                Err(AddressError::InvalidCharacters(_))
            ));
        }
    }

    #[test]
    fn test_parse_rejects_short_data() {
        let raw = format!("addr1{}", "q".repeat(49));
        assert!(matches!(
            RecipientAddress::parse(&raw),
            Err(AddressError::TooShort { len: 49, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        let raw = sample_address('q').to_uppercase();
        assert!(has_address_prefix(&raw));
        assert!(!is_valid_address(&raw));
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        assert!(matches!(
            RecipientAddress::parse("stake1uxyz"),
            Err(AddressError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_asset_unit_lovelace() {
        assert_eq!(AssetUnit::from_unit("lovelace").unwrap(), AssetUnit::Lovelace);
    }

    #[test]
    fn test_asset_unit_token_split() {
        let policy = "a".repeat(56);
        let unit = format!("{}{}", policy, hex::encode("HOSKY"));
        let parsed = AssetUnit::from_unit(&unit).unwrap();
        assert_eq!(
            parsed,
            AssetUnit::Token {
                policy_id: policy,
                asset_name: hex::encode("HOSKY"),
            }
        );
        assert_eq!(parsed.to_string(), unit);
    }

    #[test]
    fn test_asset_unit_rejects_non_hex() {
        let unit = format!("{}zz", "a".repeat(56));
        assert!(AssetUnit::from_unit(&unit).is_err());
    }

    #[test]
    fn test_selected_asset_decodes_token_name() {
        let balance = AssetBalance {
            unit: AssetUnit::Token {
                policy_id: "b".repeat(56),
                asset_name: hex::encode("SNEK"),
            },
            quantity: 42,
        };
        let asset = SelectedAsset::from_balance(&balance);
        assert_eq!(asset.name, "SNEK");
        assert_eq!(asset.available, 42);
    }

    #[test]
    fn test_tx_hash_roundtrip_display() {
        let hash = TxHash([0xab; 32]);
        let parsed: TxHash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_tx_hash_rejects_wrong_length() {
        assert!("abcd".parse::<TxHash>().is_err());
    }
}
