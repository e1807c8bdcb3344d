//! Recipient list cleanup: turns pasted or uploaded text into a unique,
//! validated, ordered list of payment addresses.

use crate::types::{has_address_prefix, RecipientAddress};
use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Result of normalizing one text blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddresses {
    /// First occurrence of every valid address, in input order.
    pub valid_addresses: Vec<RecipientAddress>,
    /// Addresses that appeared more than once. Informational only.
    pub duplicates: BTreeSet<RecipientAddress>,
    /// Candidates with a recognized prefix that failed validation.
    pub invalid: Vec<String>,
}

impl ParsedAddresses {
    pub fn summary(&self) -> String {
        format!(
            "{} valid, {} duplicate, {} invalid",
            self.valid_addresses.len(),
            self.duplicates.len(),
            self.invalid.len()
        )
    }
}

/// Strip one layer of matching quotes.
fn strip_matching_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Clean a single candidate: trim, unquote, drop any annotation after a comma, trim.
fn clean_candidate(raw: &str) -> &str {
    let unquoted = strip_matching_quotes(raw.trim());
    let head = match unquoted.split_once(',') {
        Some((head, _)) => head,
        None => unquoted,
    };
    head.trim()
}

/// Normalize a text blob of addresses separated by newlines and/or commas.
pub fn normalize_addresses(input: &str) -> ParsedAddresses {
    let text = input.strip_prefix(BYTE_ORDER_MARK).unwrap_or(input);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut parsed = ParsedAddresses::default();
    let mut seen: HashSet<RecipientAddress> = HashSet::new();

    for raw in text.split(|c| c == '\n' || c == ',') {
        let candidate = clean_candidate(raw);
        if candidate.is_empty() || !has_address_prefix(candidate) {
            continue;
        }

        match RecipientAddress::parse(candidate) {
            Ok(address) => {
                if seen.contains(&address) {
                    parsed.duplicates.insert(address);
                } else {
                    seen.insert(address.clone());
                    parsed.valid_addresses.push(address);
                }
            }
            Err(e) => {
                debug!("Rejected address candidate: {}", e);
                parsed.invalid.push(candidate.to_string());
            }
        }
    }

    parsed
}

/// Read an uploaded address file and normalize its contents.
pub fn parse_address_file(path: impl AsRef<Path>) -> Result<ParsedAddresses> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read address file {}: {}", path.display(), e))?;
    Ok(normalize_addresses(&content))
}

/// Outcome of merging a new source into an [`AddressCollection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub repeats: Vec<RecipientAddress>,
}

/// Ordered, duplicate-free set of recipients built from several sources.
#[derive(Debug, Clone, Default)]
pub struct AddressCollection {
    addresses: Vec<RecipientAddress>,
    seen: HashSet<RecipientAddress>,
}

impl AddressCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an address unless it is already present. Returns whether it was added.
    pub fn push(&mut self, address: RecipientAddress) -> bool {
        if self.seen.contains(&address) {
            return false;
        }
        self.seen.insert(address.clone());
        self.addresses.push(address);
        true
    }

    /// Merge addresses, keeping the first occurrence of each.
    pub fn extend<I>(&mut self, addresses: I) -> MergeSummary
    where
        I: IntoIterator<Item = RecipientAddress>,
    {
        let mut summary = MergeSummary::default();
        for address in addresses {
            if self.push(address.clone()) {
                summary.added += 1;
            } else {
                summary.repeats.push(address);
            }
        }
        summary
    }

    /// Drop every address in `blocked`, keeping order. Returns how many were removed.
    pub fn remove_blocked(&mut self, blocked: &HashSet<String>) -> usize {
        let before = self.addresses.len();
        self.addresses.retain(|a| !blocked.contains(a.as_str()));
        self.seen.retain(|a| !blocked.contains(a.as_str()));
        before - self.addresses.len()
    }

    pub fn contains(&self, address: &RecipientAddress) -> bool {
        self.seen.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn as_slice(&self) -> &[RecipientAddress] {
        &self.addresses
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipientAddress> {
        self.addresses.iter()
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
        self.seen.clear();
    }
}

impl FromIterator<RecipientAddress> for AddressCollection {
    fn from_iter<T: IntoIterator<Item = RecipientAddress>>(iter: T) -> Self {
        let mut collection = AddressCollection::new();
        collection.extend(iter);
        collection
    }
}
