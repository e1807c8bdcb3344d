//! Run outcome: per-batch results, summary text and CSV export.

use crate::batch_search::BatchPlan;
use crate::executor::RunState;
use crate::types::TxHash;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Outcome of one submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Success { tx_hash: TxHash },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    /// Position of the batch's first recipient in the filtered list.
    pub first_recipient: usize,
    pub recipients: usize,
    pub result: TransactionResult,
    pub timestamp: DateTime<Utc>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TransactionResult::Success { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub asset_name: String,
    pub amount_per_recipient: u64,
    /// Recipients after blacklist filtering.
    pub total_recipients: usize,
    pub blacklisted: usize,
    pub plan: Option<BatchPlan>,
    pub batches: Vec<BatchOutcome>,
    pub final_state: RunState,
}

impl RunReport {
    pub fn new(asset_name: impl Into<String>, amount_per_recipient: u64) -> Self {
        Self {
            asset_name: asset_name.into(),
            amount_per_recipient,
            total_recipients: 0,
            blacklisted: 0,
            plan: None,
            batches: Vec::new(),
            final_state: RunState::Idle,
        }
    }

    /// Recipients covered by successful batches.
    pub fn paid_recipients(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.is_success())
            .map(|b| b.recipients)
            .sum()
    }

    pub fn remaining_recipients(&self) -> usize {
        self.total_recipients.saturating_sub(self.paid_recipients())
    }

    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.batches
            .iter()
            .filter_map(|b| match &b.result {
                TransactionResult::Success { tx_hash } => Some(*tx_hash),
                TransactionResult::Failed { .. } => None,
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let batch_size = self
            .plan
            .map(|p| p.batch_size.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "State: {} | Recipients: {} | Blacklisted: {} | Batch size: {} | Batches sent: {} | Paid: {} | Remaining: {}",
            self.final_state,
            self.total_recipients,
            self.blacklisted,
            batch_size,
            self.batches.iter().filter(|b| b.is_success()).count(),
            self.paid_recipients(),
            self.remaining_recipients()
        )
    }

    /// Write one CSV row per batch.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for batch in &self.batches {
            let (status, tx_hash, error) = match &batch.result {
                TransactionResult::Success { tx_hash } => ("success", tx_hash.to_string(), String::new()),
                TransactionResult::Failed { error } => ("failed", String::new(), error.clone()),
            };
            writer.serialize(CsvRow {
                batch: batch.index + 1,
                first_recipient: batch.first_recipient,
                recipients: batch.recipients,
                asset: &self.asset_name,
                amount_per_recipient: self.amount_per_recipient,
                status,
                tx_hash,
                error,
                timestamp: batch.timestamp.to_rfc3339(),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    batch: usize,
    first_recipient: usize,
    recipients: usize,
    asset: &'a str,
    amount_per_recipient: u64,
    status: &'a str,
    tx_hash: String,
    error: String,
    timestamp: String,
}
