//! Batch size search.
//!
//! Finds the largest number of recipients that one transaction can pay,
//! bounded by the available balance and by whatever the transaction builder
//! refuses to construct (size limits, fees, min-UTxO rules).

use crate::collaborators::wallet::{TxError, TxPipeline};
use crate::retry::{retry_async, RetryPolicy};
use crate::types::{payment_outputs, AssetUnit, RecipientAddress};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// What a build probe concluded about one candidate size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Feasible,
    BalanceExceeded,
    BuildRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("no recipients to plan for")]
    NoRecipients,
    #[error("amount per recipient must be greater than zero")]
    ZeroAmount,
    #[error("cannot pay even one recipient: {reason}")]
    Infeasible { reason: String },
    #[error("transaction builder unavailable: {0}")]
    ProbeUnavailable(String),
}

/// Attempts to construct (never submit) a transaction paying each candidate.
///
/// `Err` is reserved for transport problems; those are retried and never
/// read as "too large".
#[async_trait]
pub trait BuildProbe: Send + Sync {
    async fn probe(&self, candidates: &[RecipientAddress]) -> Result<ProbeVerdict, TxError>;
}

/// Probe backed by a wallet pipeline's `build` step.
pub struct PipelineProbe<'a, P: ?Sized> {
    wallet: &'a P,
    unit: AssetUnit,
    amount: u64,
}

impl<'a, P: TxPipeline + ?Sized> PipelineProbe<'a, P> {
    pub fn new(wallet: &'a P, unit: AssetUnit, amount: u64) -> Self {
        Self {
            wallet,
            unit,
            amount,
        }
    }
}

#[async_trait]
impl<'a, P: TxPipeline + ?Sized> BuildProbe for PipelineProbe<'a, P> {
    async fn probe(&self, candidates: &[RecipientAddress]) -> Result<ProbeVerdict, TxError> {
        let outputs = payment_outputs(candidates, &self.unit, self.amount);
        match self.wallet.build(&outputs).await {
            Ok(_) => Ok(ProbeVerdict::Feasible),
            Err(TxError::InsufficientFunds(_)) => Ok(ProbeVerdict::BalanceExceeded),
            Err(TxError::BuildRejected(reason)) => Ok(ProbeVerdict::BuildRejected(reason)),
            Err(e @ TxError::Transport(_)) => Err(e),
            Err(other) => Ok(ProbeVerdict::BuildRejected(other.to_string())),
        }
    }
}

/// Probe driven by a plain function of the candidate count.
pub struct FnProbe<F>(pub F);

#[async_trait]
impl<F> BuildProbe for FnProbe<F>
where
    F: Fn(usize) -> Result<ProbeVerdict, TxError> + Send + Sync,
{
    async fn probe(&self, candidates: &[RecipientAddress]) -> Result<ProbeVerdict, TxError> {
        (self.0)(candidates.len())
    }
}

/// Batch size discovered for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub amount_per_recipient: u64,
    /// Number of build probes the search issued.
    pub probes: usize,
}

impl BatchPlan {
    /// Number of transactions needed for `total` recipients.
    pub fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size)
    }

    pub fn cost_per_batch(&self) -> u128 {
        self.batch_size as u128 * self.amount_per_recipient as u128
    }
}

/// Binary search over `[1, addresses.len()]` for the largest feasible batch.
///
/// Sizes whose cost exceeds `available_balance` are ruled out without a probe.
/// Probes always receive a prefix of `addresses`.
pub async fn find_max_batch_size<P>(
    addresses: &[RecipientAddress],
    amount_per_recipient: u64,
    available_balance: u64,
    probe: &P,
    retry: &RetryPolicy,
) -> Result<BatchPlan, SearchError>
where
    P: BuildProbe + ?Sized,
{
    if addresses.is_empty() {
        return Err(SearchError::NoRecipients);
    }
    if amount_per_recipient == 0 {
        return Err(SearchError::ZeroAmount);
    }

    let mut low = 1usize;
    let mut high = addresses.len();
    let mut best = 0usize;
    let mut probes = 0usize;
    let mut last_rejection: Option<String> = None;

    while low <= high {
        let mid = low + (high - low) / 2;
        let cost = amount_per_recipient as u128 * mid as u128;
        if cost > available_balance as u128 {
            debug!("Batch of {} costs {} > balance {}", mid, cost, available_balance);
            high = mid - 1;
            continue;
        }

        probes += 1;
        let candidates = &addresses[..mid];
        let verdict = retry_async(retry, "Build probe", || probe.probe(candidates))
            .await
            .map_err(|e| SearchError::ProbeUnavailable(e.to_string()))?;

        match verdict {
            ProbeVerdict::Feasible => {
                debug!("Batch of {} is feasible", mid);
                best = mid;
                low = mid + 1;
            }
            ProbeVerdict::BalanceExceeded => {
                debug!("Batch of {} exceeds balance once fees are included", mid);
                last_rejection = Some(format!("balance exceeded at {} recipient(s)", mid));
                high = mid - 1;
            }
            ProbeVerdict::BuildRejected(reason) => {
                debug!("Batch of {} rejected by builder: {}", mid, reason);
                last_rejection = Some(reason);
                high = mid - 1;
            }
        }
    }

    if best == 0 {
        let reason = last_rejection.unwrap_or_else(|| {
            format!(
                "{} per recipient exceeds available balance {}",
                amount_per_recipient, available_balance
            )
        });
        return Err(SearchError::Infeasible { reason });
    }

    info!(
        "Batch size search settled on {} of {} recipients after {} probe(s)",
        best,
        addresses.len(),
        probes
    );
    Ok(BatchPlan {
        batch_size: best,
        amount_per_recipient,
        probes,
    })
}
