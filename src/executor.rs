//! Batch executor: plans a batch size once, then pays recipients one
//! transaction at a time in address order.
//!
//! Batches are never in flight concurrently; each transaction spends wallet
//! outputs that the next one's construction depends on.

use crate::address_parser::AddressCollection;
use crate::batch_search::{find_max_batch_size, PipelineProbe, SearchError};
use crate::collaborators::blacklist::{fetch_blacklist, BlacklistSource};
use crate::collaborators::wallet::{TxError, TxPipeline};
use crate::notifications::Notifier;
use crate::report::{BatchOutcome, RunReport, TransactionResult};
use crate::retry::RetryPolicy;
use crate::session::{AirdropSession, ValidationError};
use crate::types::{payment_outputs, AssetUnit, RecipientAddress, TxHash};
use crate::utils;
use chrono::Utc;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planning,
    Executing { batch_index: usize, processed: usize },
    Completed,
    Aborted { reason: String },
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("Idle"),
            RunState::Planning => f.write_str("Planning"),
            RunState::Executing { batch_index, .. } => write!(f, "Executing({})", batch_index),
            RunState::Completed => f.write_str("Completed"),
            RunState::Aborted { reason } => write!(f, "Aborted ({})", reason),
        }
    }
}

pub struct AirdropRunner<'a, P: ?Sized, B: ?Sized, N> {
    wallet: &'a P,
    blacklist: &'a B,
    notifier: N,
    retry: RetryPolicy,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a, P, B, N> AirdropRunner<'a, P, B, N>
where
    P: TxPipeline + ?Sized,
    B: BlacklistSource + ?Sized,
    N: Notifier,
{
    pub fn new(wallet: &'a P, blacklist: &'a B, notifier: N) -> Self {
        Self {
            wallet,
            blacklist,
            notifier,
            retry: RetryPolicy::default(),
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    /// Retry policy for the blacklist fetch and transient probe failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// States of the latest run, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn transition(&mut self, next: RunState) {
        info!("Airdrop state: {} -> {}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    fn abort(&mut self, report: &mut RunReport, reason: String) {
        error!("Airdrop aborted: {}", reason);
        self.notifier.error(&reason);
        self.transition(RunState::Aborted {
            reason: reason.clone(),
        });
        report.final_state = self.state.clone();
    }

    /// Run a full airdrop for `session`.
    ///
    /// Each call starts over from `Idle`. Validation problems return `Err` and
    /// leave the runner `Idle`. Every other failure ends the run in `Aborted`
    /// and is described in the report.
    pub async fn run(&mut self, session: &AirdropSession) -> Result<RunReport, ValidationError> {
        self.state = RunState::Idle;
        self.history = vec![RunState::Idle];

        let asset = match session.validate() {
            Ok(asset) => asset.clone(),
            Err(e) => {
                self.notifier.error(&format!("Cannot start airdrop: {}", e));
                return Err(e);
            }
        };
        let amount = session.amount_per_recipient();
        let mut report = RunReport::new(asset.name.clone(), amount);

        let blocked = match fetch_blacklist(self.blacklist, &self.retry).await {
            Ok(blocked) => blocked,
            Err(e) => {
                self.abort(&mut report, format!("Could not load blacklist: {}", e));
                return Ok(report);
            }
        };
        let mut recipients: AddressCollection = session.addresses().clone();
        let removed = recipients.remove_blocked(&blocked);
        report.blacklisted = removed;
        self.notifier.info(&format!(
            "Removed {} blacklisted address(es); {} recipient(s) remain",
            removed,
            recipients.len()
        ));
        if recipients.is_empty() {
            self.notifier
                .error("No valid recipients remain after blacklist filtering");
            return Err(ValidationError::NoRecipients);
        }
        let total = recipients.len();
        report.total_recipients = total;

        self.transition(RunState::Planning);
        let total_cost = amount as u128 * total as u128;
        if total_cost > asset.available as u128 {
            warn!(
                "Total cost {} exceeds available {} {}",
                total_cost, asset.available, asset.name
            );
            self.notifier.info(&format!(
                "Available {} {} does not cover all {} recipients; the run stops when funds run out",
                utils::format_amount(asset.available, asset.decimals),
                asset.name,
                total
            ));
        }
        self.notifier.info(&format!(
            "Finding the largest batch for {} recipient(s) at {} {} each",
            total,
            utils::format_amount(amount, asset.decimals),
            asset.name
        ));

        let probe = PipelineProbe::new(self.wallet, asset.unit.clone(), amount);
        let plan = match find_max_batch_size(
            recipients.as_slice(),
            amount,
            asset.available,
            &probe,
            &self.retry,
        )
        .await
        {
            Ok(plan) => plan,
            Err(SearchError::Infeasible { reason }) => {
                self.abort(&mut report, format!("Cannot pay even one recipient: {}", reason));
                return Ok(report);
            }
            Err(e) => {
                self.abort(&mut report, format!("Batch planning failed: {}", e));
                return Ok(report);
            }
        };
        report.plan = Some(plan);
        let batch_count = plan.batch_count(total);
        self.notifier.info(&format!(
            "Batch size: {} recipient(s) per transaction ({} {}), {} transaction(s)",
            plan.batch_size,
            utils::format_amount(
                u64::try_from(plan.cost_per_batch()).unwrap_or(u64::MAX),
                asset.decimals
            ),
            asset.name,
            batch_count
        ));

        let mut processed = 0usize;
        for (batch_index, chunk) in recipients.as_slice().chunks(plan.batch_size).enumerate() {
            self.transition(RunState::Executing {
                batch_index,
                processed,
            });
            info!(
                "Sending batch {}/{} with {} recipient(s)",
                batch_index + 1,
                batch_count,
                chunk.len()
            );

            let result = self.send_batch(chunk, &asset.unit, amount).await;
            let first_recipient = processed;
            match result {
                Ok(tx_hash) => {
                    processed += chunk.len();
                    report.batches.push(BatchOutcome {
                        index: batch_index,
                        first_recipient,
                        recipients: chunk.len(),
                        result: TransactionResult::Success { tx_hash },
                        timestamp: Utc::now(),
                    });
                    info!("Batch {} submitted: {}", batch_index + 1, tx_hash);
                    self.notifier.success(&format!(
                        "Batch sent to {} addresses ({}/{})",
                        chunk.len(),
                        processed,
                        total
                    ));
                }
                Err(e) => {
                    report.batches.push(BatchOutcome {
                        index: batch_index,
                        first_recipient,
                        recipients: chunk.len(),
                        result: TransactionResult::Failed {
                            error: e.to_string(),
                        },
                        timestamp: Utc::now(),
                    });
                    self.abort(
                        &mut report,
                        format!(
                            "Batch {} failed: {}. {}/{} addresses were paid; restart the airdrop for the remaining {}",
                            batch_index + 1,
                            e,
                            processed,
                            total,
                            total - processed
                        ),
                    );
                    return Ok(report);
                }
            }
        }

        self.transition(RunState::Completed);
        report.final_state = RunState::Completed;
        self.notifier.success(&format!(
            "Airdrop complete: {} addresses paid in {} transaction(s)",
            processed,
            report.batches.len()
        ));
        Ok(report)
    }

    /// Build, sign and submit one batch. No retries: a failure ends the run.
    async fn send_batch(
        &self,
        recipients: &[RecipientAddress],
        unit: &AssetUnit,
        amount: u64,
    ) -> Result<TxHash, TxError> {
        let outputs = payment_outputs(recipients, unit, amount);
        let unsigned = self.wallet.build(&outputs).await?;
        let signed = self.wallet.sign(unsigned).await?;
        self.wallet.submit(signed).await
    }
}
