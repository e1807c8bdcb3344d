//! In-memory wallet used for dry runs and tests.
//!
//! Models the limits that matter to batch sizing: per-unit balances, a flat
//! fee per transaction, and a cap on outputs per transaction.

use super::wallet::{TxError, TxPipeline};
use crate::types::{AssetBalance, AssetUnit, PaymentOutput, TxHash};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Roughly what fits in a 16 KiB transaction with simple outputs.
pub const DEFAULT_MAX_OUTPUTS: usize = 150;

#[derive(Debug, Clone)]
pub struct SimulatedTx {
    pub outputs: Vec<PaymentOutput>,
    pub fee: u64,
}

#[derive(Debug, Clone)]
pub struct SignedSimulatedTx(SimulatedTx);

#[derive(Debug, Default)]
struct SimState {
    balances: Vec<AssetBalance>,
    build_calls: usize,
    sign_calls: usize,
    submit_calls: usize,
    transient_build_failures: u32,
    submitted: Vec<Vec<PaymentOutput>>,
}

pub struct SimulatedWallet {
    state: Mutex<SimState>,
    max_outputs: Option<usize>,
    fee_per_tx: u64,
    /// 1-based sign call that the "user" declines.
    decline_sign_at: Option<usize>,
    /// 1-based submit call that the backend rejects.
    fail_submit_at: Option<usize>,
}

impl SimulatedWallet {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            max_outputs: Some(DEFAULT_MAX_OUTPUTS),
            fee_per_tx: 0,
            decline_sign_at: None,
            fail_submit_at: None,
        }
    }

    pub fn with_balance(mut self, unit: AssetUnit, quantity: u64) -> Self {
        let state = self.state.get_mut();
        match state.balances.iter_mut().find(|b| b.unit == unit) {
            Some(existing) => existing.quantity = quantity,
            None => state.balances.push(AssetBalance { unit, quantity }),
        }
        self
    }

    pub fn with_max_outputs(mut self, max_outputs: Option<usize>) -> Self {
        self.max_outputs = max_outputs;
        self
    }

    pub fn with_fee(mut self, fee_per_tx: u64) -> Self {
        self.fee_per_tx = fee_per_tx;
        self
    }

    pub fn decline_sign_at(mut self, call: usize) -> Self {
        self.decline_sign_at = Some(call);
        self
    }

    pub fn fail_submit_at(mut self, call: usize) -> Self {
        self.fail_submit_at = Some(call);
        self
    }

    /// Make the next `count` build calls fail with a transport error.
    pub fn with_transient_build_failures(mut self, count: u32) -> Self {
        self.state.get_mut().transient_build_failures = count;
        self
    }

    pub async fn submitted_batches(&self) -> Vec<Vec<PaymentOutput>> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn build_calls(&self) -> usize {
        self.state.lock().await.build_calls
    }

    pub async fn balance_of(&self, unit: &AssetUnit) -> u64 {
        self.state
            .lock()
            .await
            .balances
            .iter()
            .find(|b| &b.unit == unit)
            .map(|b| b.quantity)
            .unwrap_or(0)
    }

    fn required_by_unit(&self, outputs: &[PaymentOutput]) -> HashMap<AssetUnit, u128> {
        let mut required: HashMap<AssetUnit, u128> = HashMap::new();
        for output in outputs {
            *required.entry(output.unit.clone()).or_default() += output.quantity as u128;
        }
        if self.fee_per_tx > 0 {
            *required.entry(AssetUnit::Lovelace).or_default() += self.fee_per_tx as u128;
        }
        required
    }
}

impl Default for SimulatedWallet {
    fn default() -> Self {
        Self::new()
    }
}

fn simulated_hash(n: usize) -> TxHash {
    let mut bytes = [0x5au8; 32];
    bytes[..8].copy_from_slice(&(n as u64).to_be_bytes());
    TxHash(bytes)
}

#[async_trait]
impl TxPipeline for SimulatedWallet {
    type Unsigned = SimulatedTx;
    type Signed = SignedSimulatedTx;

    async fn balances(&self) -> Result<Vec<AssetBalance>, TxError> {
        Ok(self.state.lock().await.balances.clone())
    }

    async fn build(&self, outputs: &[PaymentOutput]) -> Result<SimulatedTx, TxError> {
        let mut state = self.state.lock().await;
        state.build_calls += 1;

        if state.transient_build_failures > 0 {
            state.transient_build_failures -= 1;
            return Err(TxError::Transport("simulated backend timeout".to_string()));
        }
        if let Some(max) = self.max_outputs {
            if outputs.len() > max {
                return Err(TxError::BuildRejected(format!(
                    "{} outputs exceed the limit of {} per transaction",
                    outputs.len(),
                    max
                )));
            }
        }
        for (unit, needed) in self.required_by_unit(outputs) {
            let available = state
                .balances
                .iter()
                .find(|b| b.unit == unit)
                .map(|b| b.quantity as u128)
                .unwrap_or(0);
            if needed > available {
                return Err(TxError::InsufficientFunds(format!(
                    "need {} {}, have {}",
                    needed, unit, available
                )));
            }
        }
        debug!("Simulated build with {} outputs", outputs.len());
        Ok(SimulatedTx {
            outputs: outputs.to_vec(),
            fee: self.fee_per_tx,
        })
    }

    async fn sign(&self, tx: SimulatedTx) -> Result<SignedSimulatedTx, TxError> {
        let mut state = self.state.lock().await;
        state.sign_calls += 1;
        if self.decline_sign_at == Some(state.sign_calls) {
            return Err(TxError::SigningDeclined("user declined to sign".to_string()));
        }
        Ok(SignedSimulatedTx(tx))
    }

    async fn submit(&self, tx: SignedSimulatedTx) -> Result<TxHash, TxError> {
        let mut state = self.state.lock().await;
        state.submit_calls += 1;
        let call = state.submit_calls;
        if self.fail_submit_at == Some(call) {
            return Err(TxError::Submission("simulated node rejected transaction".to_string()));
        }

        let tx = tx.0;
        let required = self.required_by_unit(&tx.outputs);
        for balance in state.balances.iter_mut() {
            if let Some(spent) = required.get(&balance.unit) {
                balance.quantity = balance.quantity.saturating_sub(*spent as u64);
            }
        }
        state.submitted.push(tx.outputs);
        Ok(simulated_hash(call))
    }
}
