//! Wallet transaction pipeline: build, sign, submit, plus balance scans.

use crate::retry::Retryable;
use crate::types::{AssetBalance, PaymentOutput, SelectedAsset, TxHash};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// Inputs cannot cover the outputs plus fees.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// Structural rejection, e.g. the transaction exceeds the size limit.
    #[error("transaction rejected by builder: {0}")]
    BuildRejected(String),
    #[error("signing declined: {0}")]
    SigningDeclined(String),
    #[error("submission failed: {0}")]
    Submission(String),
    /// The wallet or its backend could not be reached.
    #[error("wallet connection error: {0}")]
    Transport(String),
}

impl Retryable for TxError {
    fn is_retryable(&self) -> bool {
        matches!(self, TxError::Transport(_))
    }
}

/// Opaque build/sign/submit pipeline provided by a wallet library.
///
/// `build` doubles as the feasibility probe: it must not have side effects
/// on the wallet. Calls are made one at a time.
#[async_trait]
pub trait TxPipeline: Send + Sync {
    type Unsigned: Send + 'static;
    type Signed: Send + 'static;

    /// Spendable amount per unit held by the wallet.
    async fn balances(&self) -> Result<Vec<AssetBalance>, TxError>;

    async fn build(&self, outputs: &[PaymentOutput]) -> Result<Self::Unsigned, TxError>;

    async fn sign(&self, tx: Self::Unsigned) -> Result<Self::Signed, TxError>;

    async fn submit(&self, tx: Self::Signed) -> Result<TxHash, TxError>;
}

/// Scan wallet balances and turn each non-empty unit into a selectable asset.
/// Native coin first, then tokens in the order the wallet reports them.
pub async fn scan_assets<P>(wallet: &P) -> Result<Vec<SelectedAsset>, TxError>
where
    P: TxPipeline + ?Sized,
{
    let balances = wallet.balances().await?;
    let mut assets: Vec<SelectedAsset> = balances
        .iter()
        .filter(|b| b.quantity > 0)
        .map(SelectedAsset::from_balance)
        .collect();
    assets.sort_by_key(|a| !a.unit.is_native());
    info!("Balance scan found {} spendable asset(s)", assets.len());
    Ok(assets)
}
