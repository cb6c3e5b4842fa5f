//! Dry-run, sign, submit, wait.
//!
//! Compute cost depends on the shape of a programmable transaction, so every
//! transaction is simulated first and submitted with the budget the
//! simulation reports. Nothing is built on top of a transaction until its
//! effects are final.

use std::sync::Arc;
use tracing::{debug, info};

use super::command::{ProgrammableTransaction, TransactionData};
use super::signer::Signer;
use super::traits::{LedgerClient, LedgerError, LedgerResult};
use super::types::{ExecutionStatus, TransactionEffects};

/// Submits transactions on behalf of one signer.
#[derive(Clone)]
pub struct TransactionExecutor {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    gas_budget: u64,
}

impl TransactionExecutor {
    /// `gas_budget` caps the simulation; the submitted budget comes from it.
    pub fn new(ledger: Arc<dyn LedgerClient>, signer: Arc<dyn Signer>, gas_budget: u64) -> Self {
        Self {
            ledger,
            signer,
            gas_budget,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Run `kind` to finality.
    ///
    /// Returns [`LedgerError::ExecutionFailed`] when the effects report a
    /// non-success status.
    pub async fn execute(
        &self,
        label: &str,
        kind: ProgrammableTransaction,
    ) -> LedgerResult<TransactionEffects> {
        let mut tx = TransactionData {
            sender: self.signer.address(),
            gas_budget: self.gas_budget,
            kind,
        };

        let dry_run = self.ledger.dry_run(&tx).await?;
        if let ExecutionStatus::Failure { error } = dry_run.status {
            return Err(LedgerError::DryRunFailed(format!("{}: {}", label, error)));
        }
        tx.gas_budget = dry_run.gas_budget;
        debug!(
            label,
            commands = tx.kind.commands.len(),
            gas_budget = tx.gas_budget,
            "Dry run succeeded"
        );

        let bytes = serialize(&tx)?;
        let signature = self.signer.sign_transaction(&bytes).await?;
        let digest = self.ledger.execute(&tx, &signature).await?;
        let effects = self.ledger.wait_for_transaction(&digest).await?;

        match &effects.status {
            ExecutionStatus::Success => {
                info!(label, digest = %effects.digest, "Transaction executed");
                Ok(effects)
            }
            ExecutionStatus::Failure { error } => Err(LedgerError::ExecutionFailed {
                digest: effects.digest.clone(),
                reason: error.clone(),
            }),
        }
    }
}

/// Canonical bytes of a transaction, as signed.
pub fn serialize(tx: &TransactionData) -> LedgerResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(tx, &mut bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    Ok(bytes)
}
