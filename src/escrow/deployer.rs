// Escrow deployer - the four-step deployment sequence with
// checkpoint/resume for partial failures

use crate::escrow::EscrowContract;
use crate::identity::{Address, Session, SignerError};
use crate::ledger::{
    AppCall, AppId, AssetId, LedgerClient, LedgerError, Transaction, ASSET_RESERVE, BASE_RESERVE,
    FEE_BUFFER, MIN_TXN_FEE,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Steps of the deployment sequence, in order. Each is a distinct network
/// round-trip that commits independently; the sequence is not atomic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeployStep {
    /// Deploy the escrow program bound to the asset
    CreateApplication,
    /// Fund the program account's base reserve
    FundReserve,
    /// Grouped reserve top-up + opt-in call registering the asset capability
    OptInToAsset,
    /// Move the initial stock into program custody
    TransferCustody,
}

/// Where an interrupted deployment can pick up again
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployCheckpoint {
    pub app_id: AppId,
    pub app_address: Address,
    /// First step that has not completed
    pub next_step: DeployStep,
}

/// What to deploy
#[derive(Clone, Debug)]
pub struct DeploySpec {
    pub asset_id: AssetId,
    pub unitary_price: u64,
    /// Units moved into escrow custody; must be positive
    pub initial_units: u64,
}

/// Failure of a single deployment step
#[derive(Error, Debug)]
pub enum StepFailure {
    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl StepFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, StepFailure::Ledger(e) if e.is_transient())
    }
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Unitary price must be positive")]
    NonPositivePrice,

    #[error("Initial custody quantity must be positive")]
    ZeroInitialUnits,

    #[error("Deployment failed before the application was created: {0}")]
    CreateFailed(#[source] StepFailure),

    #[error("Deployment interrupted at {step:?}, application {} already exists: {source}", .checkpoint.app_id)]
    Interrupted {
        step: DeployStep,
        checkpoint: DeployCheckpoint,
        #[source]
        source: StepFailure,
    },

    #[error("Confirmation did not report a created application id")]
    MissingAppId,
}

impl DeployError {
    /// The resume point, when the failure left a partially-deployed escrow
    pub fn checkpoint(&self) -> Option<&DeployCheckpoint> {
        match self {
            DeployError::Interrupted { checkpoint, .. } => Some(checkpoint),
            _ => None,
        }
    }
}

/// Deploys a new escrow instance: create, fund, opt in, transfer custody.
///
/// On success `units_remaining == initial_units`. A failure after the
/// application exists surfaces as `Interrupted` with a checkpoint; `resume`
/// re-runs only the remaining steps.
pub struct EscrowDeployer {
    ledger: Arc<dyn LedgerClient>,
}

impl EscrowDeployer {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn deploy(
        &self,
        session: &Session,
        spec: &DeploySpec,
    ) -> Result<EscrowContract, DeployError> {
        Self::validate(spec)?;

        // Step 1: create the application. Failing here leaves nothing behind.
        let txn = Transaction::app_create(session.address(), spec.asset_id, spec.unitary_price);
        let confirmation = async {
            let signed = session.sign(txn).await.map_err(StepFailure::from)?;
            self.ledger
                .submit(vec![signed])
                .await
                .map_err(StepFailure::from)
        }
        .await
        .map_err(DeployError::CreateFailed)?;
        let app_id = confirmation.created_app.ok_or(DeployError::MissingAppId)?;

        tracing::info!(%app_id, asset = %spec.asset_id, "escrow application created");

        let checkpoint = DeployCheckpoint {
            app_id,
            app_address: app_id.address(),
            next_step: DeployStep::FundReserve,
        };
        self.run_from(session, spec, checkpoint).await
    }

    /// Resume an interrupted deployment at its first incomplete step
    pub async fn resume(
        &self,
        session: &Session,
        spec: &DeploySpec,
        checkpoint: DeployCheckpoint,
    ) -> Result<EscrowContract, DeployError> {
        Self::validate(spec)?;
        tracing::info!(app = %checkpoint.app_id, step = ?checkpoint.next_step, "resuming deployment");
        self.run_from(session, spec, checkpoint).await
    }

    fn validate(spec: &DeploySpec) -> Result<(), DeployError> {
        if spec.unitary_price == 0 {
            return Err(DeployError::NonPositivePrice);
        }
        if spec.initial_units == 0 {
            return Err(DeployError::ZeroInitialUnits);
        }
        Ok(())
    }

    async fn run_from(
        &self,
        session: &Session,
        spec: &DeploySpec,
        mut checkpoint: DeployCheckpoint,
    ) -> Result<EscrowContract, DeployError> {
        let sender = session.address();
        let app_id = checkpoint.app_id;
        let app_address = checkpoint.app_address;

        // Step 2: fund the base reserve plus a fee buffer
        if checkpoint.next_step <= DeployStep::FundReserve {
            let txn = Transaction::payment(sender, app_address, BASE_RESERVE + FEE_BUFFER);
            self.step(session, vec![txn], &checkpoint, DeployStep::FundReserve)
                .await?;
            checkpoint.next_step = DeployStep::OptInToAsset;
        }

        // Step 3: reserve top-up grouped with the opt-in call
        if checkpoint.next_step <= DeployStep::OptInToAsset {
            let funding = Transaction::payment(sender, app_address, ASSET_RESERVE + FEE_BUFFER);
            let call = Transaction::app_call(sender, app_id, AppCall::OptInToAsset)
                .with_fee(MIN_TXN_FEE + FEE_BUFFER);
            self.step(session, vec![funding, call], &checkpoint, DeployStep::OptInToAsset)
                .await?;
            checkpoint.next_step = DeployStep::TransferCustody;
        }

        // Step 4: move the initial stock into custody
        if checkpoint.next_step <= DeployStep::TransferCustody {
            let txn =
                Transaction::asset_transfer(sender, spec.asset_id, app_address, spec.initial_units);
            self.step(session, vec![txn], &checkpoint, DeployStep::TransferCustody)
                .await?;
        }

        tracing::info!(%app_id, units = spec.initial_units, "escrow deployed and custodying");
        Ok(EscrowContract::new(
            app_id,
            spec.asset_id,
            sender,
            spec.unitary_price,
            spec.initial_units,
        ))
    }

    async fn step(
        &self,
        session: &Session,
        txns: Vec<Transaction>,
        checkpoint: &DeployCheckpoint,
        step: DeployStep,
    ) -> Result<(), DeployError> {
        let result = async {
            let mut group = Vec::with_capacity(txns.len());
            for txn in txns {
                group.push(session.sign(txn).await.map_err(StepFailure::from)?);
            }
            self.ledger.submit(group).await.map_err(StepFailure::from)
        }
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(source) => Err(DeployError::Interrupted {
                step,
                checkpoint: DeployCheckpoint {
                    next_step: step,
                    ..checkpoint.clone()
                },
                source,
            }),
        }
    }
}
