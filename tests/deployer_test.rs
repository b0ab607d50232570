// Escrow deployer tests - the four-step sequence, partial failure, resume

use ipfrax::escrow::{
    AssetFactory, DeployError, DeploySpec, DeployStep, EscrowDeployer, EscrowPhase,
};
use ipfrax::identity::{Keypair, Session};
use ipfrax::ledger::{AssetId, DevnetLedger, LedgerClient};
use std::sync::Arc;

const RESERVE_WITH_BUFFERS: u64 = 202_000;

async fn minted_owner(ledger: &Arc<DevnetLedger>) -> (Session, AssetId) {
    let owner = Session::from_keypair(Keypair::generate());
    ledger.fund(owner.address(), 10_000_000);
    let factory = AssetFactory::new(ledger.clone()).with_decimals(3);
    let asset_id = factory.mint(&owner, "QuantumPatent").await.unwrap();
    (owner, asset_id)
}

fn spec(asset_id: AssetId) -> DeploySpec {
    DeploySpec {
        asset_id,
        unitary_price: 1,
        initial_units: 1_000,
    }
}

// ============================================================================
// CLEAN DEPLOYMENT
// ============================================================================

#[tokio::test]
async fn test_deploy_establishes_custody() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, asset_id) = minted_owner(&ledger).await;
    let deployer = EscrowDeployer::new(ledger.clone());

    let contract = deployer.deploy(&owner, &spec(asset_id)).await.unwrap();

    assert_eq!(contract.units_remaining(), 1_000);
    assert_eq!(contract.phase(), EscrowPhase::Deployed);
    assert_eq!(contract.owner(), owner.address());
    // Ledger agrees: the program account custodies the full initial stock
    assert_eq!(
        ledger.asset_balance(contract.app_address(), asset_id).await.unwrap(),
        Some(1_000)
    );
    assert_eq!(
        ledger.asset_balance(owner.address(), asset_id).await.unwrap(),
        Some(0)
    );
    let state = ledger.app_state(contract.app_id()).await.unwrap();
    assert_eq!(state.unitary_price, 1);
    assert_eq!(state.owner, owner.address());
}

#[tokio::test]
async fn test_deploy_validates_inputs() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, asset_id) = minted_owner(&ledger).await;
    let deployer = EscrowDeployer::new(ledger.clone());

    let zero_price = DeploySpec {
        unitary_price: 0,
        ..spec(asset_id)
    };
    assert!(matches!(
        deployer.deploy(&owner, &zero_price).await,
        Err(DeployError::NonPositivePrice)
    ));

    let zero_units = DeploySpec {
        initial_units: 0,
        ..spec(asset_id)
    };
    assert!(matches!(
        deployer.deploy(&owner, &zero_units).await,
        Err(DeployError::ZeroInitialUnits)
    ));
}

// ============================================================================
// PARTIAL FAILURE AND RESUME
// ============================================================================

#[tokio::test]
async fn test_failure_before_create_is_clean() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, asset_id) = minted_owner(&ledger).await;
    let deployer = EscrowDeployer::new(ledger.clone());

    ledger.fail_next_submissions(1);
    let err = deployer.deploy(&owner, &spec(asset_id)).await.unwrap_err();
    assert!(matches!(err, DeployError::CreateFailed(_)));
    assert!(err.checkpoint().is_none());
}

#[tokio::test]
async fn test_interrupted_funding_yields_checkpoint() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, asset_id) = minted_owner(&ledger).await;
    let deployer = EscrowDeployer::new(ledger.clone());

    // Let the create through, fail the reserve funding
    ledger.fail_after(1, 1);
    let err = deployer.deploy(&owner, &spec(asset_id)).await.unwrap_err();
    let checkpoint = err.checkpoint().expect("interrupted deploy carries a checkpoint").clone();
    assert_eq!(checkpoint.next_step, DeployStep::FundReserve);

    // The application exists but custodies nothing: an inconsistent
    // intermediate state, surfaced rather than rolled back
    ledger.app_state(checkpoint.app_id).await.unwrap();
    assert_eq!(ledger.account_balance(checkpoint.app_address).await.unwrap(), 0);

    let contract = deployer
        .resume(&owner, &spec(asset_id), checkpoint)
        .await
        .unwrap();
    assert_eq!(contract.units_remaining(), 1_000);
    assert_eq!(
        ledger.asset_balance(contract.app_address(), asset_id).await.unwrap(),
        Some(1_000)
    );
}

#[tokio::test]
async fn test_interrupted_custody_transfer_resumes_at_last_step() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, asset_id) = minted_owner(&ledger).await;
    let deployer = EscrowDeployer::new(ledger.clone());

    // create, fund and opt-in succeed; the custody transfer fails
    ledger.fail_after(3, 1);
    let err = deployer.deploy(&owner, &spec(asset_id)).await.unwrap_err();
    let checkpoint = err.checkpoint().unwrap().clone();
    assert_eq!(checkpoint.next_step, DeployStep::TransferCustody);

    // Funded and opted in, but not yet custodying
    assert_eq!(
        ledger.account_balance(checkpoint.app_address).await.unwrap(),
        RESERVE_WITH_BUFFERS
    );
    assert_eq!(
        ledger.asset_balance(checkpoint.app_address, asset_id).await.unwrap(),
        Some(0)
    );

    let contract = deployer
        .resume(&owner, &spec(asset_id), checkpoint)
        .await
        .unwrap();
    assert_eq!(contract.units_remaining(), 1_000);
}

#[tokio::test]
async fn test_resumed_deploy_matches_clean_deploy() {
    let clean = Arc::new(DevnetLedger::new());
    let (owner_a, asset_a) = minted_owner(&clean).await;
    let contract_a = EscrowDeployer::new(clean.clone())
        .deploy(&owner_a, &spec(asset_a))
        .await
        .unwrap();

    let bumpy = Arc::new(DevnetLedger::new());
    let (owner_b, asset_b) = minted_owner(&bumpy).await;
    let deployer = EscrowDeployer::new(bumpy.clone());
    bumpy.fail_after(2, 1);
    let checkpoint = deployer
        .deploy(&owner_b, &spec(asset_b))
        .await
        .unwrap_err()
        .checkpoint()
        .unwrap()
        .clone();
    let contract_b = deployer
        .resume(&owner_b, &spec(asset_b), checkpoint)
        .await
        .unwrap();

    assert_eq!(
        clean.account_balance(contract_a.app_address()).await.unwrap(),
        bumpy.account_balance(contract_b.app_address()).await.unwrap()
    );
    assert_eq!(
        clean.asset_balance(contract_a.app_address(), asset_a).await.unwrap(),
        bumpy.asset_balance(contract_b.app_address(), asset_b).await.unwrap()
    );
}
