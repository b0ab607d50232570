// Price controller and teardown tests - owner-only operations and the
// terminal state

use ipfrax::escrow::{
    AssetFactory, DeploySpec, EscrowContract, EscrowDeployer, EscrowPhase, PriceController,
    PriceError, PurchaseError, PurchaseProcessor, TeardownController, TeardownError,
};
use ipfrax::identity::{Keypair, Session};
use ipfrax::ledger::{DevnetLedger, LedgerClient, LedgerError};
use std::sync::Arc;

const RESERVE_WITH_BUFFERS: u64 = 202_000;

async fn listed_escrow(ledger: &Arc<DevnetLedger>, price: u64) -> (Session, EscrowContract) {
    let owner = Session::from_keypair(Keypair::generate());
    ledger.fund(owner.address(), 10_000_000);
    let factory = AssetFactory::new(ledger.clone()).with_decimals(3);
    let asset_id = factory.mint(&owner, "QuantumPatent").await.unwrap();
    let contract = EscrowDeployer::new(ledger.clone())
        .deploy(
            &owner,
            &DeploySpec {
                asset_id,
                unitary_price: price,
                initial_units: 1_000,
            },
        )
        .await
        .unwrap();
    (owner, contract)
}

async fn funded_buyer(ledger: &Arc<DevnetLedger>) -> Session {
    let buyer = Session::from_keypair(Keypair::generate());
    ledger.fund(buyer.address(), 10_000_000);
    buyer
}

// ============================================================================
// PRICE CONTROLLER
// ============================================================================

#[tokio::test]
async fn test_set_price_reads_back_accepted_value() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, contract) = listed_escrow(&ledger, 5).await;
    let prices = PriceController::new(ledger.clone());

    let contract = prices.set_price(&owner, &contract, 7).await.unwrap();
    assert_eq!(contract.unitary_price(), 7);
    assert_eq!(ledger.app_state(contract.app_id()).await.unwrap().unitary_price, 7);
}

#[tokio::test]
async fn test_set_price_is_idempotent_for_identical_values() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, contract) = listed_escrow(&ledger, 5).await;
    let prices = PriceController::new(ledger.clone());

    let once = prices.set_price(&owner, &contract, 7).await.unwrap();
    let twice = prices.set_price(&owner, &once, 7).await.unwrap();
    assert_eq!(once.unitary_price(), twice.unitary_price());
    assert_eq!(ledger.app_state(contract.app_id()).await.unwrap().unitary_price, 7);
}

#[tokio::test]
async fn test_set_price_rejects_non_owner_on_ledger() {
    let ledger = Arc::new(DevnetLedger::new());
    let (_owner, contract) = listed_escrow(&ledger, 5).await;
    let stranger = funded_buyer(&ledger).await;
    let prices = PriceController::new(ledger.clone());

    let result = prices.set_price(&stranger, &contract, 7).await;
    assert!(matches!(
        result,
        Err(PriceError::Ledger(LedgerError::Unauthorized(_)))
    ));
    assert_eq!(ledger.app_state(contract.app_id()).await.unwrap().unitary_price, 5);
}

#[tokio::test]
async fn test_set_price_rejects_zero_before_submission() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, contract) = listed_escrow(&ledger, 5).await;
    let prices = PriceController::new(ledger.clone());

    let round_before = ledger.round();
    assert!(matches!(
        prices.set_price(&owner, &contract, 0).await,
        Err(PriceError::NonPositivePrice)
    ));
    // Nothing was submitted
    assert_eq!(ledger.round(), round_before);
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[tokio::test]
async fn test_teardown_closes_out_to_owner() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, contract) = listed_escrow(&ledger, 5).await;
    let buyer = funded_buyer(&ledger).await;
    let processor = PurchaseProcessor::new(ledger.clone());
    processor.buy(&buyer, &contract, 10).await.unwrap();

    let owner_balance = ledger.account_balance(owner.address()).await.unwrap();
    let owner_units = ledger
        .asset_balance(owner.address(), contract.asset_id())
        .await
        .unwrap()
        .unwrap();

    let teardown = TeardownController::new(ledger.clone());
    let (contract, receipt) = teardown.teardown(&owner, &contract).await.unwrap();

    assert_eq!(contract.phase(), EscrowPhase::Deleted);
    assert_eq!(receipt.proceeds, RESERVE_WITH_BUFFERS + 50);
    assert_eq!(receipt.returned_units, 990);
    // Proceeds arrive minus the delete call's fee; residual units return whole
    assert_eq!(
        ledger.account_balance(owner.address()).await.unwrap(),
        owner_balance + receipt.proceeds - 3_000
    );
    assert_eq!(
        ledger.asset_balance(owner.address(), contract.asset_id()).await.unwrap(),
        Some(owner_units + 990)
    );
}

#[tokio::test]
async fn test_teardown_rejects_non_owner() {
    let ledger = Arc::new(DevnetLedger::new());
    let (_owner, contract) = listed_escrow(&ledger, 5).await;
    let stranger = funded_buyer(&ledger).await;
    let teardown = TeardownController::new(ledger.clone());

    let result = teardown.teardown(&stranger, &contract).await;
    assert!(matches!(
        result,
        Err(TeardownError::Ledger(LedgerError::Unauthorized(_)))
    ));
    ledger.app_state(contract.app_id()).await.unwrap();
}

#[tokio::test]
async fn test_operations_after_teardown_hit_nonexistent_program() {
    let ledger = Arc::new(DevnetLedger::new());
    let (owner, contract) = listed_escrow(&ledger, 5).await;
    let buyer = funded_buyer(&ledger).await;
    let teardown = TeardownController::new(ledger.clone());

    // Keep the pre-teardown contract value around, as a stale client would
    let stale = contract.clone();
    let (deleted, _receipt) = teardown.teardown(&owner, &contract).await.unwrap();

    // Buying against the stale value fails with a "does not exist" condition
    let processor = PurchaseProcessor::new(ledger.clone());
    assert!(matches!(
        processor.buy(&buyer, &stale, 1).await,
        Err(PurchaseError::Ledger(LedgerError::ApplicationNotFound(_)))
    ));

    // So does repricing
    let prices = PriceController::new(ledger.clone());
    assert!(matches!(
        prices.set_price(&owner, &stale, 9).await,
        Err(PriceError::Ledger(LedgerError::ApplicationNotFound(_)))
    ));

    // The returned contract value knows it is terminal
    assert!(matches!(
        processor.buy(&buyer, &deleted, 1).await,
        Err(PurchaseError::ContractDeleted)
    ));
    assert!(matches!(
        teardown.teardown(&owner, &deleted).await,
        Err(TeardownError::AlreadyDeleted)
    ));
}
