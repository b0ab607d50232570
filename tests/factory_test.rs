// Asset factory tests - minting the fractional-ownership token

use ipfrax::escrow::{AssetFactory, MintError};
use ipfrax::identity::{Keypair, Session};
use ipfrax::ledger::{DevnetLedger, LedgerClient};
use std::sync::Arc;

fn funded_session(ledger: &DevnetLedger, amount: u64) -> Session {
    let session = Session::from_keypair(Keypair::generate());
    ledger.fund(session.address(), amount);
    session
}

#[tokio::test]
async fn test_mint_creates_token_with_scaled_supply() {
    let ledger = Arc::new(DevnetLedger::new());
    let owner = funded_session(&ledger, 1_000_000);
    let factory = AssetFactory::new(ledger.clone()).with_decimals(3);

    let asset_id = factory.mint(&owner, "QuantumPatent").await.unwrap();
    let params = ledger.asset_params(asset_id).await.unwrap();
    assert_eq!(params.total, 1_000);
    assert_eq!(params.decimals, 3);
    assert_eq!(params.asset_name, "QuantumPatent");
    assert_eq!(params.unit_name, "QUA");
    assert_eq!(
        ledger.asset_balance(owner.address(), asset_id).await.unwrap(),
        Some(1_000)
    );
}

#[tokio::test]
async fn test_mint_default_subdivision() {
    let ledger = Arc::new(DevnetLedger::new());
    let owner = funded_session(&ledger, 1_000_000);
    let factory = AssetFactory::new(ledger.clone());

    let asset_id = factory.mint(&owner, "Patent").await.unwrap();
    assert_eq!(ledger.asset_params(asset_id).await.unwrap().total, 100);
}

#[tokio::test]
async fn test_mint_rejects_empty_name() {
    let ledger = Arc::new(DevnetLedger::new());
    let owner = funded_session(&ledger, 1_000_000);
    let factory = AssetFactory::new(ledger.clone());

    assert!(matches!(factory.mint(&owner, "").await, Err(MintError::EmptyName)));
    assert!(matches!(factory.mint(&owner, "   ").await, Err(MintError::EmptyName)));
}

#[tokio::test]
async fn test_mint_surfaces_submission_failure_without_retry() {
    let ledger = Arc::new(DevnetLedger::new());
    let owner = funded_session(&ledger, 1_000_000);
    let factory = AssetFactory::new(ledger.clone());
    ledger.fail_next_submissions(1);

    let result = factory.mint(&owner, "Patent").await;
    assert!(matches!(result, Err(MintError::Ledger(e)) if e.is_transient()));
    // No retry happened behind the caller's back: the next mint consumes
    // no injected failure and succeeds
    factory.mint(&owner, "Patent").await.unwrap();
}
