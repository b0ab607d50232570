// Escrow contract state - the client-side view of one deployed escrow

use crate::identity::Address;
use crate::ledger::{AppId, AssetId};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of an escrow contract.
///
/// `deploy` moves a contract to `Deployed`; purchases move it through
/// `PartiallySold` towards `SoldOut`; `teardown` moves any non-terminal phase
/// to `Deleted`. Nothing transitions out of `Deleted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowPhase {
    /// Custodying its full initial stock
    Deployed,
    /// Some, but not all, units sold
    PartiallySold,
    /// No units remaining
    SoldOut,
    /// Terminal: the program no longer exists
    Deleted,
}

/// Client-side view of one deployed escrow program.
///
/// `units_remaining` mirrors the program account's token balance; the ledger
/// is authoritative and this value is refreshed from confirmations, never
/// assumed from client-side arithmetic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowContract {
    app_id: AppId,
    app_address: Address,
    asset_id: AssetId,
    owner: Address,
    unitary_price: u64,
    initial_units: u64,
    units_remaining: u64,
    deleted: bool,
}

impl EscrowContract {
    pub(crate) fn new(
        app_id: AppId,
        asset_id: AssetId,
        owner: Address,
        unitary_price: u64,
        initial_units: u64,
    ) -> Self {
        Self {
            app_id,
            app_address: app_id.address(),
            asset_id,
            owner,
            unitary_price,
            initial_units,
            units_remaining: initial_units,
            deleted: false,
        }
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    /// The program-controlled custodial account
    pub fn app_address(&self) -> Address {
        self.app_address
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn unitary_price(&self) -> u64 {
        self.unitary_price
    }

    /// Units moved into custody at deployment
    pub fn initial_units(&self) -> u64 {
        self.initial_units
    }

    /// Units still held by the escrow and available for purchase
    pub fn units_remaining(&self) -> u64 {
        self.units_remaining
    }

    pub fn phase(&self) -> EscrowPhase {
        if self.deleted {
            EscrowPhase::Deleted
        } else if self.units_remaining == 0 {
            EscrowPhase::SoldOut
        } else if self.units_remaining < self.initial_units {
            EscrowPhase::PartiallySold
        } else {
            EscrowPhase::Deployed
        }
    }

    /// Whether the program still exists on the ledger
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    pub(crate) fn with_price(mut self, unitary_price: u64) -> Self {
        self.unitary_price = unitary_price;
        self
    }

    pub(crate) fn with_units_remaining(mut self, units_remaining: u64) -> Self {
        self.units_remaining = units_remaining;
        self
    }

    pub(crate) fn into_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(initial: u64) -> EscrowContract {
        EscrowContract::new(
            AppId::new(1),
            AssetId::new(1),
            Address::from_bytes([9u8; 32]),
            5,
            initial,
        )
    }

    #[test]
    fn test_phase_progression() {
        let c = contract(100);
        assert_eq!(c.phase(), EscrowPhase::Deployed);
        let c = c.with_units_remaining(40);
        assert_eq!(c.phase(), EscrowPhase::PartiallySold);
        let c = c.with_units_remaining(0);
        assert_eq!(c.phase(), EscrowPhase::SoldOut);
        let c = c.into_deleted();
        assert_eq!(c.phase(), EscrowPhase::Deleted);
    }

    #[test]
    fn test_app_address_derived_from_app_id() {
        let c = contract(10);
        assert_eq!(c.app_address(), c.app_id().address());
    }
}
