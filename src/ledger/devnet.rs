// In-memory devnet - a single-node ledger that executes the escrow program
// semantics, used by the CLI and the test suite as the authoritative network

use crate::identity::Address;
use crate::ledger::{
    AppCall, AppGlobalState, AppId, AssetId, AssetParams, Confirmation, LedgerClient, LedgerError,
    SignedTransaction, Transaction, TransactionBody, TxnId, ASSET_RESERVE, BASE_RESERVE,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Clone, Debug, Default)]
struct Account {
    balance: u64,
    /// Asset holdings; an entry must exist (opt-in) before units can arrive
    holdings: HashMap<AssetId, u64>,
}

impl Account {
    fn min_balance(&self) -> u64 {
        BASE_RESERVE + ASSET_RESERVE * self.holdings.len() as u64
    }

    /// Accounts with no balance and no holdings do not exist yet
    fn exists(&self) -> bool {
        self.balance > 0 || !self.holdings.is_empty()
    }
}

#[derive(Clone, Default)]
struct State {
    round: u64,
    accounts: HashMap<Address, Account>,
    assets: HashMap<AssetId, AssetParams>,
    apps: HashMap<AppId, AppGlobalState>,
    next_asset: u64,
    next_app: u64,
    seen: HashSet<TxnId>,
}

#[derive(Default)]
struct CreatedIds {
    asset: Option<AssetId>,
    app: Option<AppId>,
}

/// In-memory ledger with the escrow program baked in.
///
/// Groups are atomic: every transaction in a group validates and applies, or
/// none do. All the checks the client side treats as advisory (remaining
/// units, payment amounts, sender authority) are enforced here.
pub struct DevnetLedger {
    state: Mutex<State>,
    /// (submissions to let through, submissions to fail after that)
    outage: Mutex<(u32, u32)>,
}

impl DevnetLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_asset: 1,
                next_app: 1,
                ..State::default()
            }),
            outage: Mutex::new((0, 0)),
        }
    }

    /// Faucet: credit an account out of thin air
    pub fn fund(&self, account: Address, amount: u64) {
        let mut state = self.state.lock().unwrap();
        state.accounts.entry(account).or_default().balance += amount;
    }

    /// Fail the next `n` submissions with a transient error
    pub fn fail_next_submissions(&self, n: u32) {
        self.fail_after(0, n);
    }

    /// Let `skip` submissions through, then fail the following `count`
    pub fn fail_after(&self, skip: u32, count: u32) {
        *self.outage.lock().unwrap() = (skip, count);
    }

    fn outage_hit(&self) -> bool {
        let mut outage = self.outage.lock().unwrap();
        if outage.0 > 0 {
            outage.0 -= 1;
            false
        } else if outage.1 > 0 {
            outage.1 -= 1;
            true
        } else {
            false
        }
    }

    /// Current round
    pub fn round(&self) -> u64 {
        self.state.lock().unwrap().round
    }

    fn apply_group(state: &mut State, group: &[SignedTransaction]) -> Result<CreatedIds, LedgerError> {
        let mut created = CreatedIds::default();
        for signed in group {
            Self::apply_txn(state, signed.txn(), group, &mut created)?;
        }
        // Every existing account must end the group above its reserve
        for account in state.accounts.values() {
            if account.exists() && account.balance < account.min_balance() {
                return Err(LedgerError::InsufficientBalance {
                    available: account.balance,
                    required: account.min_balance(),
                });
            }
        }
        Ok(created)
    }

    fn apply_txn(
        state: &mut State,
        txn: &Transaction,
        group: &[SignedTransaction],
        created: &mut CreatedIds,
    ) -> Result<(), LedgerError> {
        let sender = txn.sender();
        Self::debit(state, sender, txn.fee())?;

        match txn.body() {
            TransactionBody::Payment { receiver, amount } => {
                Self::debit(state, sender, *amount)?;
                state.accounts.entry(*receiver).or_default().balance += amount;
            }
            TransactionBody::AssetCreate {
                total,
                decimals,
                asset_name,
                unit_name,
            } => {
                let id = AssetId::new(state.next_asset);
                state.next_asset += 1;
                state.assets.insert(
                    id,
                    AssetParams {
                        creator: sender,
                        total: *total,
                        decimals: *decimals,
                        asset_name: asset_name.clone(),
                        unit_name: unit_name.clone(),
                    },
                );
                // The creator starts opted in, holding the full supply
                let account = state
                    .accounts
                    .get_mut(&sender)
                    .ok_or(LedgerError::AccountNotFound(sender))?;
                account.holdings.insert(id, *total);
                created.asset = Some(id);
            }
            TransactionBody::AssetOptIn { asset_id } => {
                if !state.assets.contains_key(asset_id) {
                    return Err(LedgerError::AssetNotFound(*asset_id));
                }
                let account = state
                    .accounts
                    .get_mut(&sender)
                    .ok_or(LedgerError::AccountNotFound(sender))?;
                account.holdings.entry(*asset_id).or_insert(0);
            }
            TransactionBody::AssetTransfer {
                asset_id,
                receiver,
                amount,
            } => {
                if !state.assets.contains_key(asset_id) {
                    return Err(LedgerError::AssetNotFound(*asset_id));
                }
                Self::move_units(state, *asset_id, sender, *receiver, *amount)?;
            }
            TransactionBody::ApplicationCall { app_id, call } => {
                Self::apply_app_call(state, txn, *app_id, call, group, created)?;
            }
        }
        Ok(())
    }

    fn apply_app_call(
        state: &mut State,
        txn: &Transaction,
        app_id: Option<AppId>,
        call: &AppCall,
        group: &[SignedTransaction],
        created: &mut CreatedIds,
    ) -> Result<(), LedgerError> {
        let sender = txn.sender();
        match call {
            AppCall::Create {
                asset_id,
                unitary_price,
            } => {
                if !state.assets.contains_key(asset_id) {
                    return Err(LedgerError::AssetNotFound(*asset_id));
                }
                if *unitary_price == 0 {
                    return Err(LedgerError::Rejected(
                        "unitary price must be positive".to_string(),
                    ));
                }
                let id = AppId::new(state.next_app);
                state.next_app += 1;
                state.apps.insert(
                    id,
                    AppGlobalState {
                        asset_id: *asset_id,
                        unitary_price: *unitary_price,
                        owner: sender,
                    },
                );
                created.app = Some(id);
            }
            AppCall::SetPrice { new_price } => {
                let app_id = app_id.ok_or_else(|| {
                    LedgerError::Rejected("call is missing an application id".to_string())
                })?;
                let app = state
                    .apps
                    .get_mut(&app_id)
                    .ok_or(LedgerError::ApplicationNotFound(app_id))?;
                if app.owner != sender {
                    return Err(LedgerError::Unauthorized(format!(
                        "only the owner may set the price of {app_id}"
                    )));
                }
                if *new_price == 0 {
                    return Err(LedgerError::Rejected(
                        "unitary price must be positive".to_string(),
                    ));
                }
                app.unitary_price = *new_price;
            }
            AppCall::OptInToAsset => {
                let app_id = app_id.ok_or_else(|| {
                    LedgerError::Rejected("call is missing an application id".to_string())
                })?;
                let app = state
                    .apps
                    .get(&app_id)
                    .ok_or(LedgerError::ApplicationNotFound(app_id))?;
                let asset_id = app.asset_id;
                let app_address = app_id.address();
                if !Self::group_pays(group, app_address) {
                    return Err(LedgerError::InvalidGroup(
                        "opt-in requires a grouped funding payment".to_string(),
                    ));
                }
                state
                    .accounts
                    .entry(app_address)
                    .or_default()
                    .holdings
                    .entry(asset_id)
                    .or_insert(0);
            }
            AppCall::BuyShares { quantity } => {
                let app_id = app_id.ok_or_else(|| {
                    LedgerError::Rejected("call is missing an application id".to_string())
                })?;
                let app = state
                    .apps
                    .get(&app_id)
                    .ok_or(LedgerError::ApplicationNotFound(app_id))?;
                let asset_id = app.asset_id;
                let price = app.unitary_price;
                let app_address = app_id.address();

                if *quantity == 0 {
                    return Err(LedgerError::Rejected("quantity must be positive".to_string()));
                }
                let payment = group
                    .iter()
                    .filter(|s| s.txn().sender() == sender)
                    .find_map(|s| match s.txn().body() {
                        TransactionBody::Payment { receiver, amount } if *receiver == app_address => {
                            Some(*amount)
                        }
                        _ => None,
                    })
                    .ok_or_else(|| {
                        LedgerError::InvalidGroup(
                            "purchase requires a grouped payment to the escrow account".to_string(),
                        )
                    })?;
                let expected = quantity.checked_mul(price).ok_or_else(|| {
                    LedgerError::Rejected("total cost overflows".to_string())
                })?;
                if payment != expected {
                    return Err(LedgerError::PaymentMismatch {
                        expected,
                        got: payment,
                    });
                }
                Self::move_units(state, asset_id, app_address, sender, *quantity)?;
            }
            AppCall::Delete => {
                let app_id = app_id.ok_or_else(|| {
                    LedgerError::Rejected("call is missing an application id".to_string())
                })?;
                let app = state
                    .apps
                    .get(&app_id)
                    .ok_or(LedgerError::ApplicationNotFound(app_id))?;
                if app.owner != sender {
                    return Err(LedgerError::Unauthorized(format!(
                        "only the owner may delete {app_id}"
                    )));
                }
                let asset_id = app.asset_id;
                let app_address = app_id.address();

                // Close out: residual units and proceeds return to the owner
                if let Some(account) = state.accounts.get(&app_address).cloned() {
                    let residual = account.holdings.get(&asset_id).copied().unwrap_or(0);
                    if residual > 0 {
                        Self::move_units(state, asset_id, app_address, sender, residual)?;
                    }
                    let proceeds = state
                        .accounts
                        .get(&app_address)
                        .map(|a| a.balance)
                        .unwrap_or(0);
                    state.accounts.entry(sender).or_default().balance += proceeds;
                    state.accounts.remove(&app_address);
                }
                state.apps.remove(&app_id);
            }
        }
        Ok(())
    }

    fn group_pays(group: &[SignedTransaction], receiver: Address) -> bool {
        group.iter().any(|s| {
            matches!(s.txn().body(), TransactionBody::Payment { receiver: r, .. } if *r == receiver)
        })
    }

    fn debit(state: &mut State, account: Address, amount: u64) -> Result<(), LedgerError> {
        let entry = state
            .accounts
            .get_mut(&account)
            .ok_or(LedgerError::AccountNotFound(account))?;
        if entry.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                available: entry.balance,
                required: amount,
            });
        }
        entry.balance -= amount;
        Ok(())
    }

    fn move_units(
        state: &mut State,
        asset_id: AssetId,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let available = state
            .accounts
            .get(&from)
            .and_then(|a| a.holdings.get(&asset_id))
            .copied()
            .ok_or(LedgerError::MissingCapability(from, asset_id))?;
        if available < amount {
            return Err(LedgerError::InsufficientUnits {
                requested: amount,
                available,
            });
        }
        let receiver = state
            .accounts
            .get_mut(&to)
            .ok_or(LedgerError::AccountNotFound(to))?;
        let holding = receiver
            .holdings
            .get_mut(&asset_id)
            .ok_or(LedgerError::MissingCapability(to, asset_id))?;
        *holding += amount;
        if let Some(account) = state.accounts.get_mut(&from) {
            if let Some(holding) = account.holdings.get_mut(&asset_id) {
                *holding -= amount;
            }
        }
        Ok(())
    }
}

impl Default for DevnetLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for DevnetLedger {
    async fn submit(&self, group: Vec<SignedTransaction>) -> Result<Confirmation, LedgerError> {
        if self.outage_hit() {
            return Err(LedgerError::SubmissionFailed(
                "connection reset by devnet".to_string(),
            ));
        }
        if group.is_empty() {
            return Err(LedgerError::InvalidGroup("empty group".to_string()));
        }

        let mut state = self.state.lock().unwrap();

        for signed in &group {
            let txn = signed.txn();
            if !signed.signature().verify(&txn.sender(), &txn.signing_bytes()) {
                return Err(LedgerError::BadSignature(signed.id()));
            }
            if state.seen.contains(&signed.id()) {
                return Err(LedgerError::Rejected(format!(
                    "duplicate transaction {}",
                    signed.id()
                )));
            }
        }

        // Apply against a copy so a failed group has no effect
        let mut staged = state.clone();
        let created = Self::apply_group(&mut staged, &group)?;

        staged.round += 1;
        let txn_ids: Vec<TxnId> = group.iter().map(|s| s.id()).collect();
        for id in &txn_ids {
            staged.seen.insert(*id);
        }
        let confirmation = Confirmation {
            confirmed_round: staged.round,
            txn_ids,
            created_asset: created.asset,
            created_app: created.app,
        };
        *state = staged;

        tracing::debug!(
            round = confirmation.confirmed_round,
            txns = confirmation.txn_ids.len(),
            "group confirmed"
        );
        Ok(confirmation)
    }

    async fn account_balance(&self, account: Address) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.get(&account).map(|a| a.balance).unwrap_or(0))
    }

    async fn asset_balance(
        &self,
        account: Address,
        asset: AssetId,
    ) -> Result<Option<u64>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .get(&account)
            .and_then(|a| a.holdings.get(&asset))
            .copied())
    }

    async fn asset_params(&self, asset: AssetId) -> Result<AssetParams, LedgerError> {
        let state = self.state.lock().unwrap();
        state
            .assets
            .get(&asset)
            .cloned()
            .ok_or(LedgerError::AssetNotFound(asset))
    }

    async fn app_state(&self, app: AppId) -> Result<AppGlobalState, LedgerError> {
        let state = self.state.lock().unwrap();
        state
            .apps
            .get(&app)
            .cloned()
            .ok_or(LedgerError::ApplicationNotFound(app))
    }
}
