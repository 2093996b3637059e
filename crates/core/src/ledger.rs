//! Per-user collateral/debt ledger.
//!
//! The ledger is the sole writer of balances and flags. Balances are
//! accrual-adjusted upstream (an external index); here they are treated as
//! current. Flag consistency is maintained on every mutation: `borrowing`
//! tracks a non-zero debt balance, `collateral_enabled` is a user choice
//! that is force-cleared when the backing balance reaches zero.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};

use crate::reserve::ReserveId;

/// Per-reserve usage flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReserveFlags {
    pub collateral_enabled: bool,
    pub borrowing: bool,
}

impl ReserveFlags {
    fn is_empty(&self) -> bool {
        !self.collateral_enabled && !self.borrowing
    }
}

/// Per-user reserve flags plus the auction batch-invalidation stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfig {
    flags: BTreeMap<ReserveId, ReserveFlags>,
    /// Auctions started at or before this timestamp are void.
    pub auction_validity_ts: u64,
}

impl UserConfig {
    pub fn is_collateral_enabled(&self, reserve: ReserveId) -> bool {
        self.flags.get(&reserve).map_or(false, |f| f.collateral_enabled)
    }

    pub fn is_borrowing(&self, reserve: ReserveId) -> bool {
        self.flags.get(&reserve).map_or(false, |f| f.borrowing)
    }

    pub fn set_collateral_enabled(&mut self, reserve: ReserveId, enabled: bool) {
        let flags = self.flags.entry(reserve).or_default();
        flags.collateral_enabled = enabled;
        if flags.is_empty() {
            self.flags.remove(&reserve);
        }
    }

    pub fn set_borrowing(&mut self, reserve: ReserveId, borrowing: bool) {
        let flags = self.flags.entry(reserve).or_default();
        flags.borrowing = borrowing;
        if flags.is_empty() {
            self.flags.remove(&reserve);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReserveId, &ReserveFlags)> {
        self.flags.iter()
    }
}

/// Fungible balances on one reserve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FungibleBalance {
    pub collateral: U256,
    pub debt: U256,
}

impl FungibleBalance {
    fn is_empty(&self) -> bool {
        self.collateral.is_zero() && self.debt.is_zero()
    }
}

/// Per-token state for NFT holdings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NftSlot {
    pub use_as_collateral: bool,
}

/// One user's complete position.
#[derive(Debug, Clone, Default)]
pub struct UserPosition {
    pub config: UserConfig,
    fungible: BTreeMap<ReserveId, FungibleBalance>,
    nfts: BTreeMap<ReserveId, BTreeMap<U256, NftSlot>>,
}

impl UserPosition {
    pub fn collateral_of(&self, reserve: ReserveId) -> U256 {
        self.fungible.get(&reserve).map_or(U256::ZERO, |b| b.collateral)
    }

    pub fn debt_of(&self, reserve: ReserveId) -> U256 {
        self.fungible.get(&reserve).map_or(U256::ZERO, |b| b.debt)
    }

    pub fn has_any_debt(&self) -> bool {
        self.fungible.values().any(|b| !b.debt.is_zero())
    }

    pub fn nft_slot(&self, reserve: ReserveId, token_id: U256) -> Option<NftSlot> {
        self.nfts.get(&reserve)?.get(&token_id).copied()
    }

    pub fn owns_nft(&self, reserve: ReserveId, token_id: U256) -> bool {
        self.nft_slot(reserve, token_id).is_some()
    }

    pub fn nft_count(&self, reserve: ReserveId) -> usize {
        self.nfts.get(&reserve).map_or(0, |t| t.len())
    }

    pub fn collateral_nft_count(&self, reserve: ReserveId) -> usize {
        self.nfts
            .get(&reserve)
            .map_or(0, |t| t.values().filter(|s| s.use_as_collateral).count())
    }

    pub fn nft_tokens(&self, reserve: ReserveId) -> impl Iterator<Item = (&U256, &NftSlot)> {
        self.nfts.get(&reserve).into_iter().flat_map(|t| t.iter())
    }

    pub fn fungible_reserves(&self) -> impl Iterator<Item = (&ReserveId, &FungibleBalance)> {
        self.fungible.iter()
    }

    pub fn nft_reserves(&self) -> impl Iterator<Item = &ReserveId> {
        self.nfts.keys()
    }

    // Mutators. These keep flags in sync and are also used on position
    // clones to simulate an operation before committing it.

    /// Credit collateral; returns true when the balance was previously zero.
    pub fn credit_collateral(&mut self, reserve: ReserveId, amount: U256) -> bool {
        let balance = self.fungible.entry(reserve).or_default();
        let was_zero = balance.collateral.is_zero();
        balance.collateral += amount;
        was_zero
    }

    /// Debit collateral; clears the collateral flag at zero. Returns the
    /// remaining balance.
    pub fn debit_collateral(&mut self, reserve: ReserveId, amount: U256) -> U256 {
        let balance = self.fungible.entry(reserve).or_default();
        balance.collateral = balance.collateral.saturating_sub(amount);
        let remaining = balance.collateral;
        if balance.is_empty() {
            self.fungible.remove(&reserve);
        }
        if remaining.is_zero() {
            self.config.set_collateral_enabled(reserve, false);
        }
        remaining
    }

    /// Credit debt and raise the borrowing flag.
    pub fn credit_debt(&mut self, reserve: ReserveId, amount: U256) {
        let balance = self.fungible.entry(reserve).or_default();
        balance.debt += amount;
        self.config.set_borrowing(reserve, true);
    }

    /// Debit debt; clears the borrowing flag at zero. Returns the remaining
    /// debt.
    pub fn debit_debt(&mut self, reserve: ReserveId, amount: U256) -> U256 {
        let balance = self.fungible.entry(reserve).or_default();
        balance.debt = balance.debt.saturating_sub(amount);
        let remaining = balance.debt;
        if balance.is_empty() {
            self.fungible.remove(&reserve);
        }
        if remaining.is_zero() {
            self.config.set_borrowing(reserve, false);
        }
        remaining
    }

    pub fn insert_nft(&mut self, reserve: ReserveId, token_id: U256, use_as_collateral: bool) {
        self.nfts
            .entry(reserve)
            .or_default()
            .insert(token_id, NftSlot { use_as_collateral });
        self.refresh_nft_collateral_flag(reserve);
    }

    pub fn remove_nft(&mut self, reserve: ReserveId, token_id: U256) -> Option<NftSlot> {
        let tokens = self.nfts.get_mut(&reserve)?;
        let slot = tokens.remove(&token_id);
        if tokens.is_empty() {
            self.nfts.remove(&reserve);
        }
        self.refresh_nft_collateral_flag(reserve);
        slot
    }

    pub fn set_nft_collateral(&mut self, reserve: ReserveId, token_id: U256, enabled: bool) {
        if let Some(slot) = self.nfts.get_mut(&reserve).and_then(|t| t.get_mut(&token_id)) {
            slot.use_as_collateral = enabled;
        }
        self.refresh_nft_collateral_flag(reserve);
    }

    /// Reserve-level collateral flag mirrors "any token flagged".
    fn refresh_nft_collateral_flag(&mut self, reserve: ReserveId) {
        let any = self.collateral_nft_count(reserve) > 0;
        self.config.set_collateral_enabled(reserve, any);
    }
}

/// Pool-wide supplied/borrowed totals for one reserve, used for cap
/// enforcement. NFT reserves count whole tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReserveTotals {
    pub supplied: U256,
    pub debt: U256,
}

/// The authoritative single-writer store of all positions.
#[derive(Debug, Default)]
pub struct PositionLedger {
    users: BTreeMap<Address, UserPosition>,
    totals: BTreeMap<ReserveId, ReserveTotals>,
    nft_owners: BTreeMap<(ReserveId, U256), Address>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: Address) -> Option<&UserPosition> {
        self.users.get(&user)
    }

    /// Owned copy of a position (empty default for unknown users); used for
    /// health computation and operation simulation.
    pub fn snapshot(&self, user: Address) -> UserPosition {
        self.users.get(&user).cloned().unwrap_or_default()
    }

    pub fn position_mut(&mut self, user: Address) -> &mut UserPosition {
        self.users.entry(user).or_default()
    }

    pub fn totals(&self, reserve: ReserveId) -> ReserveTotals {
        self.totals.get(&reserve).copied().unwrap_or_default()
    }

    pub fn owner_of(&self, reserve: ReserveId, token_id: U256) -> Option<Address> {
        self.nft_owners.get(&(reserve, token_id)).copied()
    }

    // Composite operations keeping totals and the owner index in sync.

    pub fn credit_collateral(&mut self, user: Address, reserve: ReserveId, amount: U256) -> bool {
        self.totals.entry(reserve).or_default().supplied += amount;
        self.position_mut(user).credit_collateral(reserve, amount)
    }

    /// Debit collateral. `leaves_pool` distinguishes a withdrawal of
    /// underlying (total supply shrinks) from an in-pool share transfer.
    pub fn debit_collateral(
        &mut self,
        user: Address,
        reserve: ReserveId,
        amount: U256,
        leaves_pool: bool,
    ) -> U256 {
        if leaves_pool {
            let totals = self.totals.entry(reserve).or_default();
            totals.supplied = totals.supplied.saturating_sub(amount);
        }
        self.position_mut(user).debit_collateral(reserve, amount)
    }

    pub fn credit_debt(&mut self, user: Address, reserve: ReserveId, amount: U256) {
        self.totals.entry(reserve).or_default().debt += amount;
        self.position_mut(user).credit_debt(reserve, amount);
    }

    pub fn debit_debt(&mut self, user: Address, reserve: ReserveId, amount: U256) -> U256 {
        let totals = self.totals.entry(reserve).or_default();
        totals.debt = totals.debt.saturating_sub(amount);
        self.position_mut(user).debit_debt(reserve, amount)
    }

    pub fn insert_nft(
        &mut self,
        user: Address,
        reserve: ReserveId,
        token_id: U256,
        use_as_collateral: bool,
    ) {
        self.totals.entry(reserve).or_default().supplied += U256::from(1u8);
        self.nft_owners.insert((reserve, token_id), user);
        self.position_mut(user).insert_nft(reserve, token_id, use_as_collateral);
    }

    /// Remove a token from the pool entirely.
    pub fn remove_nft(&mut self, user: Address, reserve: ReserveId, token_id: U256) -> Option<NftSlot> {
        let slot = self.position_mut(user).remove_nft(reserve, token_id)?;
        self.nft_owners.remove(&(reserve, token_id));
        let totals = self.totals.entry(reserve).or_default();
        totals.supplied = totals.supplied.saturating_sub(U256::from(1u8));
        Some(slot)
    }

    /// Move a token between owners without it leaving the pool (share-token
    /// settlement); supplied totals are unchanged.
    pub fn move_nft(
        &mut self,
        from: Address,
        to: Address,
        reserve: ReserveId,
        token_id: U256,
        use_as_collateral: bool,
    ) -> Option<NftSlot> {
        let slot = self.position_mut(from).remove_nft(reserve, token_id)?;
        self.nft_owners.insert((reserve, token_id), to);
        self.position_mut(to).insert_nft(reserve, token_id, use_as_collateral);
        Some(slot)
    }

    /// Move collateral shares between owners without them leaving the pool;
    /// supplied totals are unchanged. Returns true when the recipient
    /// balance was previously zero.
    pub fn transfer_collateral(
        &mut self,
        from: Address,
        to: Address,
        reserve: ReserveId,
        amount: U256,
    ) -> bool {
        self.position_mut(from).debit_collateral(reserve, amount);
        self.position_mut(to).credit_collateral(reserve, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[test]
    fn borrowing_flag_tracks_debt_balance() {
        let mut ledger = PositionLedger::new();
        let r = ReserveId(0);

        ledger.credit_debt(user(1), r, U256::from(100u64));
        assert!(ledger.get(user(1)).unwrap().config.is_borrowing(r));

        ledger.debit_debt(user(1), r, U256::from(40u64));
        assert!(ledger.get(user(1)).unwrap().config.is_borrowing(r));
        assert_eq!(ledger.get(user(1)).unwrap().debt_of(r), U256::from(60u64));

        ledger.debit_debt(user(1), r, U256::from(60u64));
        assert!(!ledger.get(user(1)).unwrap().config.is_borrowing(r));
    }

    #[test]
    fn collateral_flag_clears_with_balance() {
        let mut ledger = PositionLedger::new();
        let r = ReserveId(1);

        let first = ledger.credit_collateral(user(1), r, U256::from(10u64));
        assert!(first);
        ledger.position_mut(user(1)).config.set_collateral_enabled(r, true);

        ledger.debit_collateral(user(1), r, U256::from(10u64), true);
        assert!(!ledger.get(user(1)).unwrap().config.is_collateral_enabled(r));
        assert_eq!(ledger.totals(r).supplied, U256::ZERO);
    }

    #[test]
    fn nft_reserve_flag_mirrors_flagged_tokens() {
        let mut ledger = PositionLedger::new();
        let r = ReserveId(2);

        ledger.insert_nft(user(1), r, U256::from(1u64), false);
        assert!(!ledger.get(user(1)).unwrap().config.is_collateral_enabled(r));

        ledger.insert_nft(user(1), r, U256::from(2u64), true);
        assert!(ledger.get(user(1)).unwrap().config.is_collateral_enabled(r));
        assert_eq!(ledger.owner_of(r, U256::from(2u64)), Some(user(1)));

        ledger.remove_nft(user(1), r, U256::from(2u64));
        assert!(!ledger.get(user(1)).unwrap().config.is_collateral_enabled(r));
        assert_eq!(ledger.owner_of(r, U256::from(2u64)), None);
        assert_eq!(ledger.totals(r).supplied, U256::from(1u8));
    }

    #[test]
    fn in_pool_moves_keep_totals() {
        let mut ledger = PositionLedger::new();
        let r = ReserveId(2);

        ledger.insert_nft(user(1), r, U256::from(9u64), true);
        assert_eq!(ledger.totals(r).supplied, U256::from(1u8));

        ledger.move_nft(user(1), user(2), r, U256::from(9u64), false);
        assert_eq!(ledger.owner_of(r, U256::from(9u64)), Some(user(2)));
        assert_eq!(ledger.totals(r).supplied, U256::from(1u8));
        assert!(!ledger.get(user(1)).unwrap().owns_nft(r, U256::from(9u64)));

        let rf = ReserveId(3);
        ledger.credit_collateral(user(1), rf, U256::from(100u64));
        ledger.transfer_collateral(user(1), user(2), rf, U256::from(40u64));
        assert_eq!(ledger.totals(rf).supplied, U256::from(100u64));
        assert_eq!(ledger.get(user(2)).unwrap().collateral_of(rf), U256::from(40u64));
    }
}
