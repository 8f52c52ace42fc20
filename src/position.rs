// 4.0: position records and share balances. a position is a claim of `oi_shares` on one side
// of one market's open interest, plus the debt and cost locked when it was built.
// 4.1 valuation, 4.2 registry, 4.3 queued share conversion at the bottom.

use crate::open_interest::Bucket;
use crate::types::{floor_wei, AccountId, Leverage, MarketId, PositionId, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub side: Side,
    pub leverage: Leverage,
    /// Price point the position entered at. the first point published after the build.
    pub entry_price_index: u64,
    pub oi_shares: Decimal,
    pub debt: Quote,
    pub cost: Quote,
    /// Shares still live in the queued bucket, one share per unit of notional.
    pub queued: bool,
    pub opened_at: Timestamp,
}

impl Position {
    pub fn new(
        market_id: MarketId,
        side: Side,
        leverage: Leverage,
        entry_price_index: u64,
        notional: Decimal,
        cost: Quote,
        opened_at: Timestamp,
    ) -> Self {
        let debt = Quote::new((notional - cost.value()).max(Decimal::ZERO));
        Self {
            market_id,
            side,
            leverage,
            entry_price_index,
            oi_shares: notional,
            debt,
            cost,
            queued: true,
            opened_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.oi_shares.is_zero()
    }

    pub fn bucket(&self) -> Bucket {
        if self.queued {
            Bucket::Queued
        } else {
            Bucket::Settled
        }
    }

    /// Notional at build time, still outstanding.
    pub fn original_oi(&self) -> Quote {
        self.cost.add(self.debt)
    }

    /// Debt and cost attributable to `shares`. a full close takes everything so no dust is left.
    pub fn portions(&self, shares: Decimal) -> (Quote, Quote) {
        if shares >= self.oi_shares || self.oi_shares.is_zero() {
            return (self.debt, self.cost);
        }
        let debt = floor_wei(self.debt.value() * shares / self.oi_shares);
        let cost = floor_wei(self.cost.value() * shares / self.oi_shares);
        (Quote::new(debt), Quote::new(cost))
    }
}

// 4.1: what closing `shares` is worth right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub shares: Decimal,
    /// Notional the shares claim from their bucket.
    pub notional: Decimal,
    pub debt: Quote,
    pub cost: Quote,
    pub frame: Decimal,
    pub value: Quote,
}

impl Valuation {
    /// Positive when the payout exceeds the locked cost and must be minted.
    pub fn delta(&self) -> Decimal {
        self.value.value() - self.cost.value()
    }
}

// long:  notional * frame - debt
// short: 2 * notional - (debt + notional * frame)
// both floor at zero, the trader can never owe more than they locked.
pub fn value_position(position: &Position, shares: Decimal, notional: Decimal, frame: Decimal) -> Valuation {
    let (debt, cost) = position.portions(shares);
    let moved = floor_wei(notional * frame);

    let value = match position.side {
        Side::Long => (moved - moved.min(debt.value())).max(Decimal::ZERO),
        Side::Short => {
            let gross = notional * Decimal::TWO;
            gross - gross.min(debt.value() + moved)
        }
    };

    Valuation {
        shares,
        notional,
        debt,
        cost,
        frame,
        value: Quote::new(value),
    }
}

// 4.2: positions by id, share balances by id then owner. the manager keeps them consistent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionRegistry {
    positions: BTreeMap<PositionId, Position>,
    balances: HashMap<PositionId, BTreeMap<AccountId, Decimal>>,
    next_id: u64,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
            balances: HashMap::new(),
            next_id: 1,
        }
    }

    /// Stores the position and credits all of its shares to `owner`.
    pub fn open(&mut self, position: Position, owner: AccountId) -> PositionId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = PositionId(self.next_id);
        self.next_id += 1;

        self.balances
            .entry(id)
            .or_default()
            .insert(owner, position.oi_shares);
        self.positions.insert(id, position);
        id
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PositionId, &Position)> {
        self.positions.iter()
    }

    pub fn balance_of(&self, owner: AccountId, id: PositionId) -> Decimal {
        self.balances
            .get(&id)
            .and_then(|holders| holders.get(&owner))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn holders(&self, id: PositionId) -> Vec<(AccountId, Decimal)> {
        self.balances
            .get(&id)
            .map(|holders| holders.iter().map(|(a, s)| (*a, *s)).collect())
            .unwrap_or_default()
    }

    /// Burns `shares` from the position and from `owner`, releasing the matching debt and cost.
    /// caller has already checked both hold enough.
    pub fn reduce(&mut self, id: PositionId, owner: AccountId, shares: Decimal, debt: Quote, cost: Quote) {
        if let Some(position) = self.positions.get_mut(&id) {
            position.oi_shares = (position.oi_shares - shares).max(Decimal::ZERO);
            position.debt = position.debt.saturating_sub(debt);
            position.cost = position.cost.saturating_sub(cost);
            if position.oi_shares.is_zero() {
                position.debt = Quote::zero();
                position.cost = Quote::zero();
            }
        }

        if let Some(holders) = self.balances.get_mut(&id) {
            if let Some(balance) = holders.get_mut(&owner) {
                *balance = (*balance - shares).max(Decimal::ZERO);
                if balance.is_zero() {
                    holders.remove(&owner);
                }
            }
        }
    }

    /// Zeroes the position and every holder's balance. returns the holders it wiped.
    pub fn close(&mut self, id: PositionId) -> Vec<(AccountId, Decimal)> {
        if let Some(position) = self.positions.get_mut(&id) {
            position.oi_shares = Decimal::ZERO;
            position.debt = Quote::zero();
            position.cost = Quote::zero();
        }
        self.balances
            .remove(&id)
            .map(|holders| holders.into_iter().collect())
            .unwrap_or_default()
    }

    // 4.3: the queued bucket of one side became `minted` settled shares. every listed position
    // still queued gets its pro-rata slice, the last one takes what truncation left over.
    // returns the number of positions converted.
    pub fn convert_queued(&mut self, ids: &[PositionId], minted: Decimal) -> usize {
        let live: Vec<PositionId> = ids
            .iter()
            .copied()
            .filter(|id| {
                self.positions
                    .get(id)
                    .is_some_and(|p| p.queued && !p.is_terminal())
            })
            .collect();

        let queued_total: Decimal = live
            .iter()
            .filter_map(|id| self.positions.get(id))
            .map(|p| p.oi_shares)
            .sum();

        if queued_total.is_zero() {
            for id in ids {
                if let Some(position) = self.positions.get_mut(id) {
                    position.queued = false;
                }
            }
            return 0;
        }

        let mut assigned = Decimal::ZERO;
        for (i, id) in live.iter().enumerate() {
            let Some(position) = self.positions.get_mut(id) else {
                continue;
            };
            let old_shares = position.oi_shares;
            let new_shares = if i + 1 == live.len() {
                minted - assigned
            } else {
                floor_wei(old_shares * minted / queued_total)
            };
            assigned += new_shares;
            position.oi_shares = new_shares;
            position.queued = false;

            if let Some(holders) = self.balances.get_mut(id) {
                rescale_holders(holders, old_shares, new_shares);
            }
        }

        for id in ids {
            if let Some(position) = self.positions.get_mut(id) {
                position.queued = false;
            }
        }

        live.len()
    }
}

fn rescale_holders(holders: &mut BTreeMap<AccountId, Decimal>, old_total: Decimal, new_total: Decimal) {
    if old_total.is_zero() {
        return;
    }
    let count = holders.len();
    let mut assigned = Decimal::ZERO;
    for (i, balance) in holders.values_mut().enumerate() {
        let scaled = if i + 1 == count {
            new_total - assigned
        } else {
            floor_wei(*balance * new_total / old_total)
        };
        assigned += scaled;
        *balance = scaled;
    }
}
