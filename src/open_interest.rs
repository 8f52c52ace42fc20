// 3.0: open interest ledger. per side: settled notional (oi), settled shares, and notional
// queued during the current update window. shares are vault-style claims on a side's pool so
// funding can move value between sides without touching every position.
// 3.1 is the share math, 3.2 the ledger, 3.3 the fold-if-due step.

use crate::funding::{compute_funding, FundingOutcome};
use crate::types::{floor_wei, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// 3.1: notional represented by `shares` out of `total_shares`. multiply first, divide last.
pub fn shares_to_notional(shares: Decimal, total_shares: Decimal, total_notional: Decimal) -> Decimal {
    if total_shares.is_zero() {
        return Decimal::ZERO;
    }
    floor_wei(shares * total_notional / total_shares)
}

// empty pool (or a pool drained to zero notional) prices shares one-for-one
pub fn notional_to_shares(notional: Decimal, total_shares: Decimal, total_notional: Decimal) -> Decimal {
    if total_shares.is_zero() || total_notional.is_zero() {
        return notional;
    }
    floor_wei(notional * total_shares / total_notional)
}

/// Where a position's shares currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Queued,
    Settled,
}

// 3.2: one side of one market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideLedger {
    pub oi: Decimal,
    pub oi_shares: Decimal,
    pub queued_oi: Decimal,
    /// Lifetime funding paid out of this side.
    pub funding_paid: Decimal,
    /// Lifetime funding received by this side.
    pub funding_received: Decimal,
    /// Lifetime funding burned from this side while the other side was empty.
    pub funding_burned: Decimal,
}

impl SideLedger {
    /// Settled plus queued notional, the figure the OI cap applies to.
    pub fn exposure(&self) -> Decimal {
        self.oi + self.queued_oi
    }

    pub fn share_price(&self) -> Option<Decimal> {
        if self.oi_shares.is_zero() {
            None
        } else {
            Some(self.oi / self.oi_shares)
        }
    }

    /// Notional a claim of `shares` represents in `bucket`. queued notional is claimed one-for-one.
    pub fn claim(&self, bucket: Bucket, shares: Decimal) -> Decimal {
        match bucket {
            Bucket::Queued => shares.min(self.queued_oi),
            Bucket::Settled => shares_to_notional(shares, self.oi_shares, self.oi),
        }
    }

    fn remove(&mut self, bucket: Bucket, notional: Decimal, shares: Decimal) {
        match bucket {
            Bucket::Queued => {
                self.queued_oi = (self.queued_oi - notional).max(Decimal::ZERO);
            }
            Bucket::Settled => {
                self.oi_shares = (self.oi_shares - shares).max(Decimal::ZERO);
                self.oi = if self.oi_shares.is_zero() {
                    Decimal::ZERO
                } else {
                    (self.oi - notional).max(Decimal::ZERO)
                };
            }
        }
    }

    fn fold_queued(&mut self) -> Option<QueuedFold> {
        if self.queued_oi.is_zero() {
            return None;
        }
        let notional = self.queued_oi;
        let shares_minted = notional_to_shares(notional, self.oi_shares, self.oi);
        self.oi += notional;
        self.oi_shares += shares_minted;
        self.queued_oi = Decimal::ZERO;
        Some(QueuedFold {
            notional,
            shares_minted,
        })
    }
}

/// Queued notional folded into the settled bucket for one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueuedFold {
    pub notional: Decimal,
    pub shares_minted: Decimal,
}

/// What a fold-if-due step did. empty when no window had elapsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub compounding: Option<FundingOutcome>,
    pub long: Option<QueuedFold>,
    pub short: Option<QueuedFold>,
    pub update_windows: u64,
}

impl FoldReport {
    pub fn is_empty(&self) -> bool {
        self.compounding.is_none() && self.update_windows == 0
    }

    pub fn folded(&self, side: Side) -> Option<QueuedFold> {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInterestLedger {
    pub long: SideLedger,
    pub short: SideLedger,
    pub last_update_fold: Timestamp,
    pub last_compound_fold: Timestamp,
    update_period_ms: i64,
    compounding_period_ms: i64,
    k: Decimal,
}

impl OpenInterestLedger {
    pub fn new(update_period_ms: i64, compounding_period_ms: i64, k: Decimal, now: Timestamp) -> Self {
        debug_assert!(update_period_ms > 0 && compounding_period_ms > 0);
        Self {
            long: SideLedger::default(),
            short: SideLedger::default(),
            last_update_fold: now,
            last_compound_fold: now,
            update_period_ms,
            compounding_period_ms,
            k,
        }
    }

    pub fn side(&self, side: Side) -> &SideLedger {
        match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideLedger {
        match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        }
    }

    pub fn queue(&mut self, side: Side, notional: Decimal) {
        self.side_mut(side).queued_oi += notional;
    }

    pub fn claim(&self, side: Side, bucket: Bucket, shares: Decimal) -> Decimal {
        self.side(side).claim(bucket, shares)
    }

    /// Burn a closed claim. `notional` must be what `claim` returned for `shares`.
    pub fn remove(&mut self, side: Side, bucket: Bucket, notional: Decimal, shares: Decimal) {
        self.side_mut(side).remove(bucket, notional, shares);
    }

    pub fn update_due(&self, now: Timestamp) -> bool {
        now.as_millis() - self.last_update_fold.as_millis() >= self.update_period_ms
    }

    pub fn compounding_due(&self, now: Timestamp) -> bool {
        now.as_millis() - self.last_compound_fold.as_millis() >= self.compounding_period_ms
    }

    // 3.3: idempotent. funding over the elapsed compounding windows applies to settled oi first,
    // then queued notional joins at the post-funding share price.
    pub fn fold_if_due(&mut self, now: Timestamp) -> FoldReport {
        let mut report = FoldReport::default();

        if self.compounding_due(now) {
            let elapsed = now.as_millis() - self.last_compound_fold.as_millis();
            let epochs = elapsed / self.compounding_period_ms;
            self.last_compound_fold = self
                .last_compound_fold
                .plus_millis(epochs * self.compounding_period_ms);

            let outcome = compute_funding(self.long.oi, self.short.oi, self.k, epochs as u64);
            self.apply_funding(&outcome);
            report.compounding = Some(outcome);
        }

        if self.update_due(now) {
            let elapsed = now.as_millis() - self.last_update_fold.as_millis();
            let windows = elapsed / self.update_period_ms;
            self.last_update_fold = self
                .last_update_fold
                .plus_millis(windows * self.update_period_ms);

            report.update_windows = windows as u64;
            report.long = self.long.fold_queued();
            report.short = self.short.fold_queued();
        }

        report
    }

    fn apply_funding(&mut self, outcome: &FundingOutcome) {
        self.long.oi = outcome.oi_long;
        self.short.oi = outcome.oi_short;

        if let Some(payer) = outcome.payer {
            let paying = self.side_mut(payer);
            paying.funding_paid += outcome.paid;
            paying.funding_burned += outcome.burned;
            self.side_mut(payer.opposite()).funding_received += outcome.paid;
        }
    }
}
