// Price Feed Integration
//
// The engine only needs two things from an oracle: the index the next price point will get,
// and the point published at a given index. Any source that can answer those implements
// PriceFeed. PricePointFeed is the in-memory series used by the simulation and tests.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::fmt::Debug;

use crate::types::{floor_wei, Price};

pub trait PriceFeed: Send + Sync + Debug {
    /// Index the next published price point will get.
    fn current_index(&self) -> u64;

    /// Point published at `index`, None if not yet published.
    fn price_at(&self, index: u64) -> Option<Price>;
}

/// Append-only series of price points, one per update period.
#[derive(Debug, Default)]
pub struct PricePointFeed {
    points: RwLock<Vec<Price>>,
}

impl PricePointFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: impl IntoIterator<Item = Price>) -> Self {
        Self {
            points: RwLock::new(points.into_iter().collect()),
        }
    }

    /// Publish the next point. returns the index it was stored at.
    pub fn push(&self, price: Price) -> u64 {
        let mut points = self.points.write();
        points.push(price);
        (points.len() - 1) as u64
    }

    pub fn latest(&self) -> Option<Price> {
        self.points.read().last().copied()
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }
}

impl PriceFeed for PricePointFeed {
    fn current_index(&self) -> u64 {
        self.points.read().len() as u64
    }

    fn price_at(&self, index: u64) -> Option<Price> {
        self.points.read().get(index as usize).copied()
    }
}

/// Exit price over entry price, capped.
///
/// The entry point is the first one published after the build. Until it exists the
/// position has not been exposed to any move and the frame is exactly one. Returns
/// None when the entry point exists but no exit point does, which cannot happen for a
/// well-formed feed.
pub fn price_frame(feed: &dyn PriceFeed, entry_index: u64, cap: Decimal) -> Option<Decimal> {
    let current = feed.current_index();
    if entry_index >= current {
        return Some(Decimal::ONE);
    }

    let entry = feed.price_at(entry_index)?;
    let exit = feed.price_at(current - 1)?;
    let ratio = floor_wei(exit.value() / entry.value());
    Some(ratio.min(cap))
}
