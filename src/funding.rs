// 5.0: funding. every compounding period the heavier side of the book pays the lighter side,
// shrinking the imbalance by (1 - 2k) per period. with nobody on the other side the payment burns.
// 5.3 is the brrrrd accumulator: net mint/burn from settling payouts against locked cost.

use crate::types::{floor_wei, Quote, Side};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingOutcome {
    pub epochs: u64,
    pub factor: Decimal,
    pub oi_long: Decimal,
    pub oi_short: Decimal,
    /// Side that paid funding, None when the book was balanced or empty.
    pub payer: Option<Side>,
    /// Value moved from the payer to the other side.
    pub paid: Decimal,
    /// Value destroyed because the other side was empty.
    pub burned: Decimal,
}

// 5.1: (1 - 2k)^epochs
pub fn funding_factor(k: Decimal, epochs: u64) -> Decimal {
    let base = Decimal::ONE - dec!(2) * k;
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    base.checked_powu(epochs).unwrap_or(Decimal::ZERO)
}

// 5.2: applies `epochs` compounding periods of funding to the settled totals.
pub fn compute_funding(oi_long: Decimal, oi_short: Decimal, k: Decimal, epochs: u64) -> FundingOutcome {
    let factor = funding_factor(k, epochs);
    let unchanged = FundingOutcome {
        epochs,
        factor,
        oi_long,
        oi_short,
        payer: None,
        paid: Decimal::ZERO,
        burned: Decimal::ZERO,
    };

    if epochs == 0 || oi_long == oi_short {
        return unchanged;
    }

    let payer = if oi_long > oi_short { Side::Long } else { Side::Short };
    let (heavy, light) = match payer {
        Side::Long => (oi_long, oi_short),
        Side::Short => (oi_short, oi_long),
    };

    let (new_heavy, new_light, paid, burned) = if light.is_zero() {
        let remaining = floor_wei(heavy * factor);
        (remaining, light, Decimal::ZERO, heavy - remaining)
    } else {
        let imbalance = heavy - light;
        let new_imbalance = floor_wei(imbalance * factor);
        let paid = floor_wei((imbalance - new_imbalance) / dec!(2));
        (heavy - paid, light + paid, paid, Decimal::ZERO)
    };

    let (oi_long, oi_short) = match payer {
        Side::Long => (new_heavy, new_light),
        Side::Short => (new_light, new_heavy),
    };

    FundingOutcome {
        epochs,
        factor,
        oi_long,
        oi_short,
        payer: Some(payer),
        paid,
        burned,
    }
}

// 5.3: brrrrd. positive = net mint, negative = net burn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingAccumulator {
    pub brrrrd: Decimal,
    pub total_minted: Quote,
    pub total_burned: Quote,
}

impl FundingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Decimal {
        self.brrrrd
    }

    pub fn record_mint(&mut self, amount: Quote) {
        self.brrrrd += amount.value();
        self.total_minted = self.total_minted.add(amount);
    }

    pub fn record_burn(&mut self, amount: Quote) {
        self.brrrrd -= amount.value();
        self.total_burned = self.total_burned.add(amount);
    }
}
