//! Leveraged collateral engine simulation.
//!
//! Walks the manager through the position lifecycle: builds queued until the update fold,
//! unwinds that mint or burn against the locked cost, compounding funding on a lopsided book,
//! and a liquidation.
//!
//! Usage: `ovl-sim [settings.toml]`. RUST_LOG overrides the configured log level.

use ovl_collateral::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;

const ADMIN: AccountId = AccountId(1_000);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(3);
const CUSTODY: AccountId = AccountId(0);

struct Sim {
    manager: CollateralManager,
    token: Arc<Token>,
    feed: Arc<PricePointFeed>,
    clock: Arc<ManualClock>,
    market: MarketId,
}

impl Sim {
    fn new(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let token = Arc::new(Token::new("OVL", ADMIN));
        token.grant_role(ADMIN, Role::Minter, ADMIN)?;
        token.grant_role(ADMIN, Role::Minter, CUSTODY)?;
        token.grant_role(ADMIN, Role::Burner, CUSTODY)?;
        for trader in [ALICE, BOB] {
            token.mint(ADMIN, trader, Quote::new(dec!(10_000)))?;
        }

        let custody = Arc::new(TokenCustody::new(token.clone(), CUSTODY));
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(0)));
        let feed = Arc::new(PricePointFeed::new());
        feed.push(price(dec!(2000)));

        let mut manager = CollateralManager::new(settings.manager.clone(), custody, clock.clone())?;

        let (id, name, params) = match settings.markets.first() {
            Some(m) => (MarketId(m.id), m.name.clone(), m.params.clone()),
            None => (MarketId(1), "WETH/DAI".to_string(), MarketParams::weth_dai()),
        };
        manager.add_market(id, name, params, feed.clone())?;

        Ok(Self {
            manager,
            token,
            feed,
            clock,
            market: id,
        })
    }

    // one update period passes and a new price point is published
    fn tick(&self, next_price: Decimal) -> Result<(), ManagerError> {
        let params = self.manager.market_params(self.market)?;
        self.clock.advance_secs(params.update_period_secs);
        self.feed.push(price(next_price));
        self.manager.update(self.market)?;
        Ok(())
    }

    fn print_market(&self) -> Result<(), ManagerError> {
        let snap = self.manager.market_oi(self.market)?;
        println!(
            "  oi long {} (queued {}), oi short {} (queued {})",
            snap.oi_long, snap.queued_oi_long, snap.oi_short, snap.queued_oi_short
        );
        println!(
            "  fees {}, liquidation pot {}, brrrrd {}",
            snap.fee_bucket, snap.liquidation_pot, snap.brrrrd
        );
        Ok(())
    }
}

fn price(value: Decimal) -> Price {
    Price::new_unchecked(value)
}

fn main() -> Result<(), Box<dyn Error>> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.logging.init();

    println!("Leveraged Collateral Engine Simulation\n");

    scenario_1_build_and_settle(&settings)?;
    scenario_2_profit_and_loss(&settings)?;
    scenario_3_funding(&settings)?;
    scenario_4_liquidation(&settings)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Builds wait in the queued bucket until the update fold.
fn scenario_1_build_and_settle(settings: &Settings) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Build and Settle\n");
    let sim = Sim::new(settings)?;

    let long = sim.manager.build(sim.market, ALICE, Quote::new(dec!(100)), 5, Side::Long)?;
    let short = sim.manager.build(sim.market, BOB, Quote::new(dec!(100)), 3, Side::Short)?;
    println!(
        "  Alice builds 5x long: fee {}, notional {}, debt {}",
        long.fee, long.oi_adjusted, long.debt
    );
    println!(
        "  Bob builds 3x short: fee {}, notional {}, debt {}",
        short.fee, short.oi_adjusted, short.debt
    );
    sim.print_market()?;

    sim.tick(dec!(2000))?;
    println!("\n  After one update period:");
    sim.print_market()?;
    if let Some(position) = sim.manager.position_info(long.position_id) {
        println!("  Alice's position queued: {}, shares {}\n", position.queued, position.oi_shares);
    }
    Ok(())
}

/// Unwinds mint the payout above cost and burn the shortfall below it.
fn scenario_2_profit_and_loss(settings: &Settings) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Profit and Loss\n");
    let sim = Sim::new(settings)?;

    let long = sim.manager.build(sim.market, ALICE, Quote::new(dec!(100)), 2, Side::Long)?;
    let short = sim.manager.build(sim.market, BOB, Quote::new(dec!(100)), 2, Side::Short)?;
    sim.tick(dec!(2000))?;
    sim.tick(dec!(2200))?;
    println!("  Price moves 2000 -> 2200");

    let supply = sim.token.total_supply();
    let alice = sim.manager.unwind(ALICE, long.position_id, sim.manager.shares_of(ALICE, long.position_id))?;
    let bob = sim.manager.unwind(BOB, short.position_id, sim.manager.shares_of(BOB, short.position_id))?;

    println!("  Alice unwinds: payout {} on cost {} (minted {})", alice.payout, alice.cost, alice.minted);
    println!("  Bob unwinds: payout {} on cost {} (burned {})", bob.payout, bob.cost, bob.burned);
    println!(
        "  Supply {} -> {}, brrrrd {}\n",
        supply,
        sim.token.total_supply(),
        sim.manager.funding_accumulator()
    );
    Ok(())
}

/// A lopsided book pays funding from the heavy side to the light side every compounding period.
fn scenario_3_funding(settings: &Settings) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Compounding Funding\n");
    let sim = Sim::new(settings)?;

    sim.manager.build(sim.market, ALICE, Quote::new(dec!(1000)), 10, Side::Long)?;
    sim.manager.build(sim.market, BOB, Quote::new(dec!(100)), 10, Side::Short)?;

    let params = sim.manager.market_params(sim.market)?;
    let periods = params.compounding_period_secs / params.update_period_secs * 24;
    for _ in 0..periods {
        sim.tick(dec!(2000))?;
    }

    let paid: Decimal = sim
        .manager
        .events()
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Compound(c) => Some(c.paid),
            _ => None,
        })
        .sum();
    println!("  {} update periods, longs paid {} to shorts", periods, paid);
    sim.print_market()?;
    println!();
    Ok(())
}

/// A position below maintenance margin gets liquidated by a keeper.
fn scenario_4_liquidation(settings: &Settings) -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Liquidation\n");
    let sim = Sim::new(settings)?;

    let built = sim.manager.build(sim.market, ALICE, Quote::new(dec!(100)), 20, Side::Long)?;
    sim.tick(dec!(2000))?;

    let mut next = dec!(2000);
    while !sim.manager.is_liquidatable(built.position_id)? {
        next *= dec!(0.99);
        sim.tick(next.round_dp(2))?;
    }
    println!("  Price fell to {}", next.round_dp(2));

    let result = sim.manager.liquidate(built.position_id, KEEPER)?;
    println!(
        "  Keeper liquidates: value {} under threshold {}, reward {}, pot {}",
        result.value, result.threshold, result.reward, result.pot
    );
    sim.print_market()?;
    Ok(())
}
