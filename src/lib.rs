// ovl-collateral: leveraged collateral engine.
// positions are share claims on each market side's open interest; funding moves value between
// sides by repricing shares instead of touching positions.
// all computation is deterministic. time comes from a Clock, balances from a BalanceLedger.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, PositionId, Side, Price, Quote, Leverage
//   2.x  clock.rs: system and manual clocks
//   3.x  open_interest.rs: per side oi / shares / queued, fold-if-due
//   4.x  position.rs: position record, valuation, registry, queued conversion
//   5.x  funding.rs: compounding funding, brrrrd accumulator
//   6.x  token.rs: role-gated balance token
//   6.1  custody.rs: BalanceLedger trait + token adapter
//   6.2  liquidation.rs: maintenance threshold, reward/pot split
//   7.x  config.rs: market params, logging, toml settings
//   8.x  engine/: collateral manager: build, unwind, liquidate, settlement
//   9.x  price_feed.rs: price points and the price frame
//   11.x events.rs: state transition events for audit
//   12.x market.rs: per-market state behind the market lock

// core accounting modules
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod market;
pub mod open_interest;
pub mod position;
pub mod types;

// integration modules
pub mod clock;
pub mod config;
pub mod custody;
pub mod price_feed;
pub mod token;

// re exports for convenience
pub use clock::*;
pub use custody::*;
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use market::*;
pub use open_interest::*;
pub use position::*;
pub use price_feed::*;
pub use token::*;
pub use types::*;
pub use config::{ConfigError, LoggingConfig, MarketParams, MarketSettings, Settings};
