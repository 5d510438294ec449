//! sentra-oracle
//!
//! Token → USD price resolution, normalized to 18-decimal fixed point.
//! Feeds are polymorphic over `{latest_round_data, decimals}` so on-chain
//! aggregators and constant feeds plug in behind the same two methods.

pub mod feed;
pub mod view;

pub use feed::{ConstantFeed, PriceFeed, RoundData};
pub use view::{token_value_usd, PriceCache, PriceOracle};
