use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use sentra_core::error::SentraError;
use sentra_core::types::{Address, Timestamp, U256, U512};

use crate::feed::PriceFeed;

/// Resolves token prices through registered feeds, normalizing every answer
/// to 18-decimal fixed point USD.
pub struct PriceOracle {
    feeds: HashMap<Address, Arc<dyn PriceFeed>>,
    max_age: i64,
}

impl PriceOracle {
    pub fn new(max_age: i64) -> Self {
        Self { feeds: HashMap::new(), max_age }
    }

    pub fn set_feed(&mut self, token: Address, feed: Arc<dyn PriceFeed>) {
        self.feeds.insert(token, feed);
    }

    /// Token price in 18-dec USD: `answer × 10^(18 − feed_decimals)`.
    pub fn price_18(&self, token: &Address, now: Timestamp) -> Result<U256, SentraError> {
        let feed = self
            .feeds
            .get(token)
            .ok_or_else(|| SentraError::NoPriceFeedSet(token.to_hex()))?;
        let round = feed.latest_round_data()?;
        if round.answer <= 0 {
            return Err(SentraError::InvalidPrice { token: token.to_hex() });
        }
        if now - round.updated_at > self.max_age {
            return Err(SentraError::StalePriceFeed {
                token: token.to_hex(),
                updated_at: round.updated_at,
            });
        }
        let decimals = feed.decimals();
        let answer = U256::from(round.answer as u128);
        let price = if decimals <= 18 {
            answer * U256::from(10u64).pow(U256::from(18 - decimals as u32))
        } else {
            answer / U256::from(10u64).pow(U256::from(decimals as u32 - 18))
        };
        Ok(price)
    }

    /// Snapshot prices for a token set at the start of a cycle. Tokens
    /// without a usable price are simply absent — the rebuilder falls back
    /// to amount-weighted ratios when any input price is missing.
    pub fn snapshot(&self, tokens: &[Address], now: Timestamp) -> PriceCache {
        let mut prices = HashMap::new();
        for token in tokens {
            match self.price_18(token, now) {
                Ok(p) => {
                    prices.insert(*token, p);
                }
                Err(e) => debug!(token = %token, error = %e, "price unavailable for cycle"),
            }
        }
        PriceCache { prices }
    }
}

/// USD value of a native-decimals token amount at an 18-dec price:
/// `amount × price_18 / 10^token_decimals`, through a 512-bit intermediate
/// so the product cannot overflow.
pub fn token_value_usd(amount: U256, token_decimals: u8, price_18: U256) -> U256 {
    let prod: U512 = amount.full_mul(price_18);
    let scaled = prod / U512::from(10u64).pow(U512::from(token_decimals as u32));
    // The quotient fits: price and amount are both far below 2^224.
    U256::try_from(scaled).unwrap_or(U256::MAX)
}

// ── PriceCache ───────────────────────────────────────────────────────────────

/// Immutable per-cycle price snapshot consumed by the rebuilder.
#[derive(Clone, Debug, Default)]
pub struct PriceCache {
    prices: HashMap<Address, U256>,
}

impl PriceCache {
    pub fn from_prices(prices: HashMap<Address, U256>) -> Self {
        Self { prices }
    }

    pub fn get(&self, token: &Address) -> Option<U256> {
        self.prices.get(token).copied()
    }

    pub fn has_all_prices(&self, tokens: &[Address]) -> bool {
        tokens.iter().all(|t| self.prices.contains_key(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ConstantFeed;

    const NOW: i64 = 1_000_000;

    fn token(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn normalizes_eight_decimal_feed_to_eighteen() {
        let mut oracle = PriceOracle::new(86_400);
        // 2500.00000000 USD with 8 feed decimals.
        oracle.set_feed(token(1), Arc::new(ConstantFeed::new(250_000_000_000, 8, NOW)));
        let p = oracle.price_18(&token(1), NOW).unwrap();
        assert_eq!(p, U256::from(2_500u64) * U256::from(10u64).pow(U256::from(18u32)));
    }

    #[test]
    fn downscales_feeds_above_eighteen_decimals() {
        let mut oracle = PriceOracle::new(86_400);
        // 1 USD at 20 feed decimals.
        oracle.set_feed(token(1), Arc::new(ConstantFeed::new(100_000_000_000_000_000_000, 20, NOW)));
        let p = oracle.price_18(&token(1), NOW).unwrap();
        assert_eq!(p, U256::from(10u64).pow(U256::from(18u32)));
    }

    #[test]
    fn missing_stale_and_invalid_feeds_error() {
        let mut oracle = PriceOracle::new(3_600);
        assert!(matches!(
            oracle.price_18(&token(1), NOW).unwrap_err(),
            SentraError::NoPriceFeedSet(_)
        ));

        oracle.set_feed(token(2), Arc::new(ConstantFeed::new(100, 8, NOW - 3_601)));
        assert!(matches!(
            oracle.price_18(&token(2), NOW).unwrap_err(),
            SentraError::StalePriceFeed { .. }
        ));

        oracle.set_feed(token(3), Arc::new(ConstantFeed::new(0, 8, NOW)));
        assert!(matches!(
            oracle.price_18(&token(3), NOW).unwrap_err(),
            SentraError::InvalidPrice { .. }
        ));
    }

    #[test]
    fn token_value_scales_by_native_decimals() {
        // 1.5 tokens at 6 decimals, price 2 USD → 3 USD.
        let amount = U256::from(1_500_000u64);
        let price = U256::from(2u64) * U256::from(10u64).pow(U256::from(18u32));
        let v = token_value_usd(amount, 6, price);
        assert_eq!(v, U256::from(3u64) * U256::from(10u64).pow(U256::from(18u32)));
    }

    #[test]
    fn snapshot_skips_unpriced_tokens() {
        let mut oracle = PriceOracle::new(3_600);
        oracle.set_feed(token(1), Arc::new(ConstantFeed::new(100_000_000, 8, NOW)));
        let cache = oracle.snapshot(&[token(1), token(2)], NOW);
        assert!(cache.get(&token(1)).is_some());
        assert!(cache.get(&token(2)).is_none());
        assert!(cache.has_all_prices(&[token(1)]));
        assert!(!cache.has_all_prices(&[token(1), token(2)]));
    }
}
