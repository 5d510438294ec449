use sentra_core::error::SentraError;
use sentra_core::types::Timestamp;

/// One price observation as reported by a feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundData {
    /// Signed integer in the feed's native decimals; non-positive answers
    /// are invalid.
    pub answer: i128,
    pub updated_at: Timestamp,
}

/// The minimal feed capability set. No inheritance hierarchy — an
/// aggregator client and a constant feed both fit behind these two methods.
pub trait PriceFeed: Send + Sync {
    fn latest_round_data(&self) -> Result<RoundData, SentraError>;
    fn decimals(&self) -> u8;
}

/// A feed that always answers the same price. Used for stable-pegged tokens
/// and as the mock in tests.
pub struct ConstantFeed {
    answer: i128,
    decimals: u8,
    updated_at: Timestamp,
}

impl ConstantFeed {
    pub fn new(answer: i128, decimals: u8, updated_at: Timestamp) -> Self {
        Self { answer, decimals, updated_at }
    }
}

impl PriceFeed for ConstantFeed {
    fn latest_round_data(&self) -> Result<RoundData, SentraError> {
        Ok(RoundData { answer: self.answer, updated_at: self.updated_at })
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}
