//! EIP-1559 fee pricing per submission round.

use std::time::Duration;

use serde::Serialize;

use crate::{LedgerClient, LedgerError, client::with_timeout};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Fee parameters derived from one base fee observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    /// Base fee the quote was derived from.
    pub base_fee: u128,
    /// `max_fee_per_gas`: the buffered base fee plus the tip.
    pub max_fee_per_gas: u128,
    /// `max_priority_fee_per_gas`: the tip.
    pub max_priority_fee_per_gas: u128,
}

impl FeeQuote {
    /// Numerator of the base fee buffer (1.5x).
    pub const BUFFER_NUMERATOR: u128 = 15;
    /// Denominator of the base fee buffer.
    pub const BUFFER_DENOMINATOR: u128 = 10;

    /// Prices a round from the observed `base_fee` and a tip, both in wei.
    ///
    /// The buffered base fee rounds up so the cap never drops below `1.5 * base_fee + tip`.
    pub const fn from_base_fee(base_fee: u128, tip_wei: u128) -> Self {
        let buffered =
            base_fee.saturating_mul(Self::BUFFER_NUMERATOR).div_ceil(Self::BUFFER_DENOMINATOR);
        Self {
            base_fee,
            max_fee_per_gas: buffered.saturating_add(tip_wei),
            max_priority_fee_per_gas: tip_wei,
        }
    }
}

/// Derives a [`FeeQuote`] from the latest block.
#[derive(Clone, Copy, Debug)]
pub struct FeeOracle {
    tip_wei: u128,
    request_timeout: Duration,
}

impl FeeOracle {
    /// Creates an oracle adding `tip_gwei` on top of the buffered base fee.
    pub const fn new(tip_gwei: u64, request_timeout: Duration) -> Self {
        Self { tip_wei: tip_gwei as u128 * WEI_PER_GWEI, request_timeout }
    }

    /// Fetches the latest base fee and prices a round.
    ///
    /// Failures are returned as-is; the caller decides whether to skip the round.
    pub async fn quote<C: LedgerClient + ?Sized>(
        &self,
        client: &C,
    ) -> Result<FeeQuote, LedgerError> {
        let base_fee = with_timeout(self.request_timeout, client.latest_base_fee()).await?;
        Ok(FeeQuote::from_base_fee(base_fee, self.tip_wei))
    }
}
