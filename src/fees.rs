//! Platform fee calculation
//!
//! All amounts use 3-decimal precision (the ledger's minimal unit).
//! Fee rates are context-specific constants: 2.5% on peer transfers,
//! 10% on creator rewards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::AMOUNT_DECIMALS;

/// Fee rate for peer-to-peer internal transfers (2.5%)
pub const PEER_TRANSFER_RATE: Decimal = Decimal::from_parts(25, 0, 0, false, 3);

/// Fee rate for creator reward payouts (10%)
pub const REWARD_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Fee/net split of a gross amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub fee: Decimal,
    pub net_amount: Decimal,
}

/// Context-specific fee schedule.
///
/// Precondition: amounts passed to [`FeeSchedule::calculate`] are
/// positive; the caller validates, this type does not re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rate: Decimal,
}

impl FeeSchedule {
    pub const fn peer_transfer() -> Self {
        Self {
            rate: PEER_TRANSFER_RATE,
        }
    }

    pub const fn reward() -> Self {
        Self { rate: REWARD_RATE }
    }

    /// Split `amount` into platform fee and net amount.
    ///
    /// `fee = round(amount * rate, 3 dp)`, `net = amount - fee`, so
    /// `fee + net == amount` holds exactly. Pure and deterministic.
    pub fn calculate(&self, amount: Decimal) -> FeeBreakdown {
        let fee = (amount * self.rate).round_dp(AMOUNT_DECIMALS);
        FeeBreakdown {
            fee,
            net_amount: amount - fee,
        }
    }
}
