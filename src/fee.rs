use std::fmt;
use bitcoin::Amount;

use crate::error::AppError;

/// 想定するトランザクションサイズ (vB)。実際のシリアライズサイズは計測しない。
pub const DEFAULT_ASSUMED_VSIZE: u64 = 190;

const MAX_ASSUMED_VSIZE: u64 = 100_000;

/// 手数料率の段階 (sat/vB)。設定ではなく慣例で固定されている。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeeTier {
    /// 親トランザクション用の最低手数料率
    Low,
    /// 子トランザクション用の標準手数料率
    Standard,
    /// 置換トランザクション用。最小リレー手数料と置換時の引き上げ条件を上回る前提。
    High,
}

impl FeeTier {
    pub fn sat_per_vb(self) -> u64 {
        match self {
            FeeTier::Low => 1,
            FeeTier::Standard => 20,
            FeeTier::High => 50,
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.sat_per_vb())
    }
}

/// `rate × size` の手数料 (satoshi)。
pub fn fee(rate_sat_per_vb: u64, size_vb: u64) -> Amount {
    Amount::from_sat(rate_sat_per_vb.saturating_mul(size_vb))
}

/// 固定サイズに段階ごとの手数料率を掛ける、非適応型の手数料見積もり。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    assumed_vsize: u64,
}

impl FeeSchedule {
    pub fn new(assumed_vsize: u64) -> Result<Self, AppError> {
        if assumed_vsize == 0 || assumed_vsize > MAX_ASSUMED_VSIZE {
            return Err(AppError::InputValidation(format!(
                "想定vsizeは 1..={} の範囲で指定してください: {}",
                MAX_ASSUMED_VSIZE, assumed_vsize
            )));
        }
        Ok(FeeSchedule { assumed_vsize })
    }

    pub fn assumed_vsize(&self) -> u64 {
        self.assumed_vsize
    }

    pub fn fee_for(&self, tier: FeeTier) -> Amount {
        fee(tier.sat_per_vb(), self.assumed_vsize)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule { assumed_vsize: DEFAULT_ASSUMED_VSIZE }
    }
}
