//! BTCとsatoshiの変換。
//!
//! ノードとのやり取りはBTC建ての浮動小数点数で行われるため、変換はこのモジュールに集約する。
//! ノード境界では `round(btc × 1e8)`、ユーザー入力では小数点以下8桁での切り捨てを使う。

use bitcoin::{Amount, Denomination};

use crate::error::AppError;

pub const SATS_PER_BTC: u64 = 100_000_000;
const MAX_MONEY_SATS: u64 = 21_000_000 * SATS_PER_BTC;

/// ノードから受け取ったBTC建ての値をsatoshiに変換する (四捨五入)。
pub fn btc_to_sat(btc: f64) -> Result<Amount, AppError> {
    if !btc.is_finite() || btc < 0.0 {
        return Err(AppError::InputValidation(format!("不正なBTC金額: {}", btc)));
    }
    let sats = (btc * SATS_PER_BTC as f64).round();
    if sats > MAX_MONEY_SATS as f64 {
        return Err(AppError::InputValidation(format!("BTC金額が上限を超えています: {}", btc)));
    }
    Ok(Amount::from_sat(sats as u64))
}

/// ノードへ渡すためにsatoshiをBTC建ての浮動小数点数に変換する。
pub fn sat_to_btc(amount: Amount) -> f64 {
    amount.to_sat() as f64 / SATS_PER_BTC as f64
}

/// "0.001" のような10進表記のBTC金額をパースする。
/// 9桁目以降の端数は切り捨てる (floor)。浮動小数点演算は経由しない。
pub fn parse_btc_truncating(input: &str) -> Result<Amount, AppError> {
    let trimmed = input.trim();
    let truncated = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.len() > 8 && frac.is_ascii() => {
            log::debug!("BTC金額 {} を小数点以下8桁に切り捨てます。", trimmed);
            format!("{}.{}", whole, &frac[..8])
        }
        _ => trimmed.to_string(),
    };
    let amount = Amount::from_str_in(&truncated, Denomination::Bitcoin)
        .map_err(|e| AppError::InputValidation(format!("BTC金額のパースに失敗 ({}): {}", input, e)))?;
    if amount.to_sat() > MAX_MONEY_SATS {
        return Err(AppError::InputValidation(format!("BTC金額が上限を超えています: {}", input)));
    }
    Ok(amount)
}

/// 目標額に手数料用の10%を上乗せした必要額。`ceil(target × 1.1)` を整数演算で求める。
pub fn with_fee_margin(target: Amount) -> Result<Amount, AppError> {
    let sats = target
        .to_sat()
        .checked_mul(11)
        .ok_or_else(|| AppError::InputValidation(format!("目標額が大きすぎます: {} sats", target.to_sat())))?;
    Ok(Amount::from_sat(sats.div_ceil(10)))
}
