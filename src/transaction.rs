use bitcoin::{Address, Amount, OutPoint, Sequence};

use crate::{
    amount::with_fee_margin,
    error::AppError,
    fee::{FeeSchedule, FeeTier},
    types::{IntentOutput, OutputKind, TransactionIntent, TxRole, UnspentOutput},
};

// 親の出力は常に1つなので、子が使うのは vout 0
pub const PARENT_OUTPUT_INDEX: u32 = 0;

/// 親トランザクションの出力。未承認のまま子の入力になる。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpendableOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
}

/// 子の送金額は1 sat以上でなければならない。0 satの出力はノードにダストとして拒否される。
pub fn check_send_amount(send_amount: Amount) -> Result<(), AppError> {
    if send_amount == Amount::ZERO {
        return Err(AppError::InputValidation("Wallet C への送金額は0より大きくなければなりません。".to_string()));
    }
    Ok(())
}

/// ノードが返した順に走査し、`ceil(target × 1.1)` 以上の最初のUTXOを選ぶ。
pub fn select_utxo(unspent: &[UnspentOutput], target: Amount) -> Result<UnspentOutput, AppError> {
    let required = with_fee_margin(target)?;
    log::debug!("UTXO選択: 候補 {} 件, 必要額 {} sats", unspent.len(), required.to_sat());

    let utxo = unspent
        .iter()
        .find(|utxo| utxo.value >= required)
        .cloned()
        .ok_or(AppError::NoSuitableUtxo { required_sats: required.to_sat() })?;
    log::info!(
        "UTXOを選択しました: {} ({} sats, {} 承認)",
        utxo.outpoint,
        utxo.value.to_sat(),
        utxo.confirmations
    );
    Ok(utxo)
}

/// 選択したUTXO全額から最低手数料を引いて Wallet B へ送る親トランザクション。
pub fn build_parent(
    utxo: &UnspentOutput,
    change_destination: &Address,
    schedule: &FeeSchedule,
) -> Result<TransactionIntent, AppError> {
    let fee = schedule.fee_for(FeeTier::Low);
    let output_value = positive_remainder(utxo.value, fee)?;
    log::debug!("親トランザクション: 入力 {} sats, 手数料 {} sats, 出力 {} sats",
        utxo.value.to_sat(), fee.to_sat(), output_value.to_sat());

    Ok(TransactionIntent {
        role: TxRole::Parent,
        input: utxo.outpoint,
        input_value: utxo.value,
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        outputs: vec![IntentOutput {
            address: change_destination.clone(),
            value: output_value,
            kind: OutputKind::Change,
        }],
        fee,
    })
}

/// 親の未承認出力を使う子トランザクション。
///
/// おつりが出る場合だけ `change_address` が呼ばれる。おつりが負になる場合はエラーで、
/// 0 に丸めることはしない。
pub fn build_child<F>(
    parent_output: &SpendableOutput,
    receiver: &Address,
    send_amount: Amount,
    schedule: &FeeSchedule,
    change_address: F,
) -> Result<TransactionIntent, AppError>
where
    F: FnOnce() -> Result<Address, AppError>,
{
    check_send_amount(send_amount)?;
    let fee = schedule.fee_for(FeeTier::Standard);
    let required = send_amount.checked_add(fee).ok_or_else(|| {
        AppError::InputValidation(format!("送金額が大きすぎます: {} sats", send_amount.to_sat()))
    })?;
    let remainder = parent_output.value.checked_sub(required).ok_or(AppError::InsufficientFunds {
        available: parent_output.value.to_sat(),
        required: required.to_sat(),
        fee: fee.to_sat(),
    })?;

    let mut outputs = vec![IntentOutput {
        address: receiver.clone(),
        value: send_amount,
        kind: OutputKind::Payment,
    }];
    if remainder > Amount::ZERO {
        outputs.push(IntentOutput {
            address: change_address()?,
            value: remainder,
            kind: OutputKind::Change,
        });
    }
    log::debug!("子トランザクション: 入力 {} sats, 送金 {} sats, 手数料 {} sats, おつり {} sats",
        parent_output.value.to_sat(), send_amount.to_sat(), fee.to_sat(), remainder.to_sat());

    Ok(TransactionIntent {
        role: TxRole::Child,
        input: parent_output.outpoint,
        input_value: parent_output.value,
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        outputs,
        fee,
    })
}

/// 親と同じ元のUTXOを高い手数料で使い、資金を Wallet A へ戻す置換トランザクション。
/// 親の出力ではなく元の入力を使うので、子孫ではなく二重支払いになる。
pub fn build_replacement(
    original_utxo: &UnspentOutput,
    return_amount: Amount,
    return_destination: &Address,
    schedule: &FeeSchedule,
) -> Result<TransactionIntent, AppError> {
    if return_amount > original_utxo.value {
        return Err(AppError::InputValidation(format!(
            "返金額 {} sats が元のUTXOの額 {} sats を超えています",
            return_amount.to_sat(),
            original_utxo.value.to_sat()
        )));
    }
    let fee = schedule.fee_for(FeeTier::High);
    let output_value = positive_remainder(return_amount, fee)?;
    log::debug!("置換トランザクション: 元の入力 {}, 手数料 {} sats, 返金 {} sats",
        original_utxo.outpoint, fee.to_sat(), output_value.to_sat());

    Ok(TransactionIntent {
        role: TxRole::Replacement,
        input: original_utxo.outpoint,
        input_value: original_utxo.value,
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        outputs: vec![IntentOutput {
            address: return_destination.clone(),
            value: output_value,
            kind: OutputKind::Payment,
        }],
        fee,
    })
}

fn positive_remainder(available: Amount, fee: Amount) -> Result<Amount, AppError> {
    match available.checked_sub(fee) {
        Some(rest) if rest > Amount::ZERO => Ok(rest),
        _ => Err(AppError::InsufficientFunds {
            available: available.to_sat(),
            required: fee.to_sat(),
            fee: fee.to_sat(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{outpoint, regtest_address};

    fn utxo(byte: u8, sats: u64) -> UnspentOutput {
        UnspentOutput {
            outpoint: outpoint(byte, 1),
            value: Amount::from_sat(sats),
            confirmations: 6,
        }
    }

    fn parent_output(sats: u64) -> SpendableOutput {
        SpendableOutput {
            outpoint: outpoint(0xee, PARENT_OUTPUT_INDEX),
            value: Amount::from_sat(sats),
        }
    }

    #[test]
    fn selects_first_qualifying_utxo_in_node_order() {
        let unspent = vec![utxo(1, 50_000), utxo(2, 200_000), utxo(3, 110_000)];
        let selected = select_utxo(&unspent, Amount::from_sat(100_000)).unwrap();
        assert_eq!(selected.outpoint, outpoint(2, 1));
    }

    #[test]
    fn selection_threshold_is_inclusive() {
        let unspent = vec![utxo(1, 109_999), utxo(2, 110_000)];
        let selected = select_utxo(&unspent, Amount::from_sat(100_000)).unwrap();
        assert_eq!(selected.value, Amount::from_sat(110_000));

        let err = select_utxo(&unspent[..1], Amount::from_sat(100_000)).unwrap_err();
        assert!(matches!(err, AppError::NoSuitableUtxo { required_sats: 110_000 }));
    }

    #[test]
    fn selection_fails_on_empty_list() {
        let err = select_utxo(&[], Amount::from_sat(1)).unwrap_err();
        assert!(matches!(err, AppError::NoSuitableUtxo { .. }));
    }

    #[test]
    fn selection_only_returns_values_above_threshold() {
        let values = [0u64, 1, 99, 100, 110, 111, 1_000, 109_999, 110_000, 110_001];
        for target in [1u64, 100, 1_000, 100_000] {
            let required = with_fee_margin(Amount::from_sat(target)).unwrap();
            for value in values {
                let result = select_utxo(&[utxo(9, value)], Amount::from_sat(target));
                assert_eq!(result.is_ok(), Amount::from_sat(value) >= required, "target {target}, value {value}");
            }
        }
    }

    #[test]
    fn parent_spends_whole_utxo_minus_low_fee() {
        let schedule = FeeSchedule::default();
        let parent = build_parent(&utxo(1, 110_000), &regtest_address(2), &schedule).unwrap();
        assert_eq!(parent.role, TxRole::Parent);
        assert_eq!(parent.input, outpoint(1, 1));
        assert_eq!(parent.fee, Amount::from_sat(190));
        assert_eq!(parent.outputs.len(), 1);
        assert_eq!(parent.outputs[0].value, Amount::from_sat(109_810));
        assert_eq!(parent.outputs[0].address, regtest_address(2));
        assert_eq!(parent.sequence, Sequence::ENABLE_RBF_NO_LOCKTIME);
    }

    #[test]
    fn parent_fails_when_fee_exceeds_utxo() {
        let schedule = FeeSchedule::default();
        let err = build_parent(&utxo(1, 150), &regtest_address(2), &schedule).unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { available: 150, fee: 190, .. }));

        // 出力がちょうど 0 になる場合も失敗する
        let err = build_parent(&utxo(1, 190), &regtest_address(2), &schedule).unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        assert!(build_parent(&utxo(1, 191), &regtest_address(2), &schedule).is_ok());
    }

    #[test]
    fn child_sends_amount_and_returns_change() {
        let schedule = FeeSchedule::default();
        let child = build_child(
            &parent_output(109_810),
            &regtest_address(3),
            Amount::from_sat(50_000),
            &schedule,
            || Ok(regtest_address(4)),
        )
        .unwrap();

        assert_eq!(child.input, outpoint(0xee, 0));
        assert_eq!(child.fee, Amount::from_sat(3_800));
        assert_eq!(child.outputs[0].address, regtest_address(3));
        assert_eq!(child.outputs[0].value, Amount::from_sat(50_000));
        let change = child.change().unwrap();
        assert_eq!(change.address, regtest_address(4));
        assert_eq!(change.value, Amount::from_sat(56_010));
    }

    #[test]
    fn child_without_remainder_skips_change_address() {
        let schedule = FeeSchedule::default();
        let child = build_child(
            &parent_output(53_800),
            &regtest_address(3),
            Amount::from_sat(50_000),
            &schedule,
            || panic!("おつりがないのにアドレスが要求された"),
        )
        .unwrap();
        assert_eq!(child.outputs.len(), 1);
        assert!(child.change().is_none());
    }

    #[test]
    fn child_rejects_zero_send_amount() {
        let schedule = FeeSchedule::default();
        let err = build_child(
            &parent_output(109_810),
            &regtest_address(3),
            Amount::ZERO,
            &schedule,
            || panic!("送金額が0なのにアドレスが要求された"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
        assert!(check_send_amount(Amount::from_sat(1)).is_ok());
    }

    #[test]
    fn child_fails_on_negative_remainder() {
        let schedule = FeeSchedule::default();
        let err = build_child(
            &parent_output(53_799),
            &regtest_address(3),
            Amount::from_sat(50_000),
            &schedule,
            || Ok(regtest_address(4)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientFunds { available: 53_799, required: 53_800, fee: 3_800 }
        ));
    }

    #[test]
    fn child_propagates_change_address_failure() {
        let schedule = FeeSchedule::default();
        let err = build_child(
            &parent_output(109_810),
            &regtest_address(3),
            Amount::from_sat(50_000),
            &schedule,
            || Err(AppError::Transport("接続拒否".into())),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[test]
    fn replacement_spends_original_input_with_high_fee() {
        let schedule = FeeSchedule::default();
        let original = utxo(1, 110_000);
        let replacement =
            build_replacement(&original, original.value, &regtest_address(1), &schedule).unwrap();
        assert_eq!(replacement.input, original.outpoint);
        assert_eq!(replacement.fee, Amount::from_sat(9_500));
        assert_eq!(replacement.outputs[0].value, Amount::from_sat(100_500));
        assert_eq!(replacement.outputs[0].address, regtest_address(1));

        let parent = build_parent(&original, &regtest_address(2), &schedule).unwrap();
        assert_eq!(parent.input, replacement.input);
        assert!(replacement.fee > parent.fee);
    }

    #[test]
    fn replacement_fails_when_fee_consumes_everything() {
        let schedule = FeeSchedule::default();
        let original = utxo(1, 9_500);
        let err = build_replacement(&original, original.value, &regtest_address(1), &schedule)
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
    }

    #[test]
    fn replacement_cannot_return_more_than_utxo() {
        let schedule = FeeSchedule::default();
        let original = utxo(1, 110_000);
        let err = build_replacement(&original, Amount::from_sat(110_001), &regtest_address(1), &schedule)
            .unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }

    #[test]
    fn building_twice_yields_identical_intents() {
        let schedule = FeeSchedule::default();
        let original = utxo(7, 250_000);

        let first = build_parent(&original, &regtest_address(2), &schedule).unwrap();
        let second = build_parent(&original, &regtest_address(2), &schedule).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first.to_rpc_params()).unwrap(),
            serde_json::to_vec(&second.to_rpc_params()).unwrap()
        );

        let make_child = || {
            build_child(
                &parent_output(249_810),
                &regtest_address(3),
                Amount::from_sat(100_000),
                &schedule,
                || Ok(regtest_address(4)),
            )
            .unwrap()
        };
        assert_eq!(
            serde_json::to_vec(&make_child().to_rpc_params()).unwrap(),
            serde_json::to_vec(&make_child().to_rpc_params()).unwrap()
        );
    }
}
