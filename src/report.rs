use bitcoin::Amount;

use crate::{
    amount::sat_to_btc,
    chain::{ChainOutcome, ChainPlan, ReplacementOutcome},
    i18n::{render, Language, MessageKind},
    types::{ChainStage, ChainState, ReplacementKind, WalletSet},
};

fn btc(amount: Amount) -> String {
    sat_to_btc(amount).to_string()
}

pub fn connection(lang: Language, blocks: u64, balance: Amount) -> Vec<String> {
    vec![
        render(lang, MessageKind::Connected, &[&blocks]),
        render(lang, MessageKind::WalletBalance, &[&btc(balance)]),
    ]
}

pub fn plan(lang: Language, plan: &ChainPlan) -> Vec<String> {
    let change = plan.child.change().map(|o| o.value).unwrap_or(Amount::ZERO);
    vec![
        render(lang, MessageKind::PlanHeader, &[]),
        render(lang, MessageKind::SelectedUtxo, &[&plan.utxo.outpoint, &plan.utxo.value.to_sat()]),
        render(
            lang,
            MessageKind::PlanParent,
            &[&plan.parent.fee.to_sat(), &plan.parent.total_output().to_sat(), &plan.parent.outputs[0].address],
        ),
        render(
            lang,
            MessageKind::PlanChild,
            &[&plan.child.fee.to_sat(), &plan.child.outputs[0].value.to_sat(), &change.to_sat()],
        ),
        render(
            lang,
            MessageKind::PlanReplacement,
            &[
                &plan.replacement.fee.to_sat(),
                &plan.replacement.total_output().to_sat(),
                &plan.replacement.outputs[0].address,
            ],
        ),
    ]
}

pub fn chain_created(lang: Language, outcome: &ChainOutcome, wallets: &WalletSet) -> Vec<String> {
    let utxo = &outcome.original_utxo;
    let child_change = outcome.child.change().map(|o| o.value).unwrap_or(Amount::ZERO);
    vec![
        render(lang, MessageKind::SuccessChain, &[]),
        render(lang, MessageKind::ChainCreated, &[]),
        render(lang, MessageKind::SelectedUtxo, &[&utxo.outpoint, &utxo.value.to_sat()]),
        render(lang, MessageKind::ParentTxid, &[&outcome.parent_txid]),
        render(lang, MessageKind::ChildTxid, &[&outcome.child_txid]),
        render(
            lang,
            MessageKind::PlanParent,
            &[&outcome.parent.fee.to_sat(), &outcome.parent.total_output().to_sat(), &outcome.parent.outputs[0].address],
        ),
        render(
            lang,
            MessageKind::PlanChild,
            &[&outcome.child.fee.to_sat(), &outcome.child.outputs[0].value.to_sat(), &child_change.to_sat()],
        ),
        render(lang, MessageKind::WalletAddresses, &[]),
        render(lang, MessageKind::WalletA, &[&wallets.wallet_a]),
        render(lang, MessageKind::WalletB, &[&wallets.wallet_b]),
        render(lang, MessageKind::WalletC, &[&wallets.wallet_c]),
        render(lang, MessageKind::ResumeHint, &[&utxo.outpoint, &btc(utxo.value)]),
    ]
}

/// チェーン作成が途中で失敗し、親だけがブロードキャストされた場合の案内。
pub fn chain_incomplete(lang: Language, state: &ChainState) -> Vec<String> {
    match (&state.original_utxo, state.stage.is_replaceable()) {
        (Some(utxo), true) => {
            let mut lines = vec![render(lang, MessageKind::ChainIncomplete, &[&utxo.outpoint])];
            if let Some(txid) = state.parent_txid {
                lines.push(render(lang, MessageKind::ParentTxid, &[&txid]));
            }
            if let Some(txid) = state.child_txid {
                lines.push(render(lang, MessageKind::ChildTxid, &[&txid]));
            }
            lines.push(render(lang, MessageKind::ResumeHint, &[&utxo.outpoint, &btc(utxo.value)]));
            lines
        }
        _ => Vec::new(),
    }
}

pub fn replacement(lang: Language, outcome: &ReplacementOutcome) -> Vec<String> {
    let (success, header) = match outcome.kind {
        ReplacementKind::KillSwitch => (MessageKind::SuccessKill, MessageKind::KillActivated),
        ReplacementKind::StopAll => (MessageKind::SuccessStop, MessageKind::AllStopped),
    };
    let intent = &outcome.intent;
    vec![
        render(lang, success, &[]),
        render(lang, header, &[]),
        render(lang, MessageKind::SelectedUtxo, &[&intent.input, &intent.input_value.to_sat()]),
        render(
            lang,
            MessageKind::PlanReplacement,
            &[&intent.fee.to_sat(), &intent.total_output().to_sat(), &intent.outputs[0].address],
        ),
        render(lang, MessageKind::RbfTxid, &[&outcome.txid]),
        render(lang, MessageKind::ChainInvalidated, &[]),
        render(lang, MessageKind::FundsReturned, &[]),
    ]
}

pub fn wallet_status(lang: Language, state: &ChainState) -> Vec<String> {
    if state.funded {
        vec![
            render(lang, MessageKind::WalletCFunded, &[]),
            render(lang, MessageKind::StatusAwaiting, &[]),
        ]
    } else if state.stage == ChainStage::Replaced {
        vec![
            render(lang, MessageKind::WalletCEmpty, &[]),
            render(lang, MessageKind::StatusReturned, &[]),
        ]
    } else {
        // 置換前は資金がまだ Wallet A に戻っていない
        vec![render(lang, MessageKind::WalletCEmpty, &[])]
    }
}

pub fn action(lang: Language, kind: ReplacementKind) -> String {
    match kind {
        ReplacementKind::KillSwitch => render(lang, MessageKind::ActionKill, &[]),
        ReplacementKind::StopAll => render(lang, MessageKind::ActionStop, &[]),
    }
}
