//! 親→子のトランザクションチェーンの作成と、置換による無効化。
//!
//! すべて同期的に順番に実行する:
//! UTXO選択 → 親の構築 → 署名 → ブロードキャスト → 子の構築 → 署名 → ブロードキャスト。
//! 途中で失敗しても巻き戻しは行わず、`ChainState` には到達した段階が残る。

use bitcoin::{Amount, OutPoint, Txid};

use crate::{
    amount::with_fee_margin,
    error::AppError,
    fee::FeeSchedule,
    rpc::{decode_transaction, NodeClient, RpcTransport, CHANGE_ADDRESS_TYPE},
    transaction::{
        build_child, build_parent, build_replacement, check_send_amount, select_utxo,
        SpendableOutput, PARENT_OUTPUT_INDEX,
    },
    types::{
        ChainStage, ChainState, ReplacementKind, TransactionIntent, UnspentOutput, WalletSet,
    },
};

/// 選択対象にする最小承認数
pub const MIN_CONFIRMATIONS: u32 = 1;

const CHILD_CHANGE_LABEL: &str = "Child_Change";

/// 子トランザクションの既定の送金額は目標額の半分 (切り捨て)。
pub fn default_send_amount(target: Amount) -> Amount {
    Amount::from_sat(target.to_sat() / 2)
}

/// ブロードキャストせずに組み立てた3つのトランザクション。
#[derive(Debug, Clone)]
pub struct ChainPlan {
    pub utxo: UnspentOutput,
    pub parent: TransactionIntent,
    /// 親の未署名txidを入力に使った子 (おつり先は仮に Wallet B)
    pub child: TransactionIntent,
    pub replacement: TransactionIntent,
}

#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub original_utxo: UnspentOutput,
    pub parent: TransactionIntent,
    pub parent_txid: Txid,
    pub child: TransactionIntent,
    pub child_txid: Txid,
}

#[derive(Debug, Clone)]
pub struct ReplacementOutcome {
    pub kind: ReplacementKind,
    pub intent: TransactionIntent,
    pub txid: Txid,
}

pub struct ChainBuilder<'a, T: RpcTransport> {
    node: &'a NodeClient<T>,
    wallets: &'a WalletSet,
    schedule: FeeSchedule,
}

impl<'a, T: RpcTransport> ChainBuilder<'a, T> {
    pub fn new(node: &'a NodeClient<T>, wallets: &'a WalletSet, schedule: FeeSchedule) -> Self {
        ChainBuilder { node, wallets, schedule }
    }

    pub fn wallets(&self) -> &WalletSet {
        self.wallets
    }

    /// 残高を確認したうえで、承認済みUTXOから目標額の1.1倍以上のものを選ぶ。
    pub fn select_funding(&self, target: Amount) -> Result<UnspentOutput, AppError> {
        let required = with_fee_margin(target)?;
        let balance = self.node.get_balance()?;
        log::info!("ウォレット残高: {} sats (必要額 {} sats)", balance.to_sat(), required.to_sat());
        if balance < required {
            log::error!("ウォレットの残高が不足しています。");
            return Err(AppError::InsufficientFunds {
                available: balance.to_sat(),
                required: required.to_sat(),
                fee: required.to_sat() - target.to_sat(),
            });
        }

        let unspent = self.node.list_unspent(MIN_CONFIRMATIONS)?;
        select_utxo(&unspent, target)
    }

    /// UTXOを選び、親・子・置換の内容を計算する。署名もブロードキャストもしない。
    pub fn plan(&self, target: Amount, send_amount: Amount) -> Result<ChainPlan, AppError> {
        check_send_amount(send_amount)?;
        let utxo = self.select_funding(target)?;
        let parent = build_parent(&utxo, &self.wallets.wallet_b, &self.schedule)?;
        let parent_output = SpendableOutput {
            outpoint: OutPoint::new(parent.to_unsigned_tx().compute_txid(), PARENT_OUTPUT_INDEX),
            value: parent.outputs[0].value,
        };
        let child = build_child(
            &parent_output,
            &self.wallets.wallet_c,
            send_amount,
            &self.schedule,
            || Ok(self.wallets.wallet_b.clone()),
        )?;
        let replacement =
            build_replacement(&utxo, utxo.value, &self.wallets.wallet_a, &self.schedule)?;
        Ok(ChainPlan { utxo, parent, child, replacement })
    }

    /// 親と子を作成してブロードキャストする。
    ///
    /// 子の段階で失敗した場合、親はブロードキャスト済みのまま `ParentBroadcast` に留まる。
    /// その状態からは `replace` で元の入力を取り戻せる。
    pub fn create_chain(
        &self,
        state: &mut ChainState,
        target: Amount,
        send_amount: Amount,
    ) -> Result<ChainOutcome, AppError> {
        if !matches!(state.stage, ChainStage::Idle | ChainStage::Replaced) {
            return Err(AppError::InvalidStage { expected: "Idle", actual: state.stage });
        }
        // 親をブロードキャストした後で子が組めないと分かっても遅い
        check_send_amount(send_amount)?;
        *state = ChainState::new();
        log::info!("トランザクションチェーンの作成を開始します。目標額: {} sats", target.to_sat());

        let utxo = self.select_funding(target)?;
        let parent = build_parent(&utxo, &self.wallets.wallet_b, &self.schedule)?;
        let signed_parent = self.sign(&parent)?;
        state.original_utxo = Some(utxo.clone());
        state.stage = ChainStage::ParentBuilt;

        let parent_txid = self.broadcast(&parent, &signed_parent)?;
        state.parent_txid = Some(parent_txid);
        state.stage = ChainStage::ParentBroadcast;

        let parent_output = SpendableOutput {
            outpoint: OutPoint::new(parent_txid, PARENT_OUTPUT_INDEX),
            value: parent.outputs[0].value,
        };
        let child = build_child(
            &parent_output,
            &self.wallets.wallet_c,
            send_amount,
            &self.schedule,
            || self.node.get_new_address(CHILD_CHANGE_LABEL, CHANGE_ADDRESS_TYPE),
        )?;
        let signed_child = self.sign(&child)?;
        state.stage = ChainStage::ChildBuilt;

        let child_txid = self.broadcast(&child, &signed_child)?;
        state.child_txid = Some(child_txid);
        state.stage = ChainStage::ChildBroadcast;
        state.funded = true;
        log::info!("トランザクションチェーンを作成しました。親: {}, 子: {}", parent_txid, child_txid);

        Ok(ChainOutcome {
            original_utxo: utxo,
            parent,
            parent_txid,
            child,
            child_txid,
        })
    }

    /// 親と同じ元のUTXOを高い手数料率で使い、資金を Wallet A に戻す。
    /// 親とその子孫がネットワークから破棄されるのは外部ノードの置換ポリシーによる。
    pub fn replace(
        &self,
        state: &mut ChainState,
        kind: ReplacementKind,
    ) -> Result<ReplacementOutcome, AppError> {
        if !state.stage.is_replaceable() {
            return Err(AppError::InvalidStage {
                expected: "ParentBroadcast / ChildBuilt / ChildBroadcast",
                actual: state.stage,
            });
        }
        let original = state.original_utxo.clone().ok_or(AppError::InvalidStage {
            expected: "元のUTXOが記録された状態",
            actual: state.stage,
        })?;
        log::info!("置換トランザクション ({:?}) を作成します。元の入力: {}", kind, original.outpoint);

        let intent = build_replacement(&original, original.value, &self.wallets.wallet_a, &self.schedule)?;
        let signed = self.sign(&intent)?;
        let txid = self.broadcast(&intent, &signed)?;

        state.replacement_txid = Some(txid);
        state.stage = ChainStage::Replaced;
        state.funded = false;
        log::info!("置換トランザクションをブロードキャストしました: {}", txid);

        Ok(ReplacementOutcome { kind, intent, txid })
    }

    fn sign(&self, intent: &TransactionIntent) -> Result<String, AppError> {
        log::info!("{}トランザクションを作成して署名します。", intent.role);
        let raw_hex = self.node.create_raw_transaction(intent)?;
        let signed = self.node.sign_raw_transaction_with_wallet(&raw_hex)?;
        if !signed.complete {
            log::error!("{}トランザクションの署名が不完全です。", intent.role);
            return Err(AppError::SigningIncomplete { role: intent.role });
        }

        let tx = decode_transaction(&signed.hex)?;
        let vsize = tx.vsize() as u64;
        log::debug!("署名済み{}トランザクション: txid={}, vsize={} vB", intent.role, tx.compute_txid(), vsize);
        if vsize > self.schedule.assumed_vsize() {
            log::warn!(
                "{}トランザクションの実際のvsize {} vB が想定 {} vB を超えています。実効手数料率は想定より低くなります。",
                intent.role, vsize, self.schedule.assumed_vsize()
            );
        }
        Ok(signed.hex)
    }

    fn broadcast(&self, intent: &TransactionIntent, signed_hex: &str) -> Result<Txid, AppError> {
        log::info!("{}トランザクションをブロードキャストします。", intent.role);
        let txid = self.node.send_raw_transaction(signed_hex)?;
        log::info!("{}トランザクションのTXID: {}", intent.role, txid);
        Ok(txid)
    }
}
