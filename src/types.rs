use std::fmt;
use bitcoin::{
    absolute::LockTime, transaction::Version, Address, Amount, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness,
};
use serde_json::{json, Value};

use crate::amount::sat_to_btc;

/// ノードのウォレットが保持する未使用出力。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub confirmations: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxRole {
    Parent,
    Child,
    Replacement,
}

impl fmt::Display for TxRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TxRole::Parent => "親",
            TxRole::Child => "子",
            TxRole::Replacement => "置換",
        };
        f.write_str(label)
    }
}

/// 置換トランザクションの呼び方。トランザクションの形は同じで、表示メッセージだけが異なる。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplacementKind {
    KillSwitch,
    StopAll,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputKind {
    Payment,
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentOutput {
    pub address: Address,
    pub value: Amount,
    pub kind: OutputKind,
}

/// 署名前のトランザクション。入力は1つ、出力は追加順を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub role: TxRole,
    pub input: OutPoint,
    pub input_value: Amount,
    pub sequence: Sequence,
    pub outputs: Vec<IntentOutput>,
    pub fee: Amount,
}

impl TransactionIntent {
    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn change(&self) -> Option<&IntentOutput> {
        self.outputs.iter().find(|o| o.kind == OutputKind::Change)
    }

    /// 署名前のトランザクション。Bitcoin Coreの `createrawtransaction` と同じく
    /// version 2, locktime 0 で、script_sig と witness は空。
    pub fn to_unsigned_tx(&self) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: self.input,
                script_sig: ScriptBuf::new(),
                sequence: self.sequence,
                witness: Witness::new(),
            }],
            output: self
                .outputs
                .iter()
                .map(|o| TxOut {
                    value: o.value,
                    script_pubkey: o.address.script_pubkey(),
                })
                .collect(),
        }
    }

    /// `createrawtransaction` の引数 `[inputs, outputs]`。
    /// 出力は順序を保つため単一キーのオブジェクトの配列で渡す。
    pub fn to_rpc_params(&self) -> [Value; 2] {
        let inputs = json!([{
            "txid": self.input.txid.to_string(),
            "vout": self.input.vout,
            "sequence": self.sequence.0,
        }]);
        let outputs: Vec<Value> = self
            .outputs
            .iter()
            .map(|o| {
                let mut entry = serde_json::Map::new();
                entry.insert(o.address.to_string(), json!(sat_to_btc(o.value)));
                Value::Object(entry)
            })
            .collect();
        [inputs, Value::Array(outputs)]
    }
}

/// `signrawtransactionwithwallet` の結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
}

/// デモで使う3つのウォレットアドレス。
#[derive(Debug, Clone)]
pub struct WalletSet {
    /// 元の送金元。置換トランザクションの返金先。
    pub wallet_a: Address,
    /// 親トランザクションの受け取り先 (おつり)
    pub wallet_b: Address,
    /// 子トランザクションの受取人
    pub wallet_c: Address,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChainStage {
    Idle,
    ParentBuilt,
    ParentBroadcast,
    ChildBuilt,
    ChildBroadcast,
    Replaced,
}

impl ChainStage {
    /// 親がブロードキャスト済みで、元の入力を置換できる段階か。
    pub fn is_replaceable(self) -> bool {
        matches!(
            self,
            ChainStage::ParentBroadcast | ChainStage::ChildBuilt | ChainStage::ChildBroadcast
        )
    }
}

/// セッション中だけメモリに保持されるチェーンの状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub stage: ChainStage,
    /// 子トランザクションの受取人 (Wallet C) に資金が入っているか
    pub funded: bool,
    pub original_utxo: Option<UnspentOutput>,
    pub parent_txid: Option<Txid>,
    pub child_txid: Option<Txid>,
    pub replacement_txid: Option<Txid>,
}

impl ChainState {
    pub fn new() -> Self {
        ChainState {
            stage: ChainStage::Idle,
            funded: false,
            original_utxo: None,
            parent_txid: None,
            child_txid: None,
            replacement_txid: None,
        }
    }

    /// 以前のセッションでブロードキャストされたチェーンを、元のUTXOだけから再開する。
    pub fn resume_broadcast(original_utxo: UnspentOutput) -> Self {
        ChainState {
            stage: ChainStage::ParentBroadcast,
            original_utxo: Some(original_utxo),
            ..ChainState::new()
        }
    }
}

impl Default for ChainState {
    fn default() -> Self {
        ChainState::new()
    }
}
