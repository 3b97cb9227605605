use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use bitcoin::hashes::Hash;
use bitcoin::{
    absolute::LockTime, consensus::encode, transaction::Version, Address, Network, OutPoint,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, WPubkeyHash, Witness,
};
use serde_json::{json, Value};

use crate::{amount::btc_to_sat, error::AppError, rpc::RpcTransport};

pub fn outpoint(byte: u8, vout: u32) -> OutPoint {
    OutPoint::new(Txid::from_byte_array([byte; 32]), vout)
}

pub fn regtest_address(byte: u8) -> Address {
    let script = ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([byte; 20]));
    Address::from_script(&script, Network::Regtest).unwrap()
}

/// Bitcoin Coreのウォレットを模した偽のノード。
///
/// `respond` / `fail` で登録した応答があればそれを先に返し、なければ
/// ノードらしい既定の振る舞いをする。呼び出しはすべて記録する。
pub struct FakeNode {
    pub balance_btc: f64,
    pub unspent: Vec<Value>,
    scripted: RefCell<HashMap<String, VecDeque<Result<Value, AppError>>>>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
    next_address: RefCell<u8>,
}

impl FakeNode {
    pub fn new() -> Self {
        FakeNode {
            balance_btc: 0.0,
            unspent: Vec::new(),
            scripted: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            next_address: RefCell::new(0xc0),
        }
    }

    /// 残高と単一の承認済みUTXOを持つノード。
    pub fn funded(utxo: OutPoint, amount_btc: f64) -> Self {
        FakeNode {
            balance_btc: amount_btc,
            unspent: vec![json!({
                "txid": utxo.txid.to_string(),
                "vout": utxo.vout,
                "amount": amount_btc,
                "confirmations": 6,
            })],
            ..FakeNode::new()
        }
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.push(method, Ok(value));
    }

    pub fn fail(&self, method: &str, err: AppError) {
        self.push(method, Err(err));
    }

    fn push(&self, method: &str, response: Result<Value, AppError>) {
        self.scripted
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .borrow()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn default_response(&self, method: &str, params: &[Value]) -> Result<Value, AppError> {
        match method {
            "getblockchaininfo" => Ok(json!({"chain": "regtest", "blocks": 150})),
            "getbalance" => Ok(json!(self.balance_btc)),
            "listunspent" => Ok(Value::Array(self.unspent.clone())),
            "getnewaddress" => {
                let mut next = self.next_address.borrow_mut();
                *next += 1;
                Ok(json!(regtest_address(*next).to_string()))
            }
            "createrawtransaction" => Ok(json!(encode::serialize_hex(&raw_from_params(params)))),
            "signrawtransactionwithwallet" => Ok(json!({"hex": params[0], "complete": true})),
            "sendrawtransaction" => {
                let bytes = hex::decode(params[0].as_str().unwrap()).unwrap();
                let tx: Transaction = encode::deserialize(&bytes).unwrap();
                Ok(json!(tx.compute_txid().to_string()))
            }
            other => Err(AppError::Transport(format!("unknown method {}", other))),
        }
    }
}

impl RpcTransport for FakeNode {
    fn call(&self, method: &str, params: &[Value]) -> Result<Value, AppError> {
        self.calls.borrow_mut().push((method.to_string(), params.to_vec()));
        let scripted = self
            .scripted
            .borrow_mut()
            .get_mut(method)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(response) => response,
            None => self.default_response(method, params),
        }
    }
}

fn raw_from_params(params: &[Value]) -> Transaction {
    let input = params[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| TxIn {
            previous_output: OutPoint::new(
                Txid::from_str(i["txid"].as_str().unwrap()).unwrap(),
                i["vout"].as_u64().unwrap() as u32,
            ),
            script_sig: ScriptBuf::new(),
            sequence: Sequence(i["sequence"].as_u64().unwrap_or(0xffffffff) as u32),
            witness: Witness::new(),
        })
        .collect();
    let output = params[1]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|entry| entry.as_object().unwrap().iter())
        .map(|(address, btc)| TxOut {
            value: btc_to_sat(btc.as_f64().unwrap()).unwrap(),
            script_pubkey: Address::from_str(address).unwrap().assume_checked().script_pubkey(),
        })
        .collect();
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    }
}
