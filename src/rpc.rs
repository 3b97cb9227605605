//! Bitcoin CoreのJSON-RPCとの境界。
//!
//! 金額はこの層でBTC建ての浮動小数点数とsatoshiとの間で変換する。

use std::str::FromStr;
use bitcoin::{Address, Amount, Network, OutPoint, Transaction, Txid};
use bitcoin::consensus::encode;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    amount::btc_to_sat,
    config::RpcSettings,
    error::AppError,
    types::{SignedTransaction, TransactionIntent, UnspentOutput},
};

/// ノードへのRPC呼び出し。テストでは偽のノードに差し替える。
pub trait RpcTransport {
    fn call(&self, method: &str, params: &[Value]) -> Result<Value, AppError>;
}

impl RpcTransport for Client {
    fn call(&self, method: &str, params: &[Value]) -> Result<Value, AppError> {
        log::debug!("RPC呼び出し: {} {:?}", method, params);
        <Client as RpcApi>::call::<Value>(self, method, params).map_err(|e| map_rpc_error(method, e))
    }
}

fn map_rpc_error(method: &str, err: bitcoincore_rpc::Error) -> AppError {
    use bitcoincore_rpc::jsonrpc::error::Error as JsonRpcError;

    match err {
        bitcoincore_rpc::Error::JsonRpc(JsonRpcError::Rpc(rpc)) => {
            log::error!("ノードが {} を拒否しました: {}", method, rpc.message);
            AppError::NodeRejected {
                method: method.to_string(),
                code: rpc.code,
                message: rpc.message,
            }
        }
        other => {
            log::error!("{} の呼び出しに失敗しました: {}", method, other);
            AppError::Transport(format!("{}: {}", method, other))
        }
    }
}

/// 設定からBitcoin CoreのRPCクライアントを作る。ウォレット名があれば `/wallet/<name>` に接続する。
pub fn connect(settings: &RpcSettings) -> Result<Client, AppError> {
    let url = wallet_url(settings);
    log::info!("ノードに接続します: {}", url);
    Client::new(&url, rpc_auth(settings))
        .map_err(|e| AppError::Transport(format!("RPCクライアントの作成に失敗: {}", e)))
}

fn wallet_url(settings: &RpcSettings) -> String {
    match &settings.wallet {
        Some(wallet) => format!("{}/wallet/{}", settings.url.trim_end_matches('/'), wallet),
        None => settings.url.clone(),
    }
}

// クッキーファイルがあればユーザー名とパスワードより優先する
fn rpc_auth(settings: &RpcSettings) -> Auth {
    match (&settings.cookie_file, settings.user.is_empty()) {
        (Some(path), _) => Auth::CookieFile(path.clone()),
        (None, true) => Auth::None,
        (None, false) => Auth::UserPass(settings.user.clone(), settings.password.clone()),
    }
}

/// `getnewaddress` で要求するアドレスタイプ
pub const CHANGE_ADDRESS_TYPE: &str = "bech32";

#[derive(Deserialize, Debug)]
struct ListUnspentEntry {
    txid: String,
    vout: u32,
    amount: f64,
    #[serde(default)]
    confirmations: u32,
}

#[derive(Deserialize, Debug)]
struct SignRawTransactionResult {
    hex: String,
    complete: bool,
    #[serde(default)]
    errors: Vec<Value>,
}

/// ノードのウォレットに対する型付きの操作。
pub struct NodeClient<T: RpcTransport> {
    transport: T,
    network: Network,
}

impl<T: RpcTransport> NodeClient<T> {
    pub fn new(transport: T, network: Network) -> Self {
        NodeClient { transport, network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call_as<R: for<'de> Deserialize<'de>>(&self, method: &str, params: &[Value]) -> Result<R, AppError> {
        let value = self.transport.call(method, params)?;
        serde_json::from_value(value).map_err(|e| AppError::unexpected(method, e.to_string()))
    }

    pub fn get_block_count(&self) -> Result<u64, AppError> {
        let info = self.transport.call("getblockchaininfo", &[])?;
        info.get("blocks")
            .and_then(Value::as_u64)
            .ok_or_else(|| AppError::unexpected("getblockchaininfo", "blocks がありません"))
    }

    pub fn get_balance(&self) -> Result<Amount, AppError> {
        let btc: f64 = self.call_as("getbalance", &[])?;
        btc_to_sat(btc)
    }

    pub fn list_unspent(&self, min_confirmations: u32) -> Result<Vec<UnspentOutput>, AppError> {
        let entries: Vec<ListUnspentEntry> = self.call_as("listunspent", &[json!(min_confirmations)])?;
        entries
            .into_iter()
            .map(|entry| {
                let txid = Txid::from_str(&entry.txid)
                    .map_err(|e| AppError::unexpected("listunspent", format!("無効なTXID ({}): {}", entry.txid, e)))?;
                Ok(UnspentOutput {
                    outpoint: OutPoint::new(txid, entry.vout),
                    value: btc_to_sat(entry.amount)?,
                    confirmations: entry.confirmations,
                })
            })
            .collect()
    }

    pub fn get_new_address(&self, label: &str, address_type: &str) -> Result<Address, AppError> {
        let address: String = self.call_as("getnewaddress", &[json!(label), json!(address_type)])?;
        Address::from_str(&address)
            .and_then(|addr| addr.require_network(self.network))
            .map_err(|e| AppError::unexpected("getnewaddress", format!("{} ({})", e, address)))
    }

    /// 未署名トランザクションをノードに作らせ、金額の変換で値がずれていないかを検証する。
    pub fn create_raw_transaction(&self, intent: &TransactionIntent) -> Result<String, AppError> {
        let raw_hex: String = self.call_as("createrawtransaction", &intent.to_rpc_params())?;
        let raw_tx = decode_transaction(&raw_hex)?;
        verify_matches_intent(&raw_tx, intent)?;
        Ok(raw_hex)
    }

    pub fn sign_raw_transaction_with_wallet(&self, raw_hex: &str) -> Result<SignedTransaction, AppError> {
        let result: SignRawTransactionResult =
            self.call_as("signrawtransactionwithwallet", &[json!(raw_hex)])?;
        for err in &result.errors {
            log::warn!("署名エラーが報告されました: {}", err);
        }
        Ok(SignedTransaction { hex: result.hex, complete: result.complete })
    }

    pub fn send_raw_transaction(&self, signed_hex: &str) -> Result<Txid, AppError> {
        let txid: String = self.call_as("sendrawtransaction", &[json!(signed_hex)])?;
        Txid::from_str(&txid).map_err(|e| AppError::unexpected("sendrawtransaction", format!("無効なTXID ({}): {}", txid, e)))
    }
}

pub fn decode_transaction(tx_hex: &str) -> Result<Transaction, AppError> {
    let bytes = hex::decode(tx_hex)?;
    Ok(encode::deserialize(&bytes)?)
}

fn verify_matches_intent(raw_tx: &Transaction, intent: &TransactionIntent) -> Result<(), AppError> {
    let expected = intent.to_unsigned_tx();
    if raw_tx.input.len() != 1 || raw_tx.input[0].previous_output != intent.input {
        return Err(AppError::unexpected(
            "createrawtransaction",
            format!("入力が一致しません: {:?}", raw_tx.input.first().map(|i| i.previous_output)),
        ));
    }
    if raw_tx.output != expected.output {
        log::error!("ノードが作成した出力: {:?}, 期待した出力: {:?}", raw_tx.output, expected.output);
        return Err(AppError::unexpected("createrawtransaction", "出力の金額またはスクリプトが一致しません"));
    }
    Ok(())
}
