use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use bitcoin::{Address, Amount, Network};
use serde::Deserialize;

use crate::{
    amount::parse_btc_truncating,
    error::AppError,
    fee::{FeeSchedule, DEFAULT_ASSUMED_VSIZE},
    types::WalletSet,
};

const DEFAULT_AMOUNT_BTC: &str = "0.001";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DemoConfig {
    pub rpc: RpcSettings,
    pub wallet_a: String,
    pub wallet_b: String,
    pub wallet_c: String,
    #[serde(default)]
    pub amount_btc: Option<f64>,
    #[serde(default)]
    pub assumed_vsize: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcSettings {
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    #[serde(default)]
    pub wallet: Option<String>,
}

// パスワードはログに出さない
impl fmt::Debug for RpcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"***")
            .field("cookie_file", &self.cookie_file)
            .field("wallet", &self.wallet)
            .finish()
    }
}

pub fn load_config(path: &Path) -> Result<DemoConfig, AppError> {
    let content = fs::read_to_string(path).map_err(|e| {
        log::error!("設定ファイルの読み込みに失敗しました: {:?}", path);
        AppError::Io(e)
    })?;
    let config: DemoConfig = serde_json::from_str(&content).map_err(|e| {
        log::error!("設定JSONのパースに失敗しました。");
        AppError::JsonParse {
            file_path: path.to_path_buf(),
            source: e,
        }
    })?;
    log::debug!("設定ファイルのパース成功: {:?}", config);
    Ok(config)
}

impl DemoConfig {
    /// Wallet A/B/C のアドレスを検証する。秘密鍵との対応は確認しない (署名はノードが行う)。
    pub fn wallets(&self, network: Network) -> Result<WalletSet, AppError> {
        Ok(WalletSet {
            wallet_a: parse_address("walletA", &self.wallet_a, network)?,
            wallet_b: parse_address("walletB", &self.wallet_b, network)?,
            wallet_c: parse_address("walletC", &self.wallet_c, network)?,
        })
    }

    pub fn target_amount(&self) -> Result<Amount, AppError> {
        match self.amount_btc {
            Some(btc) => parse_btc_truncating(&btc.to_string()),
            None => parse_btc_truncating(DEFAULT_AMOUNT_BTC),
        }
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule, AppError> {
        FeeSchedule::new(self.assumed_vsize.unwrap_or(DEFAULT_ASSUMED_VSIZE))
    }
}

fn parse_address(field: &str, address: &str, network: Network) -> Result<Address, AppError> {
    Address::from_str(address.trim())
        .and_then(|addr| addr.require_network(network))
        .map_err(|e| AppError::InputValidation(format!("{} のアドレス形式エラーまたはネットワーク不整合 ({}): {}", field, address, e)))
}
