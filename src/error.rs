use std::path::PathBuf;
use bitcoin::address::ParseError as BitcoinAddressError;
use bitcoin::consensus::encode::Error as BitcoinEncodeError;
use thiserror::Error;

use crate::types::{ChainStage, TxRole};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONパースエラー ファイル: {file_path:?}, 詳細: {source}")]
    JsonParse {
        file_path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Bitcoinコンセンサスデコードエラー: {0}")]
    BitcoinConsensus(#[from] BitcoinEncodeError),

    #[error("16進数デコードエラー: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Bitcoinアドレスエラー: {0}")]
    BitcoinAddress(#[from] BitcoinAddressError),

    #[error("入力検証エラー: {0}")]
    InputValidation(String),

    #[error("条件を満たすUTXOが見つかりません (必要額 {required_sats} sats)")]
    NoSuitableUtxo { required_sats: u64 },

    #[error("資金不足: 利用可能額 {available} sats, 要求額 {required} sats (手数料 {fee} sats を含む)")]
    InsufficientFunds {
        available: u64,
        required: u64,
        fee: u64,
    },

    #[error("{role}トランザクションの署名が完了しませんでした")]
    SigningIncomplete { role: TxRole },

    #[error("RPC通信エラー: {0}")]
    Transport(String),

    #[error("ノードが {method} を拒否しました (code {code}): {message}")]
    NodeRejected {
        method: String,
        code: i32,
        message: String,
    },

    #[error("{method} の応答が不正です: {detail}")]
    UnexpectedResponse { method: String, detail: String },

    #[error("チェーンの状態が不正です: 期待 {expected}, 現在 {actual:?}")]
    InvalidStage {
        expected: &'static str,
        actual: ChainStage,
    },
}

impl AppError {
    pub(crate) fn unexpected(method: &str, detail: impl Into<String>) -> Self {
        AppError::UnexpectedResponse {
            method: method.to_string(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let err = AppError::InsufficientFunds {
            available: 150,
            required: 190,
            fee: 190,
        };
        assert_eq!(
            err.to_string(),
            "資金不足: 利用可能額 150 sats, 要求額 190 sats (手数料 190 sats を含む)"
        );
    }

    #[test]
    fn display_signing_incomplete_names_role() {
        let err = AppError::SigningIncomplete { role: TxRole::Child };
        assert!(err.to_string().starts_with("子"));
    }

    #[test]
    fn display_node_rejected() {
        let err = AppError::NodeRejected {
            method: "sendrawtransaction".into(),
            code: -26,
            message: "insufficient fee".into(),
        };
        assert_eq!(
            err.to_string(),
            "ノードが sendrawtransaction を拒否しました (code -26): insufficient fee"
        );
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(AppError::Transport("timeout".into()));
        assert!(err.to_string().contains("timeout"));
    }
}
