use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use bitcoin::{Amount, Network as BitcoinNetwork, OutPoint};
use crate::{amount::parse_btc_truncating, error::AppError};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// ノード接続とWallet A/B/Cのアドレスを記述したJSONファイルへのパス
    #[clap(short, long, value_parser, default_value = "rbf-demo.json")]
    pub config: PathBuf,

    /// 使用するネットワーク ("bitcoin", "testnet", "signet", "regtest")
    #[clap(short, long, value_parser, default_value = "testnet")]
    pub network: String,

    /// 表示言語 ("en", "ar", "ja")
    #[clap(short, long, value_parser, default_value = "en")]
    pub lang: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// ノードへの接続を確認し、ブロック数と残高を表示する
    Info,
    /// 親・子・置換トランザクションを組み立てて表示する (ブロードキャストしない)
    Plan(AmountArgs),
    /// 親と子をブロードキャストする
    Chain(AmountArgs),
    /// キルスイッチ: 元のUTXOを高い手数料で使い直し、Wallet A に戻す
    Kill(ReplaceArgs),
    /// 全停止: キルスイッチと同じ置換を行う
    StopAll(ReplaceArgs),
    /// チェーンを作成し、確認後に置換する
    Demo {
        #[clap(flatten)]
        amounts: AmountArgs,

        /// キルスイッチではなく全停止として置換する
        #[clap(long)]
        stop_all: bool,

        /// Enterキーの入力を待たずに置換する
        #[clap(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AmountArgs {
    /// 目標額 (BTC)。省略時は設定ファイルの値
    #[clap(short, long, value_parser = parse_btc_arg)]
    pub amount: Option<Amount>,

    /// Wallet C への送金額 (BTC)。省略時は目標額の半分
    #[clap(short, long, value_parser = parse_btc_arg)]
    pub send: Option<Amount>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplaceArgs {
    /// 親が使った元のUTXO ("txid:vout")
    #[clap(short, long, value_parser = parse_outpoint)]
    pub utxo: OutPoint,

    /// 元のUTXOの額 (BTC)
    #[clap(short, long, value_parser = parse_btc_arg)]
    pub value: Amount,
}

pub fn parse_network(network_str: &str) -> Result<BitcoinNetwork, AppError> {
    match network_str.to_lowercase().as_str() {
        "bitcoin" | "mainnet" => Ok(BitcoinNetwork::Bitcoin),
        "testnet" => Ok(BitcoinNetwork::Testnet),
        "signet" => Ok(BitcoinNetwork::Signet),
        "regtest" => Ok(BitcoinNetwork::Regtest),
        s => Err(AppError::InputValidation(format!("無効なネットワークが指定されました: {}", s))),
    }
}

fn parse_btc_arg(s: &str) -> Result<Amount, String> {
    parse_btc_truncating(s).map_err(|e| e.to_string())
}

fn parse_outpoint(s: &str) -> Result<OutPoint, String> {
    OutPoint::from_str(s).map_err(|e| format!("無効なUTXO指定です ({}): {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::outpoint;

    #[test]
    fn parses_networks() {
        assert_eq!(parse_network("Mainnet").unwrap(), BitcoinNetwork::Bitcoin);
        assert_eq!(parse_network("signet").unwrap(), BitcoinNetwork::Signet);
        assert!(matches!(parse_network("litecoin"), Err(AppError::InputValidation(_))));
    }

    #[test]
    fn defaults_apply_without_flags() {
        let args = CliArgs::try_parse_from(["rbf-chain-demo", "info"]).unwrap();
        assert_eq!(args.config, PathBuf::from("rbf-demo.json"));
        assert_eq!(args.network, "testnet");
        assert_eq!(args.lang, "en");
        assert!(matches!(args.command, Command::Info));
    }

    #[test]
    fn chain_amounts_are_truncated_to_sats() {
        let args = CliArgs::try_parse_from([
            "rbf-chain-demo", "--network", "regtest", "chain", "--amount", "0.001000019", "--send", "0.0005",
        ])
        .unwrap();
        match args.command {
            Command::Chain(amounts) => {
                assert_eq!(amounts.amount, Some(Amount::from_sat(100_001)));
                assert_eq!(amounts.send, Some(Amount::from_sat(50_000)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn kill_requires_outpoint_and_value() {
        let utxo = outpoint(7, 1).to_string();
        let args =
            CliArgs::try_parse_from(["rbf-chain-demo", "kill", "--utxo", utxo.as_str(), "--value", "0.0011"]).unwrap();
        match args.command {
            Command::Kill(replace) => {
                assert_eq!(replace.utxo, outpoint(7, 1));
                assert_eq!(replace.value, Amount::from_sat(110_000));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(CliArgs::try_parse_from(["rbf-chain-demo", "kill", "--utxo", "nope", "--value", "1"]).is_err());
        assert!(CliArgs::try_parse_from(["rbf-chain-demo", "stop-all", "--utxo", utxo.as_str()]).is_err());
    }

    #[test]
    fn demo_flags() {
        let args = CliArgs::try_parse_from(["rbf-chain-demo", "demo", "--stop-all", "-y"]).unwrap();
        match args.command {
            Command::Demo { amounts, stop_all, yes } => {
                assert!(amounts.amount.is_none());
                assert!(stop_all);
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
