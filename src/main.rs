use std::io::{self, BufRead};
use std::process::ExitCode;
use clap::Parser;

mod amount;
mod chain;
mod cli;
mod config;
mod error;
mod fee;
mod i18n;
mod report;
mod rpc;
mod transaction;
mod types;
#[cfg(test)]
mod test_utils;

use bitcoin::Amount;
use chain::{default_send_amount, ChainBuilder};
use cli::{parse_network, AmountArgs, CliArgs, Command, ReplaceArgs};
use config::{load_config, DemoConfig};
use error::AppError;
use i18n::{parse_language, render, Language, MessageKind};
use rpc::{NodeClient, RpcTransport};
use types::{ChainState, ReplacementKind, UnspentOutput};

fn main() -> ExitCode {
    env_logger::init();

    let args = CliArgs::parse();
    log::info!("アプリケーションを開始します。引数: {:?}", args);

    // 言語が決まる前のエラーは英語で表示する
    let lang = match parse_language(&args.lang) {
        Ok(lang) => lang,
        Err(e) => return report_failure(Language::En, &e),
    };
    match run(&args, lang) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(lang, &e),
    }
}

fn report_failure(lang: Language, err: &AppError) -> ExitCode {
    log::error!("処理が失敗しました: {:?}", err);
    eprintln!("{}", render(lang, MessageKind::Error, &[err]));
    ExitCode::FAILURE
}

fn run(args: &CliArgs, lang: Language) -> Result<(), AppError> {
    let cli_network = parse_network(&args.network)?;
    log::info!("指定されたネットワーク: {:?}", cli_network);

    let config = load_config(&args.config)?;
    let client = rpc::connect(&config.rpc)?;
    let node = NodeClient::new(client, cli_network);
    log::info!("ノードクライアントを初期化しました。ネットワーク: {:?}", node.network());

    let wallets = config.wallets(cli_network)?;
    let builder = ChainBuilder::new(&node, &wallets, config.fee_schedule()?);

    match &args.command {
        Command::Info => {
            let blocks = node.get_block_count()?;
            let balance = node.get_balance()?;
            print_lines(report::connection(lang, blocks, balance));
        }
        Command::Plan(amounts) => {
            let (target, send) = resolve_amounts(&config, amounts)?;
            let plan = builder.plan(target, send)?;
            print_lines(report::plan(lang, &plan));
        }
        Command::Chain(amounts) => {
            let mut state = ChainState::new();
            create_chain(&builder, &mut state, &config, amounts, lang)?;
            print_lines(report::wallet_status(lang, &state));
        }
        Command::Kill(replace) => {
            resume_and_replace(&builder, replace, ReplacementKind::KillSwitch, lang)?;
        }
        Command::StopAll(replace) => {
            resume_and_replace(&builder, replace, ReplacementKind::StopAll, lang)?;
        }
        Command::Demo { amounts, stop_all, yes } => {
            let kind = if *stop_all { ReplacementKind::StopAll } else { ReplacementKind::KillSwitch };
            let mut state = ChainState::new();
            let created = create_chain(&builder, &mut state, &config, amounts, lang);
            if let Err(e) = created {
                // 親だけがブロードキャスト済みなら、ここで取り消せる
                if !state.stage.is_replaceable() {
                    return Err(e);
                }
                eprintln!("{}", render(lang, MessageKind::Error, &[&e]));
            }
            print_lines(report::wallet_status(lang, &state));

            if !*yes {
                println!("{}", render(lang, MessageKind::PressEnter, &[]));
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
            }
            replace(&builder, &mut state, kind, lang)?;
        }
    }

    log::info!("処理が正常に完了しました。");
    Ok(())
}

fn resolve_amounts(config: &DemoConfig, amounts: &AmountArgs) -> Result<(Amount, Amount), AppError> {
    let target = match amounts.amount {
        Some(amount) => amount,
        None => config.target_amount()?,
    };
    if target == Amount::ZERO {
        return Err(AppError::InputValidation("目標額は0より大きくなければなりません。".to_string()));
    }
    let send = amounts.send.unwrap_or_else(|| default_send_amount(target));
    Ok((target, send))
}

fn create_chain<T: RpcTransport>(
    builder: &ChainBuilder<'_, T>,
    state: &mut ChainState,
    config: &DemoConfig,
    amounts: &AmountArgs,
    lang: Language,
) -> Result<(), AppError> {
    let (target, send) = resolve_amounts(config, amounts)?;
    println!("{}", render(lang, MessageKind::ActionCreate, &[&amount::sat_to_btc(target)]));
    match builder.create_chain(state, target, send) {
        Ok(outcome) => {
            print_lines(report::chain_created(lang, &outcome, builder.wallets()));
            Ok(())
        }
        Err(e) => {
            print_lines(report::chain_incomplete(lang, state));
            Err(e)
        }
    }
}

fn resume_and_replace<T: RpcTransport>(
    builder: &ChainBuilder<'_, T>,
    args: &ReplaceArgs,
    kind: ReplacementKind,
    lang: Language,
) -> Result<(), AppError> {
    let mut state = ChainState::resume_broadcast(UnspentOutput {
        outpoint: args.utxo,
        value: args.value,
        confirmations: 0,
    });
    replace(builder, &mut state, kind, lang)
}

fn replace<T: RpcTransport>(
    builder: &ChainBuilder<'_, T>,
    state: &mut ChainState,
    kind: ReplacementKind,
    lang: Language,
) -> Result<(), AppError> {
    println!("{}", report::action(lang, kind));
    let outcome = builder.replace(state, kind)?;
    log::debug!("置換後の段階: {:?}, 置換txid: {:?}", state.stage, state.replacement_txid);
    print_lines(report::replacement(lang, &outcome));
    print_lines(report::wallet_status(lang, state));
    Ok(())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
