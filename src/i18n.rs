//! 表示用メッセージの翻訳テーブル。中核のロジックは表示文字列を持たない。

use std::fmt::Display;

use crate::error::AppError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Language {
    En,
    Ar,
    Ja,
}

pub fn parse_language(lang_str: &str) -> Result<Language, AppError> {
    match lang_str.to_lowercase().as_str() {
        "en" | "english" => Ok(Language::En),
        "ar" | "arabic" => Ok(Language::Ar),
        "ja" | "japanese" => Ok(Language::Ja),
        s => Err(AppError::InputValidation(format!("無効な言語が指定されました: {}", s))),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Connected,
    WalletBalance,
    ActionCreate,
    ActionKill,
    ActionStop,
    SuccessChain,
    SuccessKill,
    SuccessStop,
    ChainCreated,
    KillActivated,
    AllStopped,
    ParentTxid,
    ChildTxid,
    RbfTxid,
    WalletAddresses,
    WalletA,
    WalletB,
    WalletC,
    SelectedUtxo,
    ChainInvalidated,
    FundsReturned,
    ChainIncomplete,
    ResumeHint,
    PressEnter,
    PlanHeader,
    PlanParent,
    PlanChild,
    PlanReplacement,
    WalletCFunded,
    WalletCEmpty,
    StatusAwaiting,
    StatusReturned,
    Error,
}

pub fn text(lang: Language, kind: MessageKind) -> &'static str {
    match lang {
        Language::En => english(kind),
        Language::Ar => arabic(kind),
        Language::Ja => japanese(kind),
    }
}

/// テンプレート中の `{}` を先頭から順に引数で置き換える。
pub fn render(lang: Language, kind: MessageKind, args: &[&dyn Display]) -> String {
    let mut parts = text(lang, kind).split("{}");
    let mut out = String::from(parts.next().unwrap_or_default());
    for (i, part) in parts.enumerate() {
        if let Some(arg) = args.get(i) {
            out.push_str(&arg.to_string());
        }
        out.push_str(part);
    }
    out
}

fn english(kind: MessageKind) -> &'static str {
    use MessageKind::*;
    match kind {
        Connected => "Connected to Bitcoin Node (Blocks: {})",
        WalletBalance => "Wallet balance: {} BTC",
        ActionCreate => "ACTION: Creating transaction chain with {} BTC",
        ActionKill => "ACTION: Activating kill switch (RBF)",
        ActionStop => "ACTION: Stopping all transactions and returning funds to Wallet A",
        SuccessChain => "SUCCESS: Transaction chain created",
        SuccessKill => "SUCCESS: Kill switch activated",
        SuccessStop => "SUCCESS: All transactions stopped, funds returned to Wallet A",
        ChainCreated => "=== TRANSACTION CHAIN CREATED ===",
        KillActivated => "=== KILL SWITCH ACTIVATED (RBF) ===",
        AllStopped => "=== ALL TRANSACTIONS STOPPED ===",
        ParentTxid => "Parent TXID: {}",
        ChildTxid => "Child TXID: {}",
        RbfTxid => "RBF TXID: {}",
        WalletAddresses => "=== WALLET ADDRESSES ===",
        WalletA => "Wallet A (Original): {}",
        WalletB => "Wallet B (Change): {}",
        WalletC => "Wallet C (Receiver): {}",
        SelectedUtxo => "Selected UTXO: {} ({} sats)",
        ChainInvalidated => "Transaction chain invalidated",
        FundsReturned => "Funds returned to Wallet A.",
        ChainIncomplete => "Parent broadcast but the chain is incomplete; original input {} can still be replaced.",
        ResumeHint => "To cancel later: kill --utxo {} --value {}",
        PressEnter => "Press Enter to activate the kill switch (RBF)...",
        PlanHeader => "=== TRANSACTION PLAN (not broadcast) ===",
        PlanParent => "Parent: fee {} sats, output {} sats to {}",
        PlanChild => "Child: fee {} sats, send {} sats, change {} sats",
        PlanReplacement => "Replacement: fee {} sats, return {} sats to {}",
        WalletCFunded => "Wallet C: Funds received (unconfirmed)",
        WalletCEmpty => "Wallet C: No funds",
        StatusAwaiting => "Status: Awaiting confirmation or transaction cancellation",
        StatusReturned => "Status: Funds returned to Wallet A",
        Error => "ERROR: {}",
    }
}

fn arabic(kind: MessageKind) -> &'static str {
    use MessageKind::*;
    match kind {
        Connected => "متصل بعقدة بتكوين (الكتل: {})",
        WalletBalance => "رصيد المحفظة: {} BTC",
        ActionCreate => "إجراء: إنشاء سلسلة معاملات بمبلغ {} BTC",
        ActionKill => "إجراء: تفعيل مفتاح الإنهاء (RBF)",
        ActionStop => "إجراء: إيقاف جميع المعاملات وإعادة الأموال إلى المحفظة أ",
        SuccessChain => "نجاح: تم إنشاء سلسلة المعاملات",
        SuccessKill => "نجاح: تم تفعيل مفتاح الإنهاء",
        SuccessStop => "نجاح: تم إيقاف جميع المعاملات، وتمت إعادة الأموال إلى المحفظة أ",
        ChainCreated => "=== تم إنشاء سلسلة المعاملات ===",
        KillActivated => "=== تم تفعيل مفتاح الإنهاء (RBF) ===",
        AllStopped => "=== تم إيقاف جميع المعاملات ===",
        ParentTxid => "معرف المعاملة الأصل: {}",
        ChildTxid => "معرف المعاملة الفرعية: {}",
        RbfTxid => "معرف معاملة RBF: {}",
        WalletAddresses => "=== عناوين المحافظ ===",
        WalletA => "المحفظة أ (الأصلية): {}",
        WalletB => "المحفظة ب (الباقي): {}",
        WalletC => "المحفظة ج (المستلمة): {}",
        SelectedUtxo => "UTXO المحدد: {} ({} sats)",
        ChainInvalidated => "تم إبطال سلسلة المعاملات",
        FundsReturned => "تمت إعادة الأموال إلى المحفظة أ.",
        ChainIncomplete => "تم بث المعاملة الأصل لكن السلسلة غير مكتملة؛ لا يزال بالإمكان استبدال المدخل الأصلي {}.",
        ResumeHint => "للإلغاء لاحقًا: kill --utxo {} --value {}",
        PressEnter => "اضغط Enter لتفعيل مفتاح الإنهاء (RBF)...",
        PlanHeader => "=== خطة المعاملات (لم تُبث) ===",
        PlanParent => "الأصل: رسوم {} sats، الناتج {} sats إلى {}",
        PlanChild => "الفرعية: رسوم {} sats، إرسال {} sats، الباقي {} sats",
        PlanReplacement => "الاستبدال: رسوم {} sats، إعادة {} sats إلى {}",
        WalletCFunded => "المحفظة ج: تحتوي على الأموال (غير مؤكدة)",
        WalletCEmpty => "المحفظة ج: لا تحتوي على الأموال",
        StatusAwaiting => "الحالة: في انتظار التأكيد أو إلغاء المعاملة",
        StatusReturned => "الحالة: الأموال عادت إلى المحفظة أ",
        Error => "خطأ: {}",
    }
}

fn japanese(kind: MessageKind) -> &'static str {
    use MessageKind::*;
    match kind {
        Connected => "Bitcoinノードに接続しました (ブロック数: {})",
        WalletBalance => "ウォレット残高: {} BTC",
        ActionCreate => "操作: {} BTC でトランザクションチェーンを作成します",
        ActionKill => "操作: キルスイッチ (RBF) を発動します",
        ActionStop => "操作: すべてのトランザクションを停止し、資金を Wallet A に戻します",
        SuccessChain => "成功: トランザクションチェーンを作成しました",
        SuccessKill => "成功: キルスイッチを発動しました",
        SuccessStop => "成功: すべてのトランザクションを停止し、資金を Wallet A に戻しました",
        ChainCreated => "=== トランザクションチェーン作成完了 ===",
        KillActivated => "=== キルスイッチ発動 (RBF) ===",
        AllStopped => "=== 全トランザクション停止 ===",
        ParentTxid => "親TXID: {}",
        ChildTxid => "子TXID: {}",
        RbfTxid => "RBF TXID: {}",
        WalletAddresses => "=== ウォレットアドレス ===",
        WalletA => "Wallet A (送金元): {}",
        WalletB => "Wallet B (おつり): {}",
        WalletC => "Wallet C (受取人): {}",
        SelectedUtxo => "選択したUTXO: {} ({} sats)",
        ChainInvalidated => "トランザクションチェーンは無効化されました",
        FundsReturned => "資金は Wallet A に戻されました。",
        ChainIncomplete => "親はブロードキャスト済みですがチェーンは未完成です。元の入力 {} はまだ置換できます。",
        ResumeHint => "後で取り消すには: kill --utxo {} --value {}",
        PressEnter => "Enterキーを押すとキルスイッチ (RBF) を発動します...",
        PlanHeader => "=== トランザクション計画 (未ブロードキャスト) ===",
        PlanParent => "親: 手数料 {} sats, 出力 {} sats → {}",
        PlanChild => "子: 手数料 {} sats, 送金 {} sats, おつり {} sats",
        PlanReplacement => "置換: 手数料 {} sats, 返金 {} sats → {}",
        WalletCFunded => "Wallet C: 資金受領済み (未承認)",
        WalletCEmpty => "Wallet C: 資金なし",
        StatusAwaiting => "状態: 承認待ち、またはトランザクションの取り消し待ち",
        StatusReturned => "状態: 資金は Wallet A に戻されました",
        Error => "エラー: {}",
    }
}
