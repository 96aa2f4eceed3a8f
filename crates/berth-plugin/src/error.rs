//! SDK層のエラー型
//!
//! 各フェーズ実装はanyhowでエラーを運び、CLI境界でこの型の
//! メッセージか根本原因がstderrへ出力されます。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    /// フェーズが制限時間内に完了しなかった
    ///
    /// 部分的に進んだ状態で打ち切られても、全操作が冪等なので
    /// そのまま再実行すれば収束します。
    #[error(
        "フェーズ '{phase}' が制限時間（{seconds}秒）を超過しました\n\
         \n\
         ヒント:\n\
         - すべての操作は冪等なので、同じコマンドをそのまま再実行できます\n\
         - イメージのプルが遅い場合はネットワーク帯域を確認してください"
    )]
    Timeout { phase: &'static str, seconds: u64 },

    /// 未配線のオプション機能が呼び出された
    #[error(
        "このプラグインは '{phase}' をサポートしていません\n\
         \n\
         ヒント: `meta` コマンドの supported フィールドで対応機能を確認できます"
    )]
    Unsupported { phase: &'static str },

    /// パラメータ検証の失敗（変更操作の前に検出される）
    #[error("パラメータ検証に失敗しました:\n{}", problems.join("\n"))]
    Validation { problems: Vec<String> },
}
