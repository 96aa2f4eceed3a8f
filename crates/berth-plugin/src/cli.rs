//! プラグインのCLI境界
//!
//! オーケストレータが呼び出す契約そのものです。フェーズごとに1サブ
//! コマンド、`meta` 以外はディスクリプタファイルのパスを1つ取ります。
//! 成功は終了コード0、失敗は非0で、エラーはstderrに出ます。
//! statusの結果とmetaの出力だけが機械可読のstdout出力です。

use crate::error::PluginError;
use crate::plugin::Plugin;
use berth_node::Node;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

// フェーズごとの制限時間（秒）。起動はイメージのプルを含むため長めに取る
const TIMEOUT_SETUP: u64 = 60;
const TIMEOUT_START: u64 = 180;
const TIMEOUT_QUERY: u64 = 120;
const TIMEOUT_REMOVE_RUNTIME: u64 = 240;

#[derive(Parser)]
#[command(about = "ノードライフサイクルプラグイン", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// ディスクリプタのパラメータをスキーマに照らして検証する
    ValidateParameters { node_file: PathBuf },
    /// ノード固有のシークレットを生成する
    CreateIdentity { node_file: PathBuf },
    /// 設定ファイルを生成する（既存ファイルは上書きしない）
    CreateConfigurations { node_file: PathBuf },
    /// ノードを起動する
    Start { node_file: PathBuf },
    /// ノードを停止する（データとネットワークは残る）
    Stop { node_file: PathBuf },
    /// ノードの状態を表示する（running | stopped | incomplete）
    Status { node_file: PathBuf },
    /// 生成した設定ファイルを削除する
    RemoveConfig { node_file: PathBuf },
    /// ボリュームとデータディレクトリを削除する
    RemoveData { node_file: PathBuf },
    /// 全コンテナを削除する（ネットワーク・ボリューム・設定は残る）
    RemoveRuntime { node_file: PathBuf },
    /// 生成したシークレットを削除する
    RemoveIdentity { node_file: PathBuf },
    /// ノードを新しいバージョンへアップグレードする
    Upgrade { node_file: PathBuf },
    /// 稼働中のノードに対して検証スイートを実行する
    Test { node_file: PathBuf },
    /// プラグイン情報をYAMLで出力する
    Meta,
}

/// プラグインのエントリポイント
///
/// ```no_run
/// # use berth_plugin::{cli, Plugin};
/// # async fn example(plugin: Plugin) -> anyhow::Result<()> {
/// cli::run(plugin).await
/// # }
/// ```
pub async fn run(plugin: Plugin) -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    dispatch(plugin, cli.command).await
}

async fn dispatch(plugin: Plugin, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Meta => {
            print!("{}", plugin.meta());
            Ok(())
        }
        Command::ValidateParameters { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout("validate-parameters", TIMEOUT_SETUP, async {
                plugin.validator().validate(&node, &plugin.parameters).await
            })
            .await
        }
        Command::CreateIdentity { node_file } => {
            let identity = plugin
                .identity()
                .ok_or(PluginError::Unsupported { phase: "create-identity" })?;
            let node = Node::load(node_file)?;
            with_timeout("create-identity", TIMEOUT_SETUP, identity.create_identity(&node)).await
        }
        Command::CreateConfigurations { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout(
                "create-configurations",
                TIMEOUT_SETUP,
                plugin.configurator().configure(&node),
            )
            .await
        }
        Command::Start { node_file } => {
            let mut node = Node::load(node_file)?;
            with_timeout("start", TIMEOUT_START, plugin.lifecycle().start(&node)).await?;
            write_version(&mut node, &plugin)?;
            Ok(())
        }
        Command::Stop { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout("stop", TIMEOUT_QUERY, plugin.lifecycle().stop(&node)).await
        }
        Command::Status { node_file } => {
            let node = Node::load(node_file)?;
            let status =
                with_timeout("status", TIMEOUT_QUERY, plugin.lifecycle().status(&node)).await?;
            println!("{status}");
            Ok(())
        }
        Command::RemoveConfig { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout(
                "remove-config",
                TIMEOUT_SETUP,
                plugin.configurator().remove_config(&node),
            )
            .await
        }
        Command::RemoveData { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout(
                "remove-data",
                TIMEOUT_QUERY,
                plugin.lifecycle().remove_data(&node),
            )
            .await
        }
        Command::RemoveRuntime { node_file } => {
            let node = Node::load(node_file)?;
            with_timeout(
                "remove-runtime",
                TIMEOUT_REMOVE_RUNTIME,
                plugin.lifecycle().remove_runtime(&node),
            )
            .await
        }
        Command::RemoveIdentity { node_file } => {
            let identity = plugin
                .identity()
                .ok_or(PluginError::Unsupported { phase: "remove-identity" })?;
            let node = Node::load(node_file)?;
            with_timeout("remove-identity", TIMEOUT_SETUP, identity.remove_identity(&node)).await
        }
        Command::Upgrade { node_file } => {
            let upgrader = plugin
                .upgrader()
                .ok_or(PluginError::Unsupported { phase: "upgrade" })?;
            let mut node = Node::load(node_file)?;
            with_timeout("upgrade", TIMEOUT_QUERY, upgrader.upgrade(&node)).await?;
            write_version(&mut node, &plugin)?;
            Ok(())
        }
        Command::Test { node_file } => {
            let tester = plugin
                .tester()
                .ok_or(PluginError::Unsupported { phase: "test" })?;
            let node = Node::load(node_file)?;
            let passed = with_timeout("test", TIMEOUT_QUERY, tester.test(&node)).await?;
            if !passed {
                anyhow::bail!("テストに失敗しました");
            }
            Ok(())
        }
    }
}

/// 起動・アップグレード成功後にプラグインのバージョンを記録する
fn write_version(node: &mut Node, plugin: &Plugin) -> anyhow::Result<()> {
    node.version = plugin.version.clone();
    node.save()?;
    debug!(id = %node.id, version = %node.version, "Recorded plugin version");
    Ok(())
}

async fn with_timeout<T>(
    phase: &'static str,
    seconds: u64,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
        Ok(result) => result,
        Err(_) => Err(PluginError::Timeout { phase, seconds }.into()),
    }
}
