//! ノード固有シークレット（鍵など）の生成

use async_trait::async_trait;
use berth_node::Node;
use colored::Colorize;

/// identity機能の実装
///
/// `create_identity` は冪等でなければなりません。既にシークレットが
/// ある場合（ユーザーが手動で持ち込んだ場合を含む）は再生成せず、
/// そのまま残します。
#[async_trait]
pub trait IdentityCreator: Send + Sync {
    async fn create_identity(&self, node: &Node) -> anyhow::Result<()>;

    /// 生成済みシークレット一式を削除する
    ///
    /// 標準動作はsecretsディレクトリの削除です。シークレットを別の場所に
    /// 置くプラグインだけがオーバーライドします。
    async fn remove_identity(&self, node: &Node) -> anyhow::Result<()> {
        let dir = node.secrets_dir();

        if !dir.exists() {
            println!(
                "  {} シークレットディレクトリは存在しません: {}",
                "ℹ".blue(),
                dir.display()
            );
            return Ok(());
        }

        std::fs::remove_dir_all(&dir)?;
        println!(
            "  {} シークレットディレクトリを削除: {}",
            "✓".green(),
            dir.display()
        );
        Ok(())
    }
}
