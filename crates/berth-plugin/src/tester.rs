//! 稼働中ノードに対する検証スイート

use async_trait::async_trait;
use berth_node::Node;

/// test機能の実装
///
/// 戻り値は合否です。検証を実行できなかった場合（接続不能など）だけ
/// エラーを返します。合否はCLI境界で終了コードに変換されます。
#[async_trait]
pub trait Tester: Send + Sync {
    async fn test(&self, node: &Node) -> anyhow::Result<bool>;
}
