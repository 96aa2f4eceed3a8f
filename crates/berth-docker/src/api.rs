//! コンテナランタイムへの細粒度インターフェース
//!
//! 収束ロジック（[`crate::BasicManager`]）はこのトレイト越しにランタイムを
//! 呼びます。本番実装は [`crate::DockerApi`]、テストでは
//! [`crate::testing::FakeApi`] を差し込みます。
//!
//! 「見つからない」は `None` / `false` として返し、エラーにしません。
//! エラーとして伝播するのはランタイム側の本当の失敗だけです。

use crate::error::Result;
use crate::spec::{MountKind, Port};
use async_trait::async_trait;

/// コンテナの現在状態（inspect結果の要約）
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerState {
    pub running: bool,
}

/// 解決済みのマウント（テンプレート展開・プレフィックス付与済み）
#[derive(Debug, Clone)]
pub struct ResolvedMount {
    pub kind: MountKind,
    pub source: String,
    pub target: String,
}

/// コンテナ作成の完全解決済み内容
///
/// 論理名の解決、テンプレート式の展開、コマンドファイルの読み込みを終えた
/// 「ランタイムにそのまま渡せる」状態。
#[derive(Debug, Clone, Default)]
pub struct CreatePlan {
    pub image: String,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub user: Option<String>,
    pub mounts: Vec<ResolvedMount>,
    pub ports: Vec<Port>,
    /// 接続するDockerネットワーク名（プレフィックスなしの生の名前）
    pub network: Option<String>,
}

/// ランタイムクライアントの操作一覧
#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// イメージをプルする（毎回呼ばれる前提。プル自体が冪等）
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// コンテナの状態を問い合わせる。存在しなければ `None`
    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>>;

    async fn create_container(&self, name: &str, plan: &CreatePlan) -> Result<()>;

    async fn start_container(&self, name: &str) -> Result<()>;

    /// タイムアウト指定なしの graceful stop
    async fn stop_container(&self, name: &str) -> Result<()>;

    /// コンテナと、それに付随する匿名ボリュームを削除する
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// コンテナの終了を待って終了コードを返す
    async fn wait_container(&self, name: &str) -> Result<i64>;

    /// stdout/stderrを合わせたログ全文を取得する
    async fn container_logs(&self, name: &str) -> Result<String>;

    /// 全コンテナ名（停止中を含む、先頭の `/` は除去済み）
    async fn list_container_names(&self) -> Result<Vec<String>>;

    async fn does_network_exist(&self, name: &str) -> Result<bool>;

    async fn create_network(&self, name: &str) -> Result<()>;

    async fn remove_network(&self, name: &str) -> Result<()>;

    async fn does_volume_exist(&self, name: &str) -> Result<bool>;

    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// 全ボリューム名（名前がそのままIDになる）
    async fn list_volume_ids(&self) -> Result<Vec<String>>;
}
