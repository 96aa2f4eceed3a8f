//! ライフサイクルフェーズの標準実装
//!
//! フェーズの順序はインフラ先行です。起動はディレクトリ→ネットワーク→
//! モニタリング設定→filebeat→ノードコンテナの順で、ログが出始める前に
//! 収集側が立ち上がるようにしています。

use crate::monitoring;
use async_trait::async_trait;
use berth_docker::{BasicManager, Container, ContainerApi, MountKind};
use berth_node::Node;
use colored::Colorize;
use std::fmt;
use tracing::info;

/// statusフェーズが返すノードの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Stopped,
    /// コンテナの一部だけが稼働している、またはネットワークが無い
    Incomplete,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Running => "running",
            NodeStatus::Stopped => "stopped",
            NodeStatus::Incomplete => "incomplete",
        };
        f.write_str(s)
    }
}

/// ライフサイクルフェーズの実装
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn start(&self, node: &Node) -> anyhow::Result<()>;
    async fn stop(&self, node: &Node) -> anyhow::Result<()>;
    async fn status(&self, node: &Node) -> anyhow::Result<NodeStatus>;
    async fn remove_data(&self, node: &Node) -> anyhow::Result<()>;
    async fn remove_runtime(&self, node: &Node) -> anyhow::Result<()>;
}

/// コンテナ定義リストからライフサイクルを組み立てる標準実装
pub struct DockerLifecycleHandler {
    containers: Vec<Container>,
}

impl DockerLifecycleHandler {
    pub fn new(containers: Vec<Container>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl LifecycleHandler for DockerLifecycleHandler {
    async fn start(&self, node: &Node) -> anyhow::Result<()> {
        let manager = BasicManager::connect(node.clone()).await?;
        start_node(&manager, &self.containers).await
    }

    async fn stop(&self, node: &Node) -> anyhow::Result<()> {
        let manager = BasicManager::connect(node.clone()).await?;
        stop_node(&manager, &self.containers).await
    }

    async fn status(&self, node: &Node) -> anyhow::Result<NodeStatus> {
        let manager = BasicManager::connect(node.clone()).await?;
        status_node(&manager, &self.containers).await
    }

    async fn remove_data(&self, node: &Node) -> anyhow::Result<()> {
        let manager = BasicManager::connect(node.clone()).await?;
        remove_node_data(&manager, &self.containers).await
    }

    async fn remove_runtime(&self, node: &Node) -> anyhow::Result<()> {
        let manager = BasicManager::connect(node.clone()).await?;
        remove_node_runtime(&manager, &self.containers).await
    }
}

/// ネットワーク名（ディスクリプタにデフォルトが展開されていない場合の保険）
pub(crate) fn network_name(node: &Node) -> String {
    node.str_parameter("docker-network")
        .filter(|v| !v.is_empty())
        .unwrap_or("bpm")
        .to_string()
}

fn data_dir(node: &Node) -> String {
    node.str_parameter("data-dir")
        .filter(|v| !v.is_empty())
        .unwrap_or("data")
        .to_string()
}

pub(crate) async fn start_node<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<()> {
    let node = manager.node();

    // インフラを先に揃える
    std::fs::create_dir_all(node.logs_dir())?;
    std::fs::create_dir_all(node.resolve_path(data_dir(node)))?;
    manager.network_exists(&network_name(node)).await?;

    // ログ収集側をワークロードより先に立ち上げる
    monitoring::render_monitoring_config(node, containers)?;
    manager
        .container_runs(&monitoring::filebeat_container())
        .await?;

    for container in containers {
        manager.container_runs(container).await?;
    }

    info!(id = %node.id, containers = containers.len(), "Node started");
    Ok(())
}

pub(crate) async fn stop_node<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<()> {
    for container in containers {
        manager.container_stopped(&container.name).await?;
    }

    // ワークロードが止まってからログ収集を止める
    manager
        .container_stopped(monitoring::FILEBEAT_CONTAINER)
        .await?;
    Ok(())
}

pub(crate) async fn status_node<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<NodeStatus> {
    // ネットワークが無ければコンテナの状態にかかわらずincomplete
    if !manager
        .does_network_exist(&network_name(manager.node()))
        .await?
    {
        return Ok(NodeStatus::Incomplete);
    }

    let mut running = 0;
    for container in containers {
        if manager.is_container_running(&container.name).await? {
            running += 1;
        }
    }

    Ok(if running == 0 {
        NodeStatus::Stopped
    } else if running == containers.len() {
        NodeStatus::Running
    } else {
        NodeStatus::Incomplete
    })
}

/// ボリュームとデータディレクトリを削除する
///
/// ボリュームの削除は、依存するコンテナが先に削除済みであることが
/// 前提です（remove-runtimeを先に実行する）。この層では順序を強制
/// しません。
pub(crate) async fn remove_node_data<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<()> {
    for container in containers {
        for mount in &container.mounts {
            if mount.kind == MountKind::Volume {
                manager.volume_absent(&mount.source).await?;
            }
        }
    }

    let node = manager.node();
    let dir = node.resolve_path(data_dir(node));
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
        println!("  {} データディレクトリを削除: {}", "✓".green(), dir.display());
    } else {
        println!(
            "  {} データディレクトリは存在しません: {}",
            "ℹ".blue(),
            dir.display()
        );
    }

    Ok(())
}

/// 全コンテナ（filebeat含む）を削除する。ネットワーク・ボリューム・設定には触れない
pub(crate) async fn remove_node_runtime<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<()> {
    for container in containers {
        manager.container_absent(&container.name).await?;
    }

    manager
        .container_absent(monitoring::FILEBEAT_CONTAINER)
        .await?;
    Ok(())
}
