//! アップグレード戦略

use async_trait::async_trait;
use berth_docker::{BasicManager, Container, ContainerApi};
use berth_node::Node;
use tracing::info;

/// upgrade機能の実装
#[async_trait]
pub trait Upgrader: Send + Sync {
    async fn upgrade(&self, node: &Node) -> anyhow::Result<()>;
}

/// コンテナの作り直しによる標準アップグレード
///
/// 稼働中だったコンテナを記録してから全コンテナを削除し、稼働して
/// いたものだけを再作成・起動します。再作成時のイメージプルで新しい
/// タグの内容が取り込まれます。設定の変更やデータ移行が必要な
/// アップグレードには、プラグイン独自の [`Upgrader`] を実装して
/// 差し替えてください。
pub struct DockerUpgrader {
    containers: Vec<Container>,
}

impl DockerUpgrader {
    pub fn new(containers: Vec<Container>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Upgrader for DockerUpgrader {
    async fn upgrade(&self, node: &Node) -> anyhow::Result<()> {
        let manager = BasicManager::connect(node.clone()).await?;
        upgrade_node(&manager, &self.containers).await
    }
}

pub(crate) async fn upgrade_node<A: ContainerApi>(
    manager: &BasicManager<A>,
    containers: &[Container],
) -> anyhow::Result<()> {
    // 現在稼働中のコンテナを記録
    let mut previously_running = Vec::new();
    for container in containers {
        if manager.is_container_running(&container.name).await? {
            previously_running.push(container);
        }
    }

    for container in containers {
        manager.container_absent(&container.name).await?;
    }

    // 稼働していたものだけを新しいイメージで起動し直す
    for container in &previously_running {
        manager.container_runs(container).await?;
    }

    info!(
        id = %manager.node().id,
        restarted = previously_running.len(),
        removed = containers.len(),
        "Upgrade complete"
    );
    Ok(())
}
