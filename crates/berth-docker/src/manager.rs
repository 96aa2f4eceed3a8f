//! リソース収束マネージャ
//!
//! 「あるべき状態」を宣言する操作群です。各操作は現在の状態を調べ、
//! 既に目標どおりなら何もせず、足りない分だけを実行します。
//! どの操作も途中失敗後にそのまま再実行できます。

use crate::api::{ContainerApi, CreatePlan, ResolvedMount};
use crate::docker::DockerApi;
use crate::error::{DockerError, Result};
use crate::spec::{Container, MountKind};
use berth_node::Node;
use berth_template::TemplateData;
use colored::Colorize;
use std::path::Path;
use tracing::debug;

/// ノード1台分のDockerリソースを収束させるマネージャ
pub struct BasicManager<A: ContainerApi> {
    api: A,
    node: Node,
}

impl BasicManager<DockerApi> {
    /// ローカルのDockerデーモンへ接続したマネージャを作る
    pub async fn connect(node: Node) -> Result<Self> {
        let api = DockerApi::connect().await?;
        Ok(Self { api, node })
    }
}

impl<A: ContainerApi> BasicManager<A> {
    pub fn new(api: A, node: Node) -> Self {
        Self { api, node }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// ネットワークが存在する状態にする
    ///
    /// ネットワーク名にはプレフィックスを付けません。複数ノードが同じ
    /// ネットワークを共有できるようにするためです。
    pub async fn network_exists(&self, name: &str) -> Result<()> {
        if self.api.does_network_exist(name).await? {
            println!("  {} ネットワーク '{}' は既に存在します", "ℹ".blue(), name);
            return Ok(());
        }

        self.api.create_network(name).await?;
        println!("  {} ネットワーク '{}' を作成しました", "✓".green(), name);
        Ok(())
    }

    /// ネットワークが存在しない状態にする（名前はプレフィックスなし）
    pub async fn network_absent(&self, name: &str) -> Result<()> {
        if !self.api.does_network_exist(name).await? {
            println!("  {} ネットワーク '{}' は存在しません", "ℹ".blue(), name);
            return Ok(());
        }

        self.api.remove_network(name).await?;
        println!("  {} ネットワーク '{}' を削除しました", "✓".green(), name);
        Ok(())
    }

    /// ボリュームが存在しない状態にする
    pub async fn volume_absent(&self, name: &str) -> Result<()> {
        let name = self.node.prefixed(name);

        if !self.api.does_volume_exist(&name).await? {
            println!("  {} ボリューム '{}' は存在しません", "ℹ".blue(), name);
            return Ok(());
        }

        self.api.remove_volume(&name).await?;
        println!("  {} ボリューム '{}' を削除しました", "✓".green(), name);
        Ok(())
    }

    /// コンテナが稼働している状態にする
    ///
    /// イメージのプルは毎回行います（既にあれば実質no-op）。コンテナが
    /// 無ければ作成し、停止していれば起動します。稼働中なら何もしません。
    pub async fn container_runs(&self, container: &Container) -> Result<()> {
        let name = self.node.prefixed(&container.name);

        self.api.pull_image(&container.image).await?;

        match self.api.container_state(&name).await? {
            None => {
                let plan = self.build_plan(container)?;
                self.api.create_container(&name, &plan).await?;
                self.api.start_container(&name).await?;
                println!("  {} コンテナ '{}' を作成・起動しました", "✓".green(), name);
            }
            Some(state) if !state.running => {
                self.api.start_container(&name).await?;
                println!("  {} コンテナ '{}' を起動しました", "✓".green(), name);
            }
            Some(_) => {
                println!("  {} コンテナ '{}' は稼働中です", "ℹ".blue(), name);
            }
        }

        Ok(())
    }

    /// コンテナが停止している状態にする（削除はしない）
    pub async fn container_stopped(&self, name: &str) -> Result<()> {
        let name = self.node.prefixed(name);

        match self.api.container_state(&name).await? {
            Some(state) if state.running => {
                self.api.stop_container(&name).await?;
                println!("  {} コンテナ '{}' を停止しました", "✓".green(), name);
            }
            Some(_) => {
                println!("  {} コンテナ '{}' は停止済みです", "ℹ".blue(), name);
            }
            None => {
                println!("  {} コンテナ '{}' は存在しません", "ℹ".blue(), name);
            }
        }

        Ok(())
    }

    /// コンテナが存在しない状態にする（匿名ボリュームも一緒に削除）
    pub async fn container_absent(&self, name: &str) -> Result<()> {
        let name = self.node.prefixed(name);

        match self.api.container_state(&name).await? {
            Some(state) => {
                if state.running {
                    self.api.stop_container(&name).await?;
                }
                self.api.remove_container(&name).await?;
                println!("  {} コンテナ '{}' を削除しました", "✓".green(), name);
            }
            None => {
                println!("  {} コンテナ '{}' は存在しません", "ℹ".blue(), name);
            }
        }

        Ok(())
    }

    /// 一時コンテナを実行し、終了を待って必ず削除する
    ///
    /// 終了コードが0以外なら、ログ出力を添えたエラーを返します。
    /// 削除は成否にかかわらず行うので、再実行時に古い一時コンテナが
    /// 残っていることはありません。
    pub async fn run_transient(&self, container: &Container) -> Result<String> {
        let name = self.node.prefixed(&container.name);

        self.container_runs(container).await?;

        let outcome = self.wait_and_collect(&name).await;
        self.container_absent(&container.name).await?;

        let (status, output) = outcome?;
        if status != 0 {
            return Err(DockerError::TransientContainerFailed {
                container: name,
                status,
                output,
            });
        }

        Ok(output)
    }

    async fn wait_and_collect(&self, name: &str) -> Result<(i64, String)> {
        let status = self.api.wait_container(name).await?;
        let output = self.api.container_logs(name).await?;
        debug!(container = %name, status, "Transient container finished");
        Ok((status, output))
    }

    /// コンテナが稼働中かどうか（存在しなければfalse）
    pub async fn is_container_running(&self, name: &str) -> Result<bool> {
        let name = self.node.prefixed(name);
        Ok(self
            .api
            .container_state(&name)
            .await?
            .is_some_and(|s| s.running))
    }

    /// コンテナが存在するかどうか（停止中も含む）
    pub async fn does_container_exist(&self, name: &str) -> Result<bool> {
        let name = self.node.prefixed(name);
        Ok(self.api.container_state(&name).await?.is_some())
    }

    /// ネットワークが存在するかどうか（名前はプレフィックスなし）
    pub async fn does_network_exist(&self, name: &str) -> Result<bool> {
        self.api.does_network_exist(name).await
    }

    /// ボリュームが存在するかどうか
    pub async fn does_volume_exist(&self, name: &str) -> Result<bool> {
        let name = self.node.prefixed(name);
        self.api.does_volume_exist(&name).await
    }

    /// 全コンテナ名の一覧（停止中も含む、プレフィックス付きのまま）
    pub async fn list_container_names(&self) -> Result<Vec<String>> {
        self.api.list_container_names().await
    }

    /// 全ボリューム名の一覧（プレフィックス付きのまま）
    pub async fn list_volume_ids(&self) -> Result<Vec<String>> {
        self.api.list_volume_ids().await
    }

    /// コンテナ定義を作成プランへ変換する
    ///
    /// - env_file / cmd_file はノードディレクトリ基準で読み込む
    /// - cmd が指定されていれば cmd_file より優先
    /// - マウント元はテンプレートとして展開してから、bindはパス解決、
    ///   volumeは名前にプレフィックスを付与
    fn build_plan(&self, container: &Container) -> Result<CreatePlan> {
        let data = TemplateData::new(&self.node);

        let env = match &container.env_file {
            Some(file) => read_lines(&self.node.resolve_path(file))?
                .into_iter()
                .filter(|line| line.contains('='))
                .collect(),
            None => Vec::new(),
        };

        let cmd = if !container.cmd.is_empty() {
            container.cmd.clone()
        } else if let Some(file) = &container.cmd_file {
            read_lines(&self.node.resolve_path(file))?
        } else {
            Vec::new()
        };

        let mut mounts = Vec::new();
        for mount in &container.mounts {
            let source = berth_template::render_str(&mount.source, &data)?;
            let source = match mount.kind {
                MountKind::Bind => self.node.resolve_path(&source).display().to_string(),
                MountKind::Volume => self.node.prefixed(&source),
            };
            mounts.push(ResolvedMount {
                kind: mount.kind,
                source,
                target: mount.target.clone(),
            });
        }

        Ok(CreatePlan {
            image: container.image.clone(),
            env,
            cmd,
            user: container.user.clone(),
            mounts,
            ports: container.ports.clone(),
            network: self.node.str_parameter("docker-network").map(String::from),
        })
    }
}

/// ファイルを行単位で読み、空行と前後の空白を取り除く
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path).map_err(|e| DockerError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Mount;
    use crate::testing::FakeApi;

    fn test_node(dir: &Path) -> Node {
        let mut node = Node::new(dir.join("node.json"), "node1");
        node.plugin_name = "dummy".to_string();
        node.str_parameters
            .insert("docker-network".to_string(), "bpm".to_string());
        node.str_parameters
            .insert("data-dir".to_string(), "data".to_string());
        node
    }

    fn validator() -> Container {
        let mut container = Container::new("validator", "chain/validator:1.0.0");
        container.mounts = vec![Mount::volume("chain-data", "/data")];
        container
    }

    #[tokio::test]
    async fn test_container_runs_creates_and_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));

        manager.container_runs(&validator()).await.unwrap();

        assert!(manager.api().is_running("berth-node1-validator"));
        assert_eq!(manager.api().pulled(), vec!["chain/validator:1.0.0"]);
        assert_eq!(
            manager.api().mutations(),
            vec!["create berth-node1-validator", "start berth-node1-validator"]
        );
    }

    #[tokio::test]
    async fn test_container_runs_second_call_mutates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));
        let container = validator();

        manager.container_runs(&container).await.unwrap();
        manager.api().reset_mutations();

        manager.container_runs(&container).await.unwrap();

        // イメージのプルだけは毎回行う
        assert_eq!(manager.api().mutation_count(), 0);
        assert_eq!(manager.api().pulled().len(), 2);
    }

    #[tokio::test]
    async fn test_container_runs_starts_existing_stopped_container() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeApi::new().with_container("berth-node1-validator", false);
        let manager = BasicManager::new(api, test_node(tmp.path()));

        manager.container_runs(&validator()).await.unwrap();

        assert_eq!(
            manager.api().mutations(),
            vec!["start berth-node1-validator"],
            "既存コンテナは作り直さない"
        );
    }

    #[tokio::test]
    async fn test_container_stopped_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeApi::new().with_container("berth-node1-validator", true);
        let manager = BasicManager::new(api, test_node(tmp.path()));

        manager.container_stopped("validator").await.unwrap();
        assert!(!manager.api().is_running("berth-node1-validator"));
        assert!(manager.api().has_container("berth-node1-validator"));

        manager.api().reset_mutations();
        manager.container_stopped("validator").await.unwrap();
        assert_eq!(manager.api().mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_container_absent_stops_then_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeApi::new().with_container("berth-node1-validator", true);
        let manager = BasicManager::new(api, test_node(tmp.path()));

        manager.container_absent("validator").await.unwrap();

        assert!(!manager.api().has_container("berth-node1-validator"));
        assert_eq!(
            manager.api().mutations(),
            vec!["stop berth-node1-validator", "remove berth-node1-validator"]
        );
    }

    #[tokio::test]
    async fn test_container_absent_on_missing_container_mutates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));

        manager.container_absent("validator").await.unwrap();
        assert_eq!(manager.api().mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_network_exists_creates_once() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));

        manager.network_exists("bpm").await.unwrap();
        // ネットワーク名にはプレフィックスを付けない
        assert!(manager.api().has_network("bpm"));

        manager.api().reset_mutations();
        manager.network_exists("bpm").await.unwrap();
        assert_eq!(manager.api().mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_network_absent_removes_existing_network() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeApi::new().with_network("bpm");
        let manager = BasicManager::new(api, test_node(tmp.path()));

        manager.network_absent("bpm").await.unwrap();
        assert!(!manager.api().has_network("bpm"));
        assert_eq!(manager.api().mutations(), vec!["remove-network bpm"]);
    }

    #[tokio::test]
    async fn test_network_absent_on_missing_network_mutates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));

        manager.network_absent("bpm").await.unwrap();
        assert_eq!(manager.api().mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_volume_absent_removes_prefixed_volume() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeApi::new().with_volume("berth-node1-chain-data");
        let manager = BasicManager::new(api, test_node(tmp.path()));

        assert!(manager.does_volume_exist("chain-data").await.unwrap());
        manager.volume_absent("chain-data").await.unwrap();
        assert!(!manager.api().has_volume("berth-node1-chain-data"));
        assert!(!manager.does_volume_exist("chain-data").await.unwrap());

        manager.api().reset_mutations();
        manager.volume_absent("chain-data").await.unwrap();
        assert_eq!(manager.api().mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_run_transient_removes_container_on_success() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));
        let mut container = Container::new("tester", "chain/tester:1.0.0");
        container.cmd = vec!["check".to_string()];

        manager.api().set_logs("berth-node1-tester", "all checks passed\n");
        let output = manager.run_transient(&container).await.unwrap();

        assert_eq!(output, "all checks passed\n");
        assert!(!manager.api().has_container("berth-node1-tester"));
    }

    #[tokio::test]
    async fn test_run_transient_reports_failure_with_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));
        let container = Container::new("tester", "chain/tester:1.0.0");

        manager.api().set_exit_code("berth-node1-tester", 2);
        manager.api().set_logs("berth-node1-tester", "rpc unreachable\n");

        let err = manager.run_transient(&container).await.unwrap_err();
        match err {
            DockerError::TransientContainerFailed {
                container,
                status,
                output,
            } => {
                assert_eq!(container, "berth-node1-tester");
                assert_eq!(status, 2);
                assert!(output.contains("rpc unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // 失敗してもコンテナは残さない
        assert!(!manager.api().has_container("berth-node1-tester"));
    }

    #[tokio::test]
    async fn test_list_queries_return_empty_without_error() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BasicManager::new(FakeApi::new(), test_node(tmp.path()));

        assert!(manager.list_container_names().await.unwrap().is_empty());
        assert!(manager.list_volume_ids().await.unwrap().is_empty());
        assert!(!manager.is_container_running("validator").await.unwrap());
        assert!(!manager.does_container_exist("validator").await.unwrap());
        assert!(!manager.does_network_exist("bpm").await.unwrap());
    }

    #[tokio::test]
    async fn test_build_plan_translates_files_and_mounts() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        std::fs::create_dir_all(node.configs_dir()).unwrap();
        std::fs::write(
            node.configs_dir().join("validator.env"),
            "RUST_LOG=info\n\nCHAIN=main\nnot-an-env-line\n",
        )
        .unwrap();
        std::fs::write(
            node.configs_dir().join("validator.cmd"),
            "run\n  --chain=main  \n\n",
        )
        .unwrap();

        let mut container = validator();
        container.env_file = Some("configs/validator.env".to_string());
        container.cmd = Vec::new();
        container.cmd_file = Some("configs/validator.cmd".to_string());
        container
            .mounts
            .push(Mount::bind("{{ node.str_parameters['data-dir'] }}", "/host-data"));

        let manager = BasicManager::new(FakeApi::new(), node);
        manager.container_runs(&container).await.unwrap();

        let plan = manager.api().plan_for("berth-node1-validator").unwrap();
        assert_eq!(plan.env, vec!["RUST_LOG=info", "CHAIN=main"]);
        assert_eq!(plan.cmd, vec!["run", "--chain=main"]);
        assert_eq!(plan.network.as_deref(), Some("bpm"));

        // volumeマウントはプレフィックス付与、bindマウントはパス解決
        assert_eq!(plan.mounts[0].source, "berth-node1-chain-data");
        assert_eq!(
            plan.mounts[1].source,
            tmp.path().join("data").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_cmd_literal_wins_over_cmd_file() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());

        let mut container = Container::new("validator", "chain/validator:1.0.0");
        container.cmd = vec!["run".to_string()];
        container.cmd_file = Some("configs/missing.cmd".to_string());

        let manager = BasicManager::new(FakeApi::new(), node);
        // cmdが指定されていればcmd_fileは読まれない（存在しなくてもよい）
        manager.container_runs(&container).await.unwrap();

        let plan = manager.api().plan_for("berth-node1-validator").unwrap();
        assert_eq!(plan.cmd, vec!["run"]);
    }
}
