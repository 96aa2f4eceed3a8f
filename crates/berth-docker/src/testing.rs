//! テスト用のインメモリ [`ContainerApi`] 実装
//!
//! Dockerデーモンなしで収束ロジックを検証するためのフェイクです。
//! 状態を変更する呼び出しをすべて記録するので、「2回目の実行では
//! 何も変更しない」という冪等性の検証に使えます。イメージのプルは
//! 状態を変更しないため、変更操作とは別に記録します。

use crate::api::{ContainerApi, ContainerState, CreatePlan};
use crate::error::{DockerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    containers: BTreeMap<String, ContainerState>,
    plans: BTreeMap<String, CreatePlan>,
    networks: BTreeSet<String>,
    volumes: BTreeSet<String>,
    pulled: Vec<String>,
    mutations: Vec<String>,
    exit_codes: BTreeMap<String, i64>,
    logs: BTreeMap<String, String>,
}

/// 記録付きのフェイクランタイム
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// ネットワークが既に存在する状態から始める
    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().unwrap().networks.insert(name.to_string());
        self
    }

    /// ボリュームが既に存在する状態から始める
    pub fn with_volume(self, name: &str) -> Self {
        self.state.lock().unwrap().volumes.insert(name.to_string());
        self
    }

    /// コンテナが既に存在する状態から始める
    pub fn with_container(self, name: &str, running: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(name.to_string(), ContainerState { running });
        self
    }

    /// wait_containerが返す終了コードを設定する
    pub fn set_exit_code(&self, name: &str, code: i64) {
        self.state
            .lock()
            .unwrap()
            .exit_codes
            .insert(name.to_string(), code);
    }

    /// container_logsが返す出力を設定する
    pub fn set_logs(&self, name: &str, output: &str) {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert(name.to_string(), output.to_string());
    }

    /// これまでに記録された変更操作
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations.len()
    }

    /// 変更操作の記録をクリアする（2回目の実行を検証する前に呼ぶ）
    pub fn reset_mutations(&self) {
        self.state.lock().unwrap().mutations.clear();
    }

    /// プルされたイメージの一覧
    pub fn pulled(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled.clone()
    }

    /// create_containerに渡されたプラン
    pub fn plan_for(&self, name: &str) -> Option<CreatePlan> {
        self.state.lock().unwrap().plans.get(name).cloned()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.state.lock().unwrap().containers.contains_key(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(name)
            .is_some_and(|s| s.running)
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().unwrap().networks.contains(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.state.lock().unwrap().volumes.contains(name)
    }

    fn record(&self, op: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .mutations
            .push(format!("{op} {name}"));
    }
}

#[async_trait]
impl ContainerApi for FakeApi {
    async fn pull_image(&self, image: &str) -> Result<()> {
        self.state.lock().unwrap().pulled.push(image.to_string());
        Ok(())
    }

    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>> {
        Ok(self.state.lock().unwrap().containers.get(name).copied())
    }

    async fn create_container(&self, name: &str, plan: &CreatePlan) -> Result<()> {
        self.record("create", name);
        let mut state = self.state.lock().unwrap();
        state
            .containers
            .insert(name.to_string(), ContainerState { running: false });
        state.plans.insert(name.to_string(), plan.clone());
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.record("start", name);
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(s) => {
                s.running = true;
                Ok(())
            }
            None => Err(DockerError::Api(format!("no such container: {name}"))),
        }
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.record("stop", name);
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(s) => {
                s.running = false;
                Ok(())
            }
            None => Err(DockerError::Api(format!("no such container: {name}"))),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record("remove", name);
        let mut state = self.state.lock().unwrap();
        if state.containers.remove(name).is_none() {
            return Err(DockerError::Api(format!("no such container: {name}")));
        }
        state.plans.remove(name);
        Ok(())
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.containers.get_mut(name) {
            s.running = false;
        }
        Ok(state.exit_codes.get(name).copied().unwrap_or(0))
    }

    async fn container_logs(&self, name: &str) -> Result<String> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .logs
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_container_names(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .keys()
            .cloned()
            .collect())
    }

    async fn does_network_exist(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().networks.contains(name))
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        self.record("create-network", name);
        self.state.lock().unwrap().networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.record("remove-network", name);
        if !self.state.lock().unwrap().networks.remove(name) {
            return Err(DockerError::Api(format!("no such network: {name}")));
        }
        Ok(())
    }

    async fn does_volume_exist(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().volumes.contains(name))
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.record("remove-volume", name);
        if !self.state.lock().unwrap().volumes.remove(name) {
            return Err(DockerError::Api(format!("no such volume: {name}")));
        }
        Ok(())
    }

    async fn list_volume_ids(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().volumes.iter().cloned().collect())
    }
}
