//! プラグイン定義

use crate::configure::{Configurator, FileConfigurator};
use crate::identity::IdentityCreator;
use crate::lifecycle::{DockerLifecycleHandler, LifecycleHandler};
use crate::meta::{self, Capability, MetaInfo, Parameter, PROTOCOL_VERSION};
use crate::tester::Tester;
use crate::upgrade::{DockerUpgrader, Upgrader};
use crate::validator::{ParameterValidator, SimpleParameterValidator};
use berth_docker::Container;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// プラグイン1つ分の定義
///
/// 必須の実装（検証・設定・ライフサイクル）と、オプション機能
/// （identity・upgrade・test）の差し込み口を持ちます。
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub description: String,
    pub parameters: Vec<Parameter>,

    validator: Box<dyn ParameterValidator>,
    configurator: Box<dyn Configurator>,
    lifecycle: Box<dyn LifecycleHandler>,

    identity: Option<Box<dyn IdentityCreator>>,
    upgrader: Option<Box<dyn Upgrader>>,
    tester: Option<Box<dyn Tester>>,
}

impl Plugin {
    /// Dockerコンテナベースのプラグインを標準構成で組み立てる
    ///
    /// 検証はスキーマ駆動、設定はテンプレート集合、ライフサイクルと
    /// アップグレードはコンテナ定義リストから導出されます。宣言した
    /// パラメータにはSDK共通パラメータが追記されます。
    pub fn docker(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<Parameter>,
        templates: BTreeMap<PathBuf, String>,
        containers: Vec<Container>,
    ) -> Self {
        let mut parameters = parameters;
        parameters.extend(meta::sdk_parameters());

        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            parameters,
            validator: Box::new(SimpleParameterValidator),
            configurator: Box::new(FileConfigurator::new(templates)),
            lifecycle: Box::new(DockerLifecycleHandler::new(containers.clone())),
            identity: None,
            upgrader: Some(Box::new(DockerUpgrader::new(containers))),
            tester: None,
        }
    }

    pub fn with_validator(mut self, validator: impl ParameterValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_configurator(mut self, configurator: impl Configurator + 'static) -> Self {
        self.configurator = Box::new(configurator);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: impl LifecycleHandler + 'static) -> Self {
        self.lifecycle = Box::new(lifecycle);
        self
    }

    pub fn with_identity(mut self, identity: impl IdentityCreator + 'static) -> Self {
        self.identity = Some(Box::new(identity));
        self
    }

    pub fn with_upgrader(mut self, upgrader: impl Upgrader + 'static) -> Self {
        self.upgrader = Some(Box::new(upgrader));
        self
    }

    /// アップグレード非対応にする（標準構成は対応済みで始まる）
    pub fn without_upgrader(mut self) -> Self {
        self.upgrader = None;
        self
    }

    pub fn with_tester(mut self, tester: impl Tester + 'static) -> Self {
        self.tester = Some(Box::new(tester));
        self
    }

    pub fn validator(&self) -> &dyn ParameterValidator {
        self.validator.as_ref()
    }

    pub fn configurator(&self) -> &dyn Configurator {
        self.configurator.as_ref()
    }

    pub fn lifecycle(&self) -> &dyn LifecycleHandler {
        self.lifecycle.as_ref()
    }

    pub fn identity(&self) -> Option<&dyn IdentityCreator> {
        self.identity.as_deref()
    }

    pub fn upgrader(&self) -> Option<&dyn Upgrader> {
        self.upgrader.as_deref()
    }

    pub fn tester(&self) -> Option<&dyn Tester> {
        self.tester.as_deref()
    }

    /// プラグイン情報を組み立てる
    ///
    /// `supported` は問い合わせのたびに実際の配線から計算します。
    /// フィールドに保持すると配線とずれる余地が生まれるためです。
    pub fn meta(&self) -> MetaInfo {
        let mut supported = Vec::new();
        if self.tester.is_some() {
            supported.push(Capability::Test);
        }
        if self.upgrader.is_some() {
            supported.push(Capability::Upgrade);
        }
        if self.identity.is_some() {
            supported.push(Capability::Identity);
        }

        MetaInfo {
            protocol_version: PROTOCOL_VERSION.to_string(),
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            supported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use berth_node::Node;

    fn test_plugin() -> Plugin {
        Plugin::docker(
            "dummy",
            "1.0.0",
            "テスト用プラグイン",
            vec![Parameter::string("chain-id", "チェーンID").mandatory()],
            BTreeMap::new(),
            vec![Container::new("validator", "chain/validator:1.0.0")],
        )
    }

    struct NoopTester;

    #[async_trait]
    impl Tester for NoopTester {
        async fn test(&self, _node: &Node) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    struct NoopIdentity;

    #[async_trait]
    impl IdentityCreator for NoopIdentity {
        async fn create_identity(&self, _node: &Node) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_supported_reflects_wiring() {
        let plugin = test_plugin();
        // 標準構成はupgradeのみ対応
        assert_eq!(plugin.meta().supported, vec![Capability::Upgrade]);

        let plugin = test_plugin().with_tester(NoopTester).with_identity(NoopIdentity);
        assert_eq!(
            plugin.meta().supported,
            vec![Capability::Test, Capability::Upgrade, Capability::Identity]
        );

        let plugin = test_plugin().without_upgrader();
        assert!(plugin.meta().supported.is_empty());
    }

    #[test]
    fn test_sdk_parameters_are_merged() {
        let meta = test_plugin().meta();

        let names: Vec<&str> = meta.parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"chain-id"));
        assert!(names.contains(&"docker-network"));
        assert!(names.contains(&"data-dir"));
        assert!(names.contains(&"monitoring-pack"));
    }
}
