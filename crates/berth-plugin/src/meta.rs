//! プラグインのメタデータとパラメータスキーマ

use serde::{Deserialize, Serialize};
use std::fmt;

/// プラグインとオーケストレータの間の契約バージョン
pub const PROTOCOL_VERSION: &str = "1.1.0";

/// パラメータの型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Bool,
}

/// パラメータスキーマの1エントリ
///
/// `mandatory` と `default` は排他です。必須パラメータにデフォルト値を
/// 持たせることはできません。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::String,
            description: description.into(),
            mandatory: false,
            default: None,
        }
    }

    pub fn bool(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Bool,
            description: description.into(),
            mandatory: false,
            default: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self.default = None;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self.mandatory = false;
        self
    }
}

/// オプション機能のタグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Test,
    Upgrade,
    Identity,
}

/// `meta` コマンドが出力するプラグイン情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
    pub supported: Vec<Capability>,
}

impl fmt::Display for MetaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yaml = serde_yaml::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&yaml)
    }
}

/// 全プラグインが共通で受け付けるSDKパラメータ
pub fn sdk_parameters() -> Vec<Parameter> {
    vec![
        Parameter::string("docker-network", "コンテナを接続するDockerネットワーク名")
            .with_default("bpm"),
        Parameter::string("data-dir", "ノードディレクトリ基準のデータ置き場")
            .with_default("data"),
        Parameter::string(
            "monitoring-pack",
            "ログ転送設定の断片を含むtar.gzアーカイブのパス（未指定ならコンソール出力）",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_clears_default() {
        let p = Parameter::string("chain-id", "チェーンID")
            .with_default("mainnet")
            .mandatory();
        assert!(p.mandatory);
        assert!(p.default.is_none(), "必須パラメータはデフォルト値を持たない");
    }

    #[test]
    fn test_meta_yaml_field_names() {
        let meta = MetaInfo {
            protocol_version: PROTOCOL_VERSION.to_string(),
            name: "dummy".to_string(),
            version: "1.0.0".to_string(),
            description: "テスト用".to_string(),
            parameters: vec![Parameter::string("chain-id", "チェーンID").mandatory()],
            supported: vec![Capability::Upgrade],
        };

        let yaml = meta.to_string();
        assert!(yaml.contains("protocolVersion: 1.1.0"));
        assert!(yaml.contains("name: dummy"));
        assert!(yaml.contains("type: string"));
        assert!(yaml.contains("mandatory: true"));
        assert!(yaml.contains("- upgrade"));
    }

    #[test]
    fn test_sdk_parameters_defaults() {
        let params = sdk_parameters();
        let network = params.iter().find(|p| p.name == "docker-network").unwrap();
        assert_eq!(network.default.as_deref(), Some("bpm"));

        let data_dir = params.iter().find(|p| p.name == "data-dir").unwrap();
        assert_eq!(data_dir.default.as_deref(), Some("data"));

        let pack = params.iter().find(|p| p.name == "monitoring-pack").unwrap();
        assert!(!pack.mandatory);
        assert!(pack.default.is_none());
    }
}
