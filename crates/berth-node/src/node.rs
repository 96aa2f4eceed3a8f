//! ノードディスクリプタ
//!
//! オーケストレータが永続化するJSONファイル（node.json）を読み書きします。
//! `id` は作成後に変更されない前提で、リソース名プレフィックスと
//! ディレクトリ構成はすべて `id` とファイルの置き場所から導出されます。

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 名前プレフィックスのSDK識別子
pub const NAME_PREFIX: &str = "berth";

/// 設定ファイルのサブディレクトリ
pub const CONFIGS_DIR: &str = "configs";
/// シークレット（鍵など）のサブディレクトリ
pub const SECRETS_DIR: &str = "secrets";
/// モニタリングエージェント設定のサブディレクトリ
pub const MONITORING_DIR: &str = "monitoring";
/// ログのサブディレクトリ
pub const LOGS_DIR: &str = "logs";

/// テレメトリ転送先の設定（ホストとTLSマテリアルのパス）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub ca: String,
}

/// デプロイ済みノード1台分のディスクリプタ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// ディスクリプタファイルのパス（永続化しない）
    #[serde(skip)]
    node_file: PathBuf,

    /// グローバルに一意なノードID
    pub id: String,

    /// プラグイン名
    #[serde(rename = "plugin")]
    pub plugin_name: String,

    /// このノードを作成・最後にアップグレードしたプラグインのバージョン
    #[serde(default)]
    pub version: String,

    /// プラグインが定義する文字列パラメータ
    #[serde(default)]
    pub str_parameters: BTreeMap<String, String>,

    /// プラグインが定義する真偽値パラメータ
    #[serde(default)]
    pub bool_parameters: BTreeMap<String, bool>,

    /// テレメトリ転送設定（未設定なら転送なし）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<Collection>,
}

impl Node {
    /// 空のディスクリプタを作成（ファイルはまだ書かれない）
    pub fn new(node_file: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            node_file: absolutize(&expand_home(node_file.into())),
            id: id.into(),
            plugin_name: String::new(),
            version: String::new(),
            str_parameters: BTreeMap::new(),
            bool_parameters: BTreeMap::new(),
            collection: None,
        }
    }

    /// ディスクリプタファイルを読み込み、configs/secrets ディレクトリを用意する
    pub fn load(node_file: impl Into<PathBuf>) -> Result<Self> {
        let path = absolutize(&expand_home(node_file.into()));

        let data = std::fs::read_to_string(&path).map_err(|e| NodeError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut node: Node = serde_json::from_str(&data).map_err(|e| NodeError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        node.node_file = path;

        node.ensure_directories()?;

        debug!(id = %node.id, plugin = %node.plugin_name, "Loaded node descriptor");
        Ok(node)
    }

    /// ディスクリプタをファイルへ書き戻す
    pub fn save(&self) -> Result<()> {
        self.ensure_directories()?;

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.node_file, data).map_err(|e| NodeError::Write {
            path: self.node_file.clone(),
            message: e.to_string(),
        })
    }

    /// コンテナ・ボリューム・ネットワーク名に付ける規約プレフィックス
    pub fn name_prefix(&self) -> String {
        format!("{}-{}-", NAME_PREFIX, self.id)
    }

    /// 論理名にプレフィックスを付与する。既に付いていれば二重付与しない
    pub fn prefixed(&self, name: &str) -> String {
        let prefix = self.name_prefix();
        if name.starts_with(&prefix) {
            return name.to_string();
        }
        format!("{}{}", prefix, name)
    }

    /// ディスクリプタファイルのパス
    pub fn node_file(&self) -> &Path {
        &self.node_file
    }

    /// 設定・シークレット・メタデータを置くノードのルートディレクトリ
    pub fn node_dir(&self) -> PathBuf {
        self.node_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// 生成された設定ファイルの置き場所
    pub fn configs_dir(&self) -> PathBuf {
        self.node_dir().join(CONFIGS_DIR)
    }

    /// シークレット（秘密鍵など）の置き場所
    pub fn secrets_dir(&self) -> PathBuf {
        self.node_dir().join(SECRETS_DIR)
    }

    /// モニタリングエージェント設定の置き場所
    pub fn monitoring_dir(&self) -> PathBuf {
        self.node_dir().join(MONITORING_DIR)
    }

    /// ログの置き場所
    pub fn logs_dir(&self) -> PathBuf {
        self.node_dir().join(LOGS_DIR)
    }

    /// 相対パスをノードディレクトリ基準で解決する。絶対パスはそのまま返す
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = expand_home(path.as_ref().to_path_buf());
        if path.is_absolute() {
            return path;
        }
        self.node_dir().join(path)
    }

    /// 文字列パラメータの参照
    pub fn str_parameter(&self, name: &str) -> Option<&str> {
        self.str_parameters.get(name).map(String::as_str)
    }

    /// 真偽値パラメータの参照
    pub fn bool_parameter(&self, name: &str) -> Option<bool> {
        self.bool_parameters.get(name).copied()
    }

    fn ensure_directories(&self) -> Result<()> {
        for dir in [self.configs_dir(), self.secrets_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| NodeError::CreateDir {
                path: dir.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// `~/` 始まりのパスをホームディレクトリに展開する
fn expand_home(path: PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path
}

/// 相対パスをカレントディレクトリ基準の絶対パスにする
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
