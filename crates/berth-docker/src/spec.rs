//! コンテナの宣言的な仕様
//!
//! プラグインが管理したいコンテナを宣言するための型。名前は論理名で持ち、
//! ランタイムへ渡す直前に [`crate::BasicManager`] がノードのプレフィックスを
//! 付与します。

/// マウントの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// ホストのパスをそのままマウント
    Bind,
    /// Dockerボリューム（ノードのプレフィックスが付く）
    Volume,
}

/// コンテナへのマウント宣言
///
/// `source` にはテンプレート式が書けます
/// （例: `{{ node.str_parameters['data-dir'] }}/keys`）。
/// bindの相対パスはノードディレクトリ基準で解決されます。
#[derive(Debug, Clone)]
pub struct Mount {
    pub kind: MountKind,
    pub source: String,
    pub target: String,
}

impl Mount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Bind,
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn volume(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Volume,
            source: source.into(),
            target: target.into(),
        }
    }
}

/// ポート転送の宣言
#[derive(Debug, Clone, Default)]
pub struct Port {
    pub host_ip: String,
    pub host_port: String,
    pub container_port: String,
    /// "tcp" または "udp"
    pub protocol: String,
}

/// コンテナ1つ分の宣言
///
/// `cmd` と `cmd_file` は排他で、両方指定された場合は `cmd` が優先されます。
/// `cmd_file` は生成済みコマンドファイルへのパスで、起動時に読み込んで
/// 改行区切りの引数リストに変換されます。
#[derive(Debug, Clone, Default)]
pub struct Container {
    /// 論理名（プレフィックスなし）
    pub name: String,
    pub image: String,
    /// 環境変数ファイル（KEY=VALUE、1行1変数）へのパス
    pub env_file: Option<String>,
    pub mounts: Vec<Mount>,
    pub ports: Vec<Port>,
    /// リテラルの引数リスト
    pub cmd: Vec<String>,
    /// 生成済みコマンドファイルへのパス
    pub cmd_file: Option<String>,
    pub user: Option<String>,
    /// モニタリング転送パイプラインにログを乗せるかどうか
    pub collect_logs: bool,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }
}
