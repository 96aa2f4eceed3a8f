//! ノードディスクリプタと命名・パス規約
//!
//! デプロイ済みノード1台分の情報（ID、プラグイン名、パラメータ）を保持し、
//! コンテナ・ボリューム・ネットワーク名のプレフィックスや設定ディレクトリの
//! 規約をここに集約します。他のクレートは必ずこのクレート経由でパスを解決
//! することで、プラグイン間の一貫性を保ちます。

pub mod error;
pub mod node;

pub use error::{NodeError, Result};
pub use node::{
    CONFIGS_DIR, Collection, LOGS_DIR, MONITORING_DIR, NAME_PREFIX, Node, SECRETS_DIR,
};
