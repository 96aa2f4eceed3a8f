//! 設定ファイルの生成と削除

use async_trait::async_trait;
use berth_node::Node;
use berth_template::TemplateData;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 設定フェーズの実装
#[async_trait]
pub trait Configurator: Send + Sync {
    /// 設定ファイルを生成する（既存ファイルは上書きしない）
    async fn configure(&self, node: &Node) -> anyhow::Result<()>;

    /// 生成した設定ファイルを削除する
    async fn remove_config(&self, node: &Node) -> anyhow::Result<()>;
}

/// テンプレート集合からファイルを生成する標準実装
///
/// パスはノードディレクトリ基準の相対パスで宣言します。
/// 生成は「無ければ書く」なので、ユーザーの手編集は保護されます。
pub struct FileConfigurator {
    templates: BTreeMap<PathBuf, String>,
}

impl FileConfigurator {
    pub fn new(templates: BTreeMap<PathBuf, String>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Configurator for FileConfigurator {
    async fn configure(&self, node: &Node) -> anyhow::Result<()> {
        let data = TemplateData::new(node);
        berth_template::render_all(&self.templates, &data)?;
        Ok(())
    }

    async fn remove_config(&self, node: &Node) -> anyhow::Result<()> {
        let dir = node.configs_dir();

        if !dir.exists() {
            println!(
                "  {} 設定ディレクトリは存在しません: {}",
                "ℹ".blue(),
                dir.display()
            );
            return Ok(());
        }

        // テンプレート由来かどうかにかかわらず、生成物のツリーごと削除する
        std::fs::remove_dir_all(&dir)?;
        println!("  {} 設定ディレクトリを削除: {}", "✓".green(), dir.display());
        Ok(())
    }
}
