//! テンプレートからの設定ファイル生成
//!
//! Teraを使ってノードディスクリプタを設定ファイルに展開します。
//! 生成は「ファイルが無ければ書く」方式で、既存ファイルは決して上書き
//! しません。これが生成済み設定をユーザーが手編集できる仕組みです。
//! 再実行は冪等なので、途中失敗しても同じ操作を繰り返すだけで収束します。

pub mod error;

pub use error::{Result, TemplateError};

use berth_node::Node;
use colored::Colorize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

/// テンプレートに渡すデータ一式
///
/// ノードディスクリプタ全体は `node` として参照できます。プラグイン固有の
/// 入力（例: コンテナ一覧）は `extra` に明示的に積んで渡します。ディスクリプタ
/// 側に一時データを持たせない方針です。
pub struct TemplateData<'a> {
    node: &'a Node,
    extra: HashMap<String, serde_json::Value>,
}

impl<'a> TemplateData<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self {
            node,
            extra: HashMap::new(),
        }
    }

    /// 補助データを追加する（トップレベルのキーとして参照できる）
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn to_context(&self) -> Result<Context> {
        let mut context = Context::new();
        context.insert("node", &serde_json::to_value(self.node)?);
        context.insert("name_prefix", &self.node.name_prefix());
        for (key, value) in &self.extra {
            context.insert(key, value);
        }
        Ok(context)
    }
}

/// 文字列テンプレートをメモリ上で展開する
///
/// コンマ区切りの末尾判定用に `not_last(index=…, length=…)` 関数を登録します。
/// それ以外は標準のTera構文（条件分岐・繰り返し）がそのまま使えます。
pub fn render_str(template: &str, data: &TemplateData<'_>) -> Result<String> {
    let mut tera = Tera::default();
    tera.register_function("not_last", not_last);

    let context = data.to_context()?;
    tera.render_str(template, &context)
        .map_err(|e| TemplateError::Render(flatten_tera_error(&e)))
}

/// ファイルが無い場合だけテンプレートを展開して書き込む
///
/// 既にファイルがあればエラーにせずスキップします（手編集の保護）。
/// 戻り値は実際に書き込んだかどうか。
pub fn render_if_absent(path: &Path, template: &str, data: &TemplateData<'_>) -> Result<bool> {
    let path = data.node.resolve_path(path);

    if path.exists() {
        println!(
            "  {} ファイルは既に存在します、スキップ: {}",
            "ℹ".blue(),
            path.display()
        );
        return Ok(false);
    }

    let rendered = render_str(template, data)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TemplateError::Io {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    std::fs::write(&path, rendered).map_err(|e| TemplateError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;

    println!("  {} ファイルを作成: {}", "✓".green(), path.display());
    debug!(path = %path.display(), "Rendered template");
    Ok(true)
}

/// 複数テンプレートをまとめて展開する
///
/// 最初のエラーで打ち切ります。書き込み済みのファイルはそのまま残りますが、
/// 再実行すれば未生成分だけが生成されます。
pub fn render_all(files: &BTreeMap<PathBuf, String>, data: &TemplateData<'_>) -> Result<()> {
    for (path, template) in files {
        render_if_absent(path, template, data)?;
    }
    Ok(())
}

/// 生成済みファイルを削除する。無ければ何もしない
pub fn remove_if_present(node: &Node, path: &Path) -> Result<bool> {
    let path = node.resolve_path(path);

    if !path.exists() {
        println!(
            "  {} ファイルが見つかりません、スキップ: {}",
            "ℹ".blue(),
            path.display()
        );
        return Ok(false);
    }

    std::fs::remove_file(&path).map_err(|e| TemplateError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;

    println!("  {} ファイルを削除: {}", "✓".green(), path.display());
    Ok(true)
}

/// 末尾要素の判定関数（コンマ区切りリストの生成用）
///
/// 使用例:
/// ```text
/// {% for id in quorum_ids %}"{{ id }}"{% if not_last(index=loop.index0, length=quorum_ids | length) %},{% endif %}{% endfor %}
/// ```
fn not_last(args: &HashMap<String, serde_json::Value>) -> tera::Result<serde_json::Value> {
    let index = args
        .get("index")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| tera::Error::msg("not_last: `index` 引数が必要です"))?;
    let length = args
        .get("length")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| tera::Error::msg("not_last: `length` 引数が必要です"))?;

    Ok(serde_json::Value::Bool(index + 1 < length))
}

/// Teraのエラーチェーンを1つのメッセージにまとめる
fn flatten_tera_error(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    details.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(dir: &Path) -> Node {
        let mut node = Node::new(dir.join("node.json"), "node1");
        node.plugin_name = "dummy".to_string();
        node.str_parameters
            .insert("docker-network".to_string(), "bpm".to_string());
        node
    }

    #[test]
    fn test_render_node_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node);

        let out = render_str(
            "id={{ node.id }} net={{ node.str_parameters['docker-network'] }}",
            &data,
        )
        .unwrap();
        assert_eq!(out, "id=node1 net=bpm");
    }

    #[test]
    fn test_render_extra_data() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data =
            TemplateData::new(&node).with("containers", serde_json::json!(["validator", "api"]));

        let out = render_str("{{ containers | length }} containers", &data).unwrap();
        assert_eq!(out, "2 containers");
    }

    #[test]
    fn test_not_last_emits_commas() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node).with("ids", serde_json::json!(["a", "b", "c"]));

        let tpl = "{% for id in ids %}{{ id }}{% if not_last(index=loop.index0, length=ids | length) %},{% endif %}{% endfor %}";
        assert_eq!(render_str(tpl, &data).unwrap(), "a,b,c");
    }

    #[test]
    fn test_undefined_variable_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node);

        let result = render_str("{{ missing_var }}", &data);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_if_absent_writes_once() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node);
        let rel = Path::new("configs/app.conf");

        let written = render_if_absent(rel, "version=1", &data).unwrap();
        assert!(written);

        let out_path = node.resolve_path(rel);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "version=1");

        // 2回目は別のテンプレートでも上書きしない
        let written = render_if_absent(rel, "version=2", &data).unwrap();
        assert!(!written);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "version=1");
    }

    #[test]
    fn test_render_all_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node);

        let mut files = BTreeMap::new();
        files.insert(
            PathBuf::from("configs/a.conf"),
            "node={{ node.id }}".to_string(),
        );
        files.insert(PathBuf::from("configs/b.conf"), "static".to_string());

        render_all(&files, &data).unwrap();
        let a = std::fs::read(node.resolve_path("configs/a.conf")).unwrap();

        render_all(&files, &data).unwrap();
        let a2 = std::fs::read(node.resolve_path("configs/a.conf")).unwrap();
        assert_eq!(a, a2, "再実行でバイト単位で同一のまま");
    }

    #[test]
    fn test_remove_if_present() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());
        let data = TemplateData::new(&node);
        let rel = Path::new("configs/app.conf");

        render_if_absent(rel, "x", &data).unwrap();
        assert!(remove_if_present(&node, rel).unwrap());

        // 存在しないファイルの削除はエラーにならない
        assert!(!remove_if_present(&node, rel).unwrap());
    }
}
