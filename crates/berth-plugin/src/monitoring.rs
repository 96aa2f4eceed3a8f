//! モニタリングエージェント（filebeat）の構成
//!
//! 各ノードの横にfilebeatコンテナを1つ走らせ、`collect_logs` を有効に
//! したコンテナのログだけを収集します。転送先はmonitoring-packパラメータ
//! で切り替えます。未指定ならコンソール出力（開発用）、指定されていれば
//! アーカイブ内の `config.tpl` を出力セクションとして基底テンプレートに
//! 連結します。
//!
//! 設定ファイルは起動のたびに書き直します。他の生成ファイルと違って
//! 「無ければ書く」ではありません。転送先の切り替えが次回起動で確実に
//! 反映されるようにするためです。

use berth_docker::{Container, Mount};
use berth_node::Node;
use berth_template::TemplateData;
use colored::Colorize;
use flate2::read::GzDecoder;
use std::path::Path;
use tracing::debug;

/// filebeatのイメージ（動作確認済みのバージョンに固定）
pub const FILEBEAT_IMAGE: &str = "docker.elastic.co/beats/filebeat:7.4.1";
/// filebeatコンテナの論理名
pub const FILEBEAT_CONTAINER: &str = "filebeat";
/// 生成する設定ファイル名（monitoringディレクトリ内）
pub const FILEBEAT_CONFIG_FILE: &str = "filebeat.yml";

/// 入力とフィルタを定義する基底テンプレート。出力セクションは含まない
const BASE_CONFIG_TPL: &str = r#"filebeat.inputs:
- type: container
  paths:
  - '/var/lib/docker/containers/*/*.log'
fields:
  node:
    protocol_type: {{ node.plugin | upper }}
    xid: {{ node.id }}
fields_under_root: true
processors:
- add_docker_metadata: null
{% if log_containers %}- else.add_fields:
    fields.log_type: system
    target: ''
  if.or:
{% for name in log_containers %}  - equals.container.name: {{ name }}
{% endfor %}  then.add_fields:
    fields.log_type: user
    target: ''
{% endif %}- drop_event.when.not.equals.log_type: user
"#;

/// 転送なしのときのコンソール出力セクション
const CONSOLE_OUTPUT_TPL: &str = "output:\n  console:\n    pretty: true\n";

/// filebeatの設定ファイルを（再）生成する
///
/// monitoringディレクトリが無ければ作り、設定を常に上書きします。
pub fn render_monitoring_config(node: &Node, containers: &[Container]) -> anyhow::Result<()> {
    let monitoring_dir = node.monitoring_dir();
    std::fs::create_dir_all(&monitoring_dir)?;

    let pack = node.str_parameter("monitoring-pack").unwrap_or("");

    let template = if pack.is_empty() {
        println!(
            "  {} モニタリングの転送は無効です（monitoring-packパラメータで有効化できます）",
            "ℹ".blue()
        );
        format!("{BASE_CONFIG_TPL}\n{CONSOLE_OUTPUT_TPL}")
    } else {
        println!("  {} モニタリングデータの転送を有効化します", "✓".green());

        extract_tar_gz(&node.resolve_path(pack), &monitoring_dir)?;
        let fragment = std::fs::read_to_string(monitoring_dir.join("config.tpl"))?;
        format!("{BASE_CONFIG_TPL}\n{fragment}")
    };

    let log_containers: Vec<String> = containers
        .iter()
        .filter(|c| c.collect_logs)
        .map(|c| node.prefixed(&c.name))
        .collect();

    let data = TemplateData::new(node).with("log_containers", serde_json::json!(log_containers));
    let rendered = berth_template::render_str(&template, &data)?;

    let config_path = monitoring_dir.join(FILEBEAT_CONFIG_FILE);
    std::fs::write(&config_path, rendered)?;

    debug!(path = %config_path.display(), forwarding = !pack.is_empty(), "Rendered filebeat config");
    Ok(())
}

/// filebeatコンテナの定義
///
/// 設定ファイルとDockerのログディレクトリ、docker.sockをbindマウント
/// します。ログファイルを読むためにrootで動かします。
pub fn filebeat_container() -> Container {
    let mut container = Container::new(FILEBEAT_CONTAINER, FILEBEAT_IMAGE);
    container.cmd = vec!["-e".to_string(), "-strict.perms=false".to_string()];
    container.user = Some("root".to_string());
    container.mounts = vec![
        Mount::bind(
            format!("{}/{}", berth_node::MONITORING_DIR, FILEBEAT_CONFIG_FILE),
            "/usr/share/filebeat/filebeat.yml",
        ),
        Mount::bind("/var/lib/docker/containers", "/var/lib/docker/containers"),
        Mount::bind(berth_node::MONITORING_DIR, "/monitoring"),
        Mount::bind("/var/run/docker.sock", "/var/run/docker.sock"),
    ];
    container
}

/// tar.gzアーカイブを展開する
fn extract_tar_gz(archive: &Path, dest: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)?;

    debug!(archive = %archive.display(), dest = %dest.display(), "Extracted monitoring pack");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn test_node(dir: &Path) -> Node {
        let mut node = Node::new(dir.join("node.json"), "node1");
        node.plugin_name = "dummy".to_string();
        node
    }

    fn containers() -> Vec<Container> {
        let mut validator = Container::new("validator", "chain/validator:1.0.0");
        validator.collect_logs = true;
        let api = Container::new("api", "chain/api:1.0.0");
        vec![validator, api]
    }

    /// config.tplを1つ含むtar.gzをテスト用に作る
    fn write_monitoring_pack(path: &Path, config_tpl: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let mut header = tar::Header::new_gnu();
        header.set_size(config_tpl.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "config.tpl", config_tpl.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_console_sink_without_monitoring_pack() {
        let tmp = tempfile::tempdir().unwrap();
        let node = test_node(tmp.path());

        render_monitoring_config(&node, &containers()).unwrap();

        let config =
            std::fs::read_to_string(node.monitoring_dir().join(FILEBEAT_CONFIG_FILE)).unwrap();
        assert!(config.contains("protocol_type: DUMMY"));
        assert!(config.contains("xid: node1"));
        assert!(config.contains("console:"));
        // collect_logs付きのコンテナだけがプレフィックス付きで並ぶ
        assert!(config.contains("equals.container.name: berth-node1-validator"));
        assert!(!config.contains("berth-node1-api"));
    }

    #[test]
    fn test_monitoring_pack_fragment_is_spliced() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = test_node(tmp.path());

        let pack_path = tmp.path().join("pack.tar.gz");
        write_monitoring_pack(
            &pack_path,
            "output:\n  logstash:\n    hosts:\n    - \"{{ node.id }}.collector.example.com:5044\"\n",
        );
        node.str_parameters.insert(
            "monitoring-pack".to_string(),
            pack_path.display().to_string(),
        );

        render_monitoring_config(&node, &containers()).unwrap();

        let config =
            std::fs::read_to_string(node.monitoring_dir().join(FILEBEAT_CONFIG_FILE)).unwrap();
        assert!(config.contains("logstash:"));
        assert!(
            config.contains("node1.collector.example.com:5044"),
            "断片もテンプレートとして展開される"
        );
        assert!(!config.contains("console:"));
    }

    #[test]
    fn test_config_is_rewritten_on_each_render() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = test_node(tmp.path());

        render_monitoring_config(&node, &containers()).unwrap();
        let first =
            std::fs::read_to_string(node.monitoring_dir().join(FILEBEAT_CONFIG_FILE)).unwrap();
        assert!(first.contains("console:"));

        let pack_path = tmp.path().join("pack.tar.gz");
        write_monitoring_pack(&pack_path, "output:\n  logstash:\n    hosts: []\n");
        node.str_parameters.insert(
            "monitoring-pack".to_string(),
            pack_path.display().to_string(),
        );

        // 「無ければ書く」ではなく毎回上書きされる
        render_monitoring_config(&node, &containers()).unwrap();
        let second =
            std::fs::read_to_string(node.monitoring_dir().join(FILEBEAT_CONFIG_FILE)).unwrap();
        assert!(second.contains("logstash:"));
        assert!(!second.contains("console:"));
    }
}
