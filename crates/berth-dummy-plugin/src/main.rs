//! デモ用プラグイン
//!
//! 実際のブロックチェーンは動かさず、スリープし続けるコンテナ2つで
//! SDKのライフサイクル全体を確認できます。

use berth_docker::{Container, Mount};
use berth_plugin::{Parameter, Plugin, cli};
use std::collections::BTreeMap;

fn plugin() -> Plugin {
    let parameters = vec![
        Parameter::string("chain-id", "接続するチェーンのID").mandatory(),
        Parameter::bool("verbose", "デーモンの詳細ログを有効にする"),
    ];

    let mut templates = BTreeMap::new();
    templates.insert(
        "configs/dummy.toml".into(),
        concat!(
            "# berth-dummy-pluginが生成した設定\n",
            "chain-id = \"{{ node.str_parameters['chain-id'] }}\"\n",
            "verbose = {{ node.bool_parameters['verbose'] }}\n",
        )
        .to_string(),
    );

    let mut daemon = Container::new("daemon", "ubuntu:24.04");
    daemon.cmd = vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()];
    daemon.mounts = vec![Mount::volume("daemon-data", "/data")];
    daemon.collect_logs = true;

    let mut sidecar = Container::new("sidecar", "ubuntu:24.04");
    sidecar.cmd = vec!["sleep".to_string(), "infinity".to_string()];

    Plugin::docker(
        "dummy",
        env!("CARGO_PKG_VERSION"),
        "SDKの動作確認用のデモプラグイン",
        parameters,
        templates,
        vec![daemon, sidecar],
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run(plugin()).await
}
