//! ノードプラグインSDK
//!
//! プラグインは「コンテナ定義＋設定テンプレート＋パラメータスキーマ」を
//! 宣言し、残り（ライフサイクル・冪等な収束・CLI契約）はこのSDKが引き受け
//! ます。最小のプラグインは [`Plugin::docker`] と [`cli::run`] だけで
//! 完結します。
//!
//! ```no_run
//! use berth_plugin::{cli, Parameter, Plugin};
//! use berth_docker::Container;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let plugin = Plugin::docker(
//!         "mychain",
//!         env!("CARGO_PKG_VERSION"),
//!         "mychainノードの管理",
//!         vec![Parameter::string("chain-id", "接続先チェーンのID").mandatory()],
//!         std::collections::BTreeMap::new(),
//!         vec![Container::new("validator", "mychain/validator:1.0.0")],
//!     );
//!     cli::run(plugin).await
//! }
//! ```

pub mod cli;
pub mod configure;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod meta;
pub mod monitoring;
pub mod plugin;
pub mod tester;
pub mod upgrade;
pub mod validator;

pub use configure::{Configurator, FileConfigurator};
pub use error::PluginError;
pub use identity::IdentityCreator;
pub use lifecycle::{DockerLifecycleHandler, LifecycleHandler, NodeStatus};
pub use meta::{Capability, MetaInfo, Parameter, ParameterKind, PROTOCOL_VERSION};
pub use plugin::Plugin;
pub use tester::Tester;
pub use upgrade::{DockerUpgrader, Upgrader};
pub use validator::{ParameterValidator, SimpleParameterValidator};
