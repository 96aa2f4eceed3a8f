//! Dockerリソースの冪等な収束操作
//!
//! ネットワーク・ボリューム・コンテナの3種のリソースについて「あるべき状態」
//! へ収束させる操作を提供します。各操作は必ず現在の状態をランタイムに
//! 問い合わせてから、差分がある場合にのみ手を打ちます。適用済みかどうかの
//! 台帳は持ちません。
//!
//! このため全操作は何度呼んでも安全です。途中で失敗した操作も、もう一度
//! 同じ操作を呼ぶだけで続きから収束します（エンジン内での自動リトライは
//! 行いません）。
//!
//! 内部パターン:
//!
//! 1. 望む結果（例: コンテナが起動している）が既に成立しているか確認する
//! 2. 成立していれば何もしない
//! 3. していなければ、結果を作る操作だけを実行する

pub mod api;
pub mod docker;
pub mod error;
pub mod manager;
pub mod spec;
pub mod testing;

pub use api::{ContainerApi, ContainerState, CreatePlan, ResolvedMount};
pub use docker::{DockerApi, LOG_DRIVER, LOG_MAX_FILES, LOG_MAX_SIZE, RESTART_POLICY};
pub use error::{DockerError, Result};
pub use manager::BasicManager;
pub use spec::{Container, Mount, MountKind, Port};
