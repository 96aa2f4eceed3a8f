//! bollardによる [`ContainerApi`] の本番実装
//!
//! Docker APIの呼び出しと、[`CreatePlan`] からbollardのコンテナ設定への
//! 変換をこのモジュールに閉じ込めます。他のモジュールはbollardの型を
//! 直接触りません。

// Bollard 0.19.4 の非推奨API（create系）を一時的に使用
#![allow(deprecated)]

use crate::api::{ContainerApi, ContainerState, CreatePlan};
use crate::error::{DockerError, Result};
use crate::spec::MountKind;
use async_trait::async_trait;
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::debug;

/// 作成する全コンテナに適用する再起動ポリシー
pub const RESTART_POLICY: bollard::models::RestartPolicyNameEnum =
    bollard::models::RestartPolicyNameEnum::UNLESS_STOPPED;

/// ログドライバ。ローテーション付きjson-fileでディスクの無制限成長を防ぐ
pub const LOG_DRIVER: &str = "json-file";
/// ログファイル1つあたりの上限サイズ
pub const LOG_MAX_SIZE: &str = "10m";
/// ローテーションで保持するログファイル数
pub const LOG_MAX_FILES: &str = "3";

/// bollardベースのランタイムクライアント
///
/// フェーズ実行のたびに接続し直す短命なハンドルで、フェーズをまたいで
/// 共有しません。
pub struct DockerApi {
    docker: Docker,
}

impl DockerApi {
    /// ローカルのDockerデーモンへ接続し、疎通を確認する
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?;

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerApi for DockerApi {
    async fn pull_image(&self, image: &str) -> Result<()> {
        let (image_name, tag) = parse_image_tag(image);

        let options = bollard::image::CreateImageOptions {
            from_image: image_name,
            tag,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(info) = stream.next().await {
            info?;
        }

        debug!(image = %image, "Pulled image");
        Ok(())
    }

    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>> {
        match self
            .docker
            .inspect_container(name, None::<bollard::query_parameters::InspectContainerOptions>)
            .await
        {
            Ok(inspect) => {
                let running = inspect
                    .state
                    .as_ref()
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                Ok(Some(ContainerState { running }))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_container(&self, name: &str, plan: &CreatePlan) -> Result<()> {
        let (config, options) = plan_to_container_config(name, plan);
        self.docker.create_container(Some(options), config).await?;
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<bollard::query_parameters::StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        match self
            .docker
            .stop_container(name, None::<bollard::query_parameters::StopContainerOptions>)
            .await
        {
            Ok(_) => Ok(()),
            // 304 = 既に停止済み
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.docker
            .remove_container(
                name,
                Some(bollard::query_parameters::RemoveContainerOptions {
                    v: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(name, None::<bollard::query_parameters::WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollardは非ゼロ終了をエラーとして返す
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(DockerError::Api(format!(
                "コンテナ '{name}' の終了待ちが応答なしで打ち切られました"
            ))),
        }
    }

    async fn container_logs(&self, name: &str) -> Result<String> {
        let options = bollard::query_parameters::LogsOptions {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            output.push_str(&chunk?.to_string());
        }
        Ok(output)
    }

    async fn list_container_names(&self) -> Result<Vec<String>> {
        let options = bollard::query_parameters::ListContainersOptions {
            all: true,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        // Docker APIのコンテナ名は先頭に "/" が付くので取り除く
        let names = containers
            .iter()
            .flat_map(|c| c.names.iter().flatten())
            .map(|n| n.trim_start_matches('/').to_string())
            .collect();

        Ok(names)
    }

    async fn does_network_exist(&self, name: &str) -> Result<bool> {
        match self
            .docker
            .inspect_network(name, None::<bollard::query_parameters::InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let config = bollard::models::NetworkCreateRequest {
            name: name.to_string(),
            driver: Some("bridge".to_string()),
            ..Default::default()
        };

        self.docker.create_network(config).await?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.docker.remove_network(name).await?;
        Ok(())
    }

    async fn does_volume_exist(&self, name: &str) -> Result<bool> {
        match self.docker.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.docker
            .remove_volume(name, None::<bollard::query_parameters::RemoveVolumeOptions>)
            .await?;
        Ok(())
    }

    async fn list_volume_ids(&self) -> Result<Vec<String>> {
        let response = self
            .docker
            .list_volumes(None::<bollard::query_parameters::ListVolumesOptions>)
            .await?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.name)
            .collect())
    }
}

/// イメージ名とタグを分離
/// 例: "redis:7-alpine" -> ("redis", "7-alpine")
///     "postgres" -> ("postgres", "latest")
fn parse_image_tag(image: &str) -> (&str, &str) {
    if let Some((name, tag)) = image.rsplit_once(':') {
        // レジストリのポート番号（例: localhost:5000/app）をタグと誤認しない
        if !tag.contains('/') {
            return (name, tag);
        }
    }
    (image, "latest")
}

/// [`CreatePlan`] をbollardのコンテナ設定に変換する
fn plan_to_container_config(
    name: &str,
    plan: &CreatePlan,
) -> (
    bollard::container::Config<String>,
    bollard::container::CreateContainerOptions<String>,
) {
    // ポートバインディング
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();

    for port in &plan.ports {
        let container_port = format!("{}/{}", port.container_port, port.protocol);

        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![bollard::models::PortBinding {
                host_ip: Some(port.host_ip.clone()),
                host_port: Some(port.host_port.clone()),
            }]),
        );
    }

    // マウント
    let mounts: Vec<bollard::models::Mount> = plan
        .mounts
        .iter()
        .map(|m| bollard::models::Mount {
            typ: Some(match m.kind {
                MountKind::Bind => bollard::models::MountTypeEnum::BIND,
                MountKind::Volume => bollard::models::MountTypeEnum::VOLUME,
            }),
            source: Some(m.source.clone()),
            target: Some(m.target.clone()),
            ..Default::default()
        })
        .collect();

    // 再起動ポリシーとログローテーションは全コンテナ共通の運用デフォルト
    let host_config = bollard::models::HostConfig {
        mounts: Some(mounts),
        port_bindings: Some(port_bindings),
        restart_policy: Some(bollard::models::RestartPolicy {
            name: Some(RESTART_POLICY),
            ..Default::default()
        }),
        log_config: Some(bollard::models::HostConfigLogConfig {
            typ: Some(LOG_DRIVER.to_string()),
            config: Some(HashMap::from([
                ("max-size".to_string(), LOG_MAX_SIZE.to_string()),
                ("max-file".to_string(), LOG_MAX_FILES.to_string()),
            ])),
        }),
        ..Default::default()
    };

    // ネットワーク設定
    let networking_config = plan.network.as_ref().map(|network| {
        let mut endpoints = HashMap::new();
        endpoints.insert(network.clone(), bollard::models::EndpointSettings::default());
        bollard::container::NetworkingConfig {
            endpoints_config: endpoints,
        }
    });

    let config = bollard::container::Config {
        image: Some(plan.image.clone()),
        env: Some(plan.env.clone()),
        cmd: Some(plan.cmd.clone()),
        user: plan.user.clone(),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        networking_config,
        ..Default::default()
    };

    let options = bollard::container::CreateContainerOptions {
        name: name.to_string(),
        platform: None,
    };

    (config, options)
}
