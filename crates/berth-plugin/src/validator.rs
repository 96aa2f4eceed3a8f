//! パラメータ検証

use crate::error::PluginError;
use crate::meta::{Parameter, ParameterKind};
use async_trait::async_trait;
use berth_node::Node;

/// ディスクリプタのパラメータをスキーマに照らして検証する
#[async_trait]
pub trait ParameterValidator: Send + Sync {
    async fn validate(&self, node: &Node, parameters: &[Parameter]) -> anyhow::Result<()>;
}

/// スキーマ駆動の標準バリデータ
///
/// 規則:
/// - bool型: `bool_parameters` に存在しなければならない
/// - string型: `str_parameters` に存在しなければならない。空文字列は、
///   必須パラメータとデフォルト値付きパラメータでは不正（デフォルトが
///   あるのに空ということは、値の解決に失敗している）
///
/// 問題はまとめて収集し、1回の実行で全部報告します。
pub struct SimpleParameterValidator;

#[async_trait]
impl ParameterValidator for SimpleParameterValidator {
    async fn validate(&self, node: &Node, parameters: &[Parameter]) -> anyhow::Result<()> {
        let mut problems = Vec::new();

        for parameter in parameters {
            match parameter.kind {
                ParameterKind::Bool => {
                    if node.bool_parameter(&parameter.name).is_none() {
                        problems.push(format!(
                            "真偽値パラメータ '{}' が設定されていません",
                            parameter.name
                        ));
                    }
                }
                ParameterKind::String => match node.str_parameter(&parameter.name) {
                    None => {
                        problems.push(format!(
                            "文字列パラメータ '{}' が設定されていません",
                            parameter.name
                        ));
                    }
                    Some("") if parameter.mandatory => {
                        problems.push(format!(
                            "必須パラメータ '{}' が空です",
                            parameter.name
                        ));
                    }
                    Some("") if parameter.default.is_some() => {
                        problems.push(format!(
                            "パラメータ '{}' が空です（デフォルト値の解決に失敗している可能性）",
                            parameter.name
                        ));
                    }
                    Some(_) => {}
                },
            }
        }

        if !problems.is_empty() {
            return Err(PluginError::Validation { problems }.into());
        }

        Ok(())
    }
}
