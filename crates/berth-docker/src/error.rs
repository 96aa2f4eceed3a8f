use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • docker ps コマンドが正常に動作するか確認してください"
    )]
    ConnectionFailed(String),

    #[error("Docker APIエラー: {0}")]
    Api(String),

    #[error("コンテナ '{container}' が終了コード {status} で失敗しました\n出力:\n{output}")]
    TransientContainerFailed {
        container: String,
        status: i64,
        output: String,
    },

    #[error("ファイル読み込みエラー: {path}\n理由: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Template(#[from] berth_template::TemplateError),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        let err_str = err.to_string();
        // 接続エラーの可能性をチェック
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            DockerError::ConnectionFailed(err_str)
        } else {
            DockerError::Api(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, DockerError>;
