use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("ノードファイルを読み込めません: {path}\n理由: {message}")]
    Read { path: PathBuf, message: String },

    #[error("ノードファイルを書き込めません: {path}\n理由: {message}")]
    Write { path: PathBuf, message: String },

    #[error("ディレクトリを作成できません: {path}\n理由: {message}")]
    CreateDir { path: PathBuf, message: String },

    #[error("ノードファイルのJSONが不正です: {path}\n理由: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("ノードデータをシリアライズできません: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
