use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("テンプレート展開エラー: {0}")]
    Render(String),

    #[error("ファイル書き込みエラー: {path}\n理由: {message}")]
    Io { path: PathBuf, message: String },

    #[error("テンプレートデータをシリアライズできません: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
