use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "プロジェクトファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: stackflow.local.yaml, .stackflow.local.yaml, stackflow.yaml, .stackflow.yaml\n\
        - ./.stackflow/ ディレクトリ\n\
        - ~/.config/stackflow/stackflow.yaml\n\
        または STACKFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("{path} の解析に失敗しました: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("リソース '{resource}' が不正です: {message}")]
    InvalidResource { resource: String, message: String },

    #[error("設定 '{setting}' が不正です: {message}")]
    InvalidSetting { setting: String, message: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
