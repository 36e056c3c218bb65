pub mod error;
pub mod model;

pub use error::*;
pub use model::*;

use std::path::{Path, PathBuf};

/// プロジェクトファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "STACKFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "stackflow.local.yaml",
    ".stackflow.local.yaml",
    "stackflow.yaml",
    ".stackflow.yaml",
];

/// プロジェクトファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: stackflow.local.yaml, .stackflow.local.yaml, stackflow.yaml, .stackflow.yaml
/// 3. ./.stackflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/stackflow/stackflow.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points at a missing file, searching", CONFIG_PATH_ENV);
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    // 3. ./.stackflow/ ディレクトリで検索
    let project_dir = current_dir.join(".stackflow");
    if project_dir.is_dir()
        && let Some(path) = find_in(&project_dir)
    {
        return Ok(path);
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stackflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// プロジェクトファイルを読み込む
///
/// ファイル内の相対パスはファイルのあるディレクトリを基準に解決する
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let config = ProjectConfig::from_yaml(&content, path, &base_dir)?;
    tracing::debug!(
        path = %path.display(),
        resources = config.resources.len(),
        "Loaded project file"
    );
    Ok(config)
}

/// プロジェクトファイルを探して読み込む
pub fn load_project() -> Result<(PathBuf, ProjectConfig)> {
    let path = find_config_file()?;
    let config = load_config(&path)?;
    Ok((path, config))
}
