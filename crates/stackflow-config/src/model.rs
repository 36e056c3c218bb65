//! プロジェクトファイルのスキーマ
//!
//! ```yaml
//! namespace: aws.cloudformation
//! aws:
//!   profile: dev
//!   region: us-east-1
//! executor:
//!   poll_interval_ms: 3000
//!   timeout_secs: 3600
//! resources:
//!   - name: Orders
//!     kind: template-stack
//!     template: infra/orders.json
//!     parameters:
//!       Environment: dev
//!   - name: Web
//!     kind: app
//!     assembly: cdk.out
//!   - name: WebApi
//!     kind: app-stack
//!     parent: Web
//! ```

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAMESPACE: &str = "aws.cloudformation";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// 公開する出力プロパティの接頭辞
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub aws: AwsSettings,

    #[serde(default)]
    pub executor: ExecutorSettings,

    /// プロビジョニング順に並んだリソース
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            aws: AwsSettings::default(),
            executor: ExecutorSettings::default(),
            resources: Vec::new(),
        }
    }
}

/// 認証プロファイル・リージョン・エンドポイント
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSettings {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSettings {
    pub poll_interval_ms: Option<u64>,

    /// 0 でタイムアウトなし
    pub timeout_secs: Option<u64>,

    pub change_set_prefix: Option<String>,

    pub capabilities: Option<Vec<String>>,

    pub retry: Option<RetrySettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
}

/// 宣言されたリソース
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    pub name: String,

    /// `stack-reference`, `template-stack`, `app`, `app-stack`, `construct` のいずれか
    pub kind: String,

    pub parent: Option<String>,

    pub template: Option<PathBuf>,

    /// リモートのスタック名（省略時は `name`）
    pub stack_name: Option<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// 合成済みクラウドアセンブリのディレクトリ
    pub assembly: Option<PathBuf>,

    /// プロジェクト全体の `aws` 設定を上書きする
    pub aws: Option<AwsSettings>,
}

impl ProjectConfig {
    /// プロジェクトファイルを解析し、相対パスを `base_dir` 基準で解決する
    pub fn from_yaml(content: &str, source: &Path, base_dir: &Path) -> Result<Self> {
        let mut config: ProjectConfig =
            serde_yaml::from_str(content).map_err(|source_err| ConfigError::Parse {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// `name` の子リソース（宣言順）
    pub fn children_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResourceDecl> {
        self.resources
            .iter()
            .filter(move |r| r.parent.as_deref() == Some(name))
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        for resource in &mut self.resources {
            for path in [&mut resource.template, &mut resource.assembly]
                .into_iter()
                .flatten()
            {
                if path.is_relative() {
                    *path = base_dir.join(&*path);
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(multiplier) = self.executor.retry.as_ref().and_then(|r| r.multiplier)
            && !(multiplier.is_finite() && multiplier >= 0.0)
        {
            return Err(ConfigError::InvalidSetting {
                setting: "executor.retry.multiplier".to_string(),
                message: format!("0 以上の有限な数値を指定してください（指定値: {}）", multiplier),
            });
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err(ConfigError::InvalidResource {
                    resource: resource.name.clone(),
                    message: "名前が空です".to_string(),
                });
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(ConfigError::InvalidResource {
                    resource: resource.name.clone(),
                    message: "複数回宣言されています".to_string(),
                });
            }
        }

        for resource in &self.resources {
            let Some(parent) = &resource.parent else {
                continue;
            };
            if parent == &resource.name {
                return Err(ConfigError::InvalidResource {
                    resource: resource.name.clone(),
                    message: "自分自身を親にすることはできません".to_string(),
                });
            }
            if !seen.contains(parent.as_str()) {
                return Err(ConfigError::InvalidResource {
                    resource: resource.name.clone(),
                    message: format!("親リソース '{}' が宣言されていません", parent),
                });
            }
        }
        Ok(())
    }
}
