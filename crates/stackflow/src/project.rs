//! プロジェクトファイルからリソースとプロビジョナー登録を組み立てる

use anyhow::Context;
use stackflow_cloud::{
    AssemblyDirSynthesizer, ClientProfile, DeclaredTemplateProvider, ExecutorConfig,
    ProvisionerRegistry, Resource, ResourceKind, ResourceSpec, RetryConfig,
};
use stackflow_cloud_aws::AwsClientFactory;
use stackflow_config::{AwsSettings, ExecutorSettings, ProjectConfig, ResourceDecl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// コマンドラインで指定されたプロジェクトファイルを読み込む（省略時は検索）
pub fn load(explicit: Option<&Path>) -> anyhow::Result<(PathBuf, ProjectConfig)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => stackflow_config::find_config_file()?,
    };
    let config = stackflow_config::load_config(&path)
        .with_context(|| format!("{} の読み込みに失敗しました", path.display()))?;
    Ok((path, config))
}

pub fn client_defaults(aws: &AwsSettings) -> ClientProfile {
    ClientProfile {
        profile: aws.profile.clone(),
        region: aws.region.clone(),
        endpoint_url: aws.endpoint_url.clone(),
    }
}

pub fn executor_config(settings: &ExecutorSettings) -> ExecutorConfig {
    let defaults = ExecutorConfig::default();
    let retry_defaults = RetryConfig::default();
    let retry = settings.retry.clone().unwrap_or_default();

    ExecutorConfig {
        poll_interval: settings
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval),
        timeout: match settings.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.timeout,
        },
        change_set_prefix: settings
            .change_set_prefix
            .clone()
            .unwrap_or(defaults.change_set_prefix),
        capabilities: settings
            .capabilities
            .clone()
            .unwrap_or(defaults.capabilities),
        retry: RetryConfig {
            max_attempts: retry.max_attempts.unwrap_or(retry_defaults.max_attempts),
            initial_delay: retry
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.initial_delay),
            max_delay: retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.max_delay),
            backoff_multiplier: retry.multiplier.unwrap_or(retry_defaults.backoff_multiplier),
        },
    }
}

/// `decl` のクライアント設定。なければ親をたどって最も近いものを使う
fn inherited_aws<'a>(config: &'a ProjectConfig, decl: &'a ResourceDecl) -> Option<&'a AwsSettings> {
    let mut current = decl;
    for _ in 0..=config.resources.len() {
        if let Some(aws) = &current.aws {
            return Some(aws);
        }
        current = config.resource(current.parent.as_deref()?)?;
    }
    None
}

/// 宣言順のリソース一覧
pub fn build_resources(config: &ProjectConfig) -> anyhow::Result<Vec<Arc<Resource>>> {
    config
        .resources
        .iter()
        .map(|decl| {
            let kind: ResourceKind = decl
                .kind
                .parse()
                .with_context(|| format!("リソース '{}'", decl.name))?;

            let spec = ResourceSpec {
                stack_name: decl.stack_name.clone(),
                template_path: decl.template.clone(),
                template_body: None,
                parameters: decl.parameters.clone(),
                assembly_dir: decl.assembly.clone(),
                client: inherited_aws(config, decl).map(client_defaults),
            };
            let mut resource = Resource::new(decl.name.as_str(), kind).with_spec(spec);
            if let Some(parent) = &decl.parent {
                resource = resource.with_parent(parent.as_str());
            }
            Ok(Arc::new(resource))
        })
        .collect()
}

pub fn registry(config: &ProjectConfig) -> ProvisionerRegistry {
    ProvisionerRegistry::with_defaults(
        Arc::new(AwsClientFactory::new(client_defaults(&config.aws))),
        Arc::new(DeclaredTemplateProvider),
        Arc::new(AssemblyDirSynthesizer),
        executor_config(&config.executor),
        config.namespace.as_str(),
    )
}
