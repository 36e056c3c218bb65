//! Client factory
//!
//! Loads the shared AWS configuration (environment, profiles, SSO, IMDS) with
//! the resource's profile, region and endpoint applied, checks that
//! credentials resolve, and caches one client per distinct setting.

use crate::control_plane::CloudFormationControlPlane;
use crate::error::AwsError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use stackflow_cloud::{ClientFactory, ClientProfile, ControlPlane, Resource, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AwsClientFactory {
    defaults: ClientProfile,
    clients: Mutex<HashMap<ClientProfile, Arc<CloudFormationControlPlane>>>,
}

impl AwsClientFactory {
    /// `defaults` applies wherever a resource leaves a setting unset
    pub fn new(defaults: ClientProfile) -> Self {
        Self {
            defaults,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn profile_for(&self, resource: &Resource) -> ClientProfile {
        let Some(own) = resource.spec().client.as_ref() else {
            return self.defaults.clone();
        };
        ClientProfile {
            profile: own.profile.clone().or_else(|| self.defaults.profile.clone()),
            region: own.region.clone().or_else(|| self.defaults.region.clone()),
            endpoint_url: own
                .endpoint_url
                .clone()
                .or_else(|| self.defaults.endpoint_url.clone()),
        }
    }

    /// Shared configuration with `profile` applied on top
    async fn load(profile: &ClientProfile) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(name) = &profile.profile {
            loader = loader.profile_name(name);
        }
        if let Some(region) = &profile.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &profile.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }

    async fn connect(profile: &ClientProfile) -> std::result::Result<CloudFormationControlPlane, AwsError> {
        let config = Self::load(profile).await;

        if config.region().is_none() {
            return Err(AwsError::InvalidConfig(
                "no region configured; set `aws.region` or AWS_REGION".to_string(),
            ));
        }
        let provider = config.credentials_provider().ok_or_else(|| {
            AwsError::Credentials("no credentials provider is configured".to_string())
        })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| AwsError::Credentials(e.to_string()))?;

        tracing::debug!(
            profile = ?profile.profile,
            region = ?config.region(),
            endpoint = ?config.endpoint_url(),
            "CloudFormation client ready"
        );
        let client = aws_sdk_cloudformation::Client::new(&config);
        Ok(CloudFormationControlPlane::new(client, has_custom_endpoint(&config)))
    }
}

/// An endpoint set anywhere (stackflow settings, `AWS_ENDPOINT_URL`, the
/// shared config profile) is not the public one
fn has_custom_endpoint(config: &SdkConfig) -> bool {
    config.endpoint_url().is_some()
}

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn client_for(&self, resource: &Resource) -> Result<Arc<dyn ControlPlane>> {
        let profile = self.profile_for(resource);
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&profile) {
            return Ok(client.clone() as Arc<dyn ControlPlane>);
        }

        let client = Arc::new(Self::connect(&profile).await.inspect_err(|e| {
            tracing::error!(resource = %resource.id(), error = %e, "Failed to construct CloudFormation client");
        })?);
        clients.insert(profile, client.clone());
        Ok(client as Arc<dyn ControlPlane>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_cloud::{ResourceKind, ResourceSpec};

    #[test]
    fn test_resource_settings_override_defaults() {
        let factory = AwsClientFactory::new(ClientProfile {
            profile: Some("dev".into()),
            region: Some("us-east-1".into()),
            endpoint_url: None,
        });

        let plain = Resource::new("Orders", ResourceKind::TemplateStack);
        assert_eq!(factory.profile_for(&plain).region.as_deref(), Some("us-east-1"));

        let local = Resource::new("Orders", ResourceKind::TemplateStack).with_spec(ResourceSpec {
            client: Some(ClientProfile {
                profile: None,
                region: Some("eu-west-1".into()),
                endpoint_url: Some("http://localhost:4566".into()),
            }),
            ..Default::default()
        });
        let merged = factory.profile_for(&local);
        assert_eq!(merged.profile.as_deref(), Some("dev"));
        assert_eq!(merged.region.as_deref(), Some("eu-west-1"));
        assert_eq!(merged.endpoint_url.as_deref(), Some("http://localhost:4566"));
    }

    fn load_with_env(profile: ClientProfile, endpoint: Option<&str>) -> SdkConfig {
        temp_env::with_vars(
            [
                ("AWS_ENDPOINT_URL", endpoint),
                ("AWS_ENDPOINT_URL_CLOUDFORMATION", None),
                ("AWS_IGNORE_CONFIGURED_ENDPOINT_URLS", None),
                ("AWS_PROFILE", None),
                ("AWS_CONFIG_FILE", Some("/nonexistent/stackflow/config")),
                ("AWS_SHARED_CREDENTIALS_FILE", Some("/nonexistent/stackflow/credentials")),
            ],
            || {
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap()
                    .block_on(AwsClientFactory::load(&profile))
            },
        )
    }

    fn regional() -> ClientProfile {
        ClientProfile {
            profile: None,
            region: Some("us-east-1".into()),
            endpoint_url: None,
        }
    }

    #[test]
    fn test_endpoint_from_environment_is_custom() {
        let config = load_with_env(regional(), Some("http://localhost:4566"));
        assert_eq!(config.endpoint_url(), Some("http://localhost:4566"));
        assert!(has_custom_endpoint(&config));
    }

    #[test]
    fn test_endpoint_override_is_custom() {
        let profile = ClientProfile {
            endpoint_url: Some("http://localhost:4566".into()),
            ..regional()
        };
        assert!(has_custom_endpoint(&load_with_env(profile, None)));
    }

    #[test]
    fn test_default_endpoint_is_public() {
        assert!(!has_custom_endpoint(&load_with_env(regional(), None)));
    }
}
