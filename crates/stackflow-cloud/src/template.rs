//! Template references and the provider that resolves them

use crate::error::{CloudError, Result};
use crate::resource::Resource;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Where a stack template comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Path(PathBuf),
    Inline(String),
}

impl TemplateRef {
    pub fn path(&self) -> Option<&Path> {
        match self {
            TemplateRef::Path(path) => Some(path),
            TemplateRef::Inline(_) => None,
        }
    }

    /// Read the template body
    pub async fn load(&self) -> Result<String> {
        let body = match self {
            TemplateRef::Path(path) => {
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    CloudError::InvalidConfig(format!(
                        "cannot read template {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            TemplateRef::Inline(body) => body.clone(),
        };

        if body.trim().is_empty() {
            return Err(CloudError::InvalidConfig(format!("template {} is empty", self)));
        }
        Ok(body)
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateRef::Path(path) => write!(f, "{}", path.display()),
            TemplateRef::Inline(_) => write!(f, "<inline>"),
        }
    }
}

/// Resolves the template a resource deploys
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn template_for(&self, resource: &Resource) -> Result<TemplateRef>;
}

/// Reads the template from the resource declaration
///
/// A declared path wins over an inline body. Neither is a configuration
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredTemplateProvider;

#[async_trait]
impl TemplateProvider for DeclaredTemplateProvider {
    async fn template_for(&self, resource: &Resource) -> Result<TemplateRef> {
        let spec = resource.spec();
        if let Some(path) = &spec.template_path {
            return Ok(TemplateRef::Path(path.clone()));
        }
        if let Some(body) = &spec.template_body {
            return Ok(TemplateRef::Inline(body.clone()));
        }
        Err(CloudError::InvalidConfig(format!(
            "resource {} declares no template",
            resource.id()
        )))
    }
}
