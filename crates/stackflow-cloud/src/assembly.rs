//! Synthesized construct-tree output
//!
//! An app synthesizes into a cloud assembly: one template per stack plus the
//! asset manifests those stacks depend on. Synthesis itself happens outside
//! this crate; [`AssemblyDirSynthesizer`] reads an assembly directory that was
//! already produced (`cdk synth`'s `cdk.out`).

use crate::error::{CloudError, Result};
use crate::resource::Resource;
use crate::template::TemplateRef;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const MANIFEST_FILE: &str = "manifest.json";
const STACK_ARTIFACT: &str = "aws:cloudformation:stack";
const ASSET_MANIFEST_ARTIFACT: &str = "cdk:asset-manifest";

/// Asset counts of one asset manifest a stack depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetSummary {
    pub files: usize,
    pub docker_images: usize,
}

impl AssetSummary {
    /// The stack template itself is always one file asset; anything beyond it
    /// would have to be published before deploying
    pub fn is_supported(&self) -> bool {
        self.files <= 1 && self.docker_images == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedStack {
    pub stack_name: String,
    pub template: TemplateRef,
    pub assets: Vec<AssetSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudAssembly {
    pub stacks: Vec<SynthesizedStack>,
}

impl CloudAssembly {
    pub fn stack(&self, stack_name: &str) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| s.stack_name == stack_name)
    }

    /// Fail when any stack carries file or container image assets
    pub fn check_assets(&self) -> Result<()> {
        for stack in &self.stacks {
            if stack.assets.iter().any(|a| !a.is_supported()) {
                tracing::error!(stack = %stack.stack_name, "File or container image assets are currently not supported");
                return Err(CloudError::Unsupported(format!(
                    "stack {} has file or container image assets; publishing assets is not supported",
                    stack.stack_name
                )));
            }
        }
        Ok(())
    }
}

/// Produces the cloud assembly of an app
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, app: &Resource) -> Result<CloudAssembly>;
}

/// Reads the assembly directory declared on the app
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyDirSynthesizer;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    artifacts: BTreeMap<String, Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(rename = "type")]
    artifact_type: String,
    #[serde(default)]
    properties: ArtifactProperties,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactProperties {
    template_file: Option<String>,
    stack_name: Option<String>,
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetManifest {
    #[serde(default)]
    files: HashMap<String, serde_json::Value>,
    #[serde(default)]
    docker_images: HashMap<String, serde_json::Value>,
}

impl AssemblyDirSynthesizer {
    pub async fn read(dir: &Path) -> Result<CloudAssembly> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            CloudError::InvalidConfig(format!(
                "cannot read cloud assembly manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw)?;

        let mut stacks = Vec::new();
        for (artifact_id, artifact) in &manifest.artifacts {
            if artifact.artifact_type != STACK_ARTIFACT {
                continue;
            }
            let template_file = artifact.properties.template_file.as_deref().ok_or_else(|| {
                CloudError::InvalidConfig(format!("stack artifact {} has no templateFile", artifact_id))
            })?;

            let mut assets = Vec::new();
            for dependency in &artifact.dependencies {
                let Some(dep) = manifest.artifacts.get(dependency) else {
                    continue;
                };
                if dep.artifact_type != ASSET_MANIFEST_ARTIFACT {
                    continue;
                }
                if let Some(file) = &dep.properties.file {
                    assets.push(read_asset_manifest(&dir.join(file)).await?);
                }
            }

            stacks.push(SynthesizedStack {
                stack_name: artifact
                    .properties
                    .stack_name
                    .clone()
                    .unwrap_or_else(|| artifact_id.clone()),
                template: TemplateRef::Path(dir.join(template_file)),
                assets,
            });
        }

        tracing::debug!(dir = %dir.display(), stacks = stacks.len(), "Read cloud assembly");
        Ok(CloudAssembly { stacks })
    }
}

async fn read_asset_manifest(path: &Path) -> Result<AssetSummary> {
    let raw = tokio::fs::read_to_string(path).await?;
    let manifest: AssetManifest = serde_json::from_str(&raw)?;
    Ok(AssetSummary {
        files: manifest.files.len(),
        docker_images: manifest.docker_images.len(),
    })
}

#[async_trait]
impl Synthesizer for AssemblyDirSynthesizer {
    async fn synthesize(&self, app: &Resource) -> Result<CloudAssembly> {
        let dir = app.spec().assembly_dir.as_deref().ok_or_else(|| {
            CloudError::InvalidConfig(format!("app {} declares no assembly directory", app.id()))
        })?;
        Self::read(dir).await
    }
}
