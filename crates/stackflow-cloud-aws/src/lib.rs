//! CloudFormation control plane for StackFlow
//!
//! This crate implements the `ControlPlane` and `ClientFactory` traits of
//! `stackflow-cloud` on top of the AWS SDK.
//!
//! # Requirements
//!
//! - Credentials resolvable by the default AWS provider chain (environment,
//!   shared profiles, SSO, instance metadata)
//! - A region, either configured per resource or through `AWS_REGION`
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{ClientFactory, ClientProfile, Resource, ResourceKind};
//! use stackflow_cloud_aws::AwsClientFactory;
//!
//! let factory = AwsClientFactory::new(ClientProfile {
//!     region: Some("us-west-2".into()),
//!     ..Default::default()
//! });
//!
//! let resource = Resource::new("Orders", ResourceKind::StackReference);
//! let client = factory.client_for(&resource).await?;
//! let stack = client.describe_stack("Orders").await?;
//! ```

pub mod control_plane;
pub mod error;
pub mod factory;

pub use control_plane::CloudFormationControlPlane;
pub use error::{AwsError, Result};
pub use factory::AwsClientFactory;
