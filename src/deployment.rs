use std::env;
use std::fmt;

use serde::{Serialize, Serializer};

pub(crate) const DEPLOYMENT_ENV: &str = "HOSTECHO_DEPLOYMENT";
const ECS_METADATA_ENV: &str = "ECS_CONTAINER_METADATA_URI_V4";
const LEGACY_ECS_METADATA_ENV: &str = "ECS_CONTAINER_METADATA_URI";
const KUBERNETES_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Describes where the service is deployed; reported as the `deployment` field of echo bodies.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Deployment {
    #[default]
    AwsEc2,
    AwsEcs,
    Kubernetes,
    /// Operator-supplied label from `HOSTECHO_DEPLOYMENT`.
    Custom(String),
}

impl Deployment {
    /// Infers the deployment from environment variables the hosting platform injects.
    ///
    /// An explicit `HOSTECHO_DEPLOYMENT` always wins. Hosts with no recognizable markers are
    /// assumed to be plain EC2 instances.
    pub fn detect() -> Self {
        if let Some(label) = env::var(DEPLOYMENT_ENV)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
        {
            return Self::from_label(&label);
        }

        if env::var(ECS_METADATA_ENV).is_ok() || env::var(LEGACY_ECS_METADATA_ENV).is_ok() {
            return Self::AwsEcs;
        }

        if env::var(KUBERNETES_ENV).is_ok() {
            return Self::Kubernetes;
        }

        Self::AwsEc2
    }

    /// Maps well-known labels back to their variants; anything else is kept verbatim.
    pub fn from_label(label: &str) -> Self {
        match label {
            "aws-ec2" => Self::AwsEc2,
            "aws-ecs" => Self::AwsEcs,
            "kubernetes" => Self::Kubernetes,
            other => Self::Custom(other.to_owned()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Deployment::AwsEc2 => "aws-ec2",
            Deployment::AwsEcs => "aws-ecs",
            Deployment::Kubernetes => "kubernetes",
            Deployment::Custom(label) => label.as_str(),
        }
    }

    /// Indicates whether the service runs on AWS compute.
    pub fn is_aws(&self) -> bool {
        matches!(self, Deployment::AwsEc2 | Deployment::AwsEcs)
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Deployment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
