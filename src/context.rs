use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use hostecho_metadata::{MetadataClient, MetadataValue};
use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::deployment::Deployment;

/// Request-scoped handle exposing request details plus the metadata client.
#[derive(Clone, Debug)]
pub struct EchoContext {
    request: RequestInfo,
    identity: ServiceIdentity,
    metadata_client: MetadataClient,
}

impl EchoContext {
    /// Returns the method, path, and query parsed from the request.
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Returns the service labels reported in echo bodies.
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Looks up the host's private IP; `None` when the metadata service is unreachable.
    pub async fn machine_id(&self) -> Option<MetadataValue> {
        self.metadata_client.private_ip().await
    }
}

/// Labels describing this service instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceIdentity {
    pub service_type: String,
    pub deployment: Deployment,
}

impl ServiceIdentity {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            service_type: config.service_type.clone(),
            deployment: config.deployment.clone(),
        }
    }
}

/// Method, path, and query parameters of the inbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Query parameters; the first occurrence of a repeated key wins.
    pub query: BTreeMap<String, String>,
}

impl RequestInfo {
    fn from_parts(parts: &Parts) -> Self {
        let mut query = BTreeMap::new();
        // Unparseable query strings echo as an empty map rather than rejecting the request.
        if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
            for (key, value) in pairs {
                query.entry(key).or_insert(value);
            }
        }

        Self {
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            query,
        }
    }

    /// Returns a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Errors emitted when a handler requests [`EchoContext`] but extensions were not set up.
#[derive(Debug, Error)]
pub enum EchoContextRejection {
    #[error("metadata client missing from request extensions")]
    MissingMetadataClient,
    #[error("service identity missing from request extensions")]
    MissingServiceIdentity,
}

impl IntoResponse for EchoContextRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let message = self.to_string();
        (status, message).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for EchoContext
where
    S: Send + Sync,
{
    type Rejection = EchoContextRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let metadata_client = parts
            .extensions
            .get::<MetadataClient>()
            .cloned()
            .ok_or(EchoContextRejection::MissingMetadataClient)?;
        let identity = parts
            .extensions
            .get::<ServiceIdentity>()
            .cloned()
            .ok_or(EchoContextRejection::MissingServiceIdentity)?;

        Ok(Self {
            request: RequestInfo::from_parts(parts),
            identity,
            metadata_client,
        })
    }
}
