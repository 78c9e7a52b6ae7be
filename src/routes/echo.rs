use std::collections::BTreeMap;

use axum::Json;
use axum::extract::Path;
use chrono::{DateTime, SecondsFormat, Utc};
use hostecho_metadata::MetadataValue;
use serde::Serialize;
use serde_json::{Value, json};

use crate::context::EchoContext;

/// Body returned by every echo route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub instance_id: String,
    /// Private IP of the host, `null` when the metadata service could not be reached.
    pub machine_id: Option<MetadataValue>,
    #[serde(rename = "type")]
    pub service_type: String,
    pub deployment: String,
    pub path_params: Value,
    pub query_params: BTreeMap<String, String>,
    pub method: String,
    pub path: String,
    pub start_time: String,
    pub message: String,
}

/// `GET /`
pub async fn root(ctx: EchoContext) -> Json<EchoResponse> {
    let started = Utc::now();
    let response = echo(
        &ctx,
        started,
        json!({}),
        BTreeMap::new(),
        "Hello World, Pathparam: none, Queryparam: none".to_owned(),
    )
    .await;
    Json(response)
}

/// `GET /{param}` and `GET /{param}/query`
pub async fn path_param(ctx: EchoContext, Path(param): Path<String>) -> Json<EchoResponse> {
    let started = Utc::now();
    let query = ctx.request().query.clone();
    let message = format!(
        "Hello World, Pathparam: {param}, Queryparam: {}",
        ctx.request().query_param("message").unwrap_or("none")
    );
    let response = echo(&ctx, started, Value::String(param), query, message).await;
    Json(response)
}

async fn echo(
    ctx: &EchoContext,
    started: DateTime<Utc>,
    path_params: Value,
    query_params: BTreeMap<String, String>,
    message: String,
) -> EchoResponse {
    let machine_id = ctx.machine_id().await;
    tracing::debug!(
        path = %ctx.request().path,
        machine_id = MetadataValue::display_or_unknown(machine_id.as_ref()),
        "echoing request"
    );

    let identity = ctx.identity();
    EchoResponse {
        instance_id: instance_id(started),
        machine_id,
        service_type: identity.service_type.clone(),
        deployment: identity.deployment.label().to_owned(),
        path_params,
        query_params,
        method: ctx.request().method.clone(),
        path: ctx.request().path.clone(),
        start_time: started.to_rfc3339_opts(SecondsFormat::Micros, true),
        message,
    }
}

fn instance_id(at: DateTime<Utc>) -> String {
    format!("inst-{}", at.timestamp_millis())
}
