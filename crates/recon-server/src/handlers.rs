//! Route handlers: parameter validation, one [`Recon`] call, status mapping.

use axum::Json;
use axum::extract::{Query as QueryParams, State};
use axum::http::StatusCode;
use recon_core::{
    HeaderAuditReport, HttpInfoReport, ProbeReport, Query, QueryKind, QueryOptions, Recon,
    RobotsReport, SubdomainReport, TechReport, TopPortsReport, WaybackMode, WaybackReport,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ApiError;

/// Shared, immutable per-process state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator for every query kind.
    pub recon: Recon,
}

impl AppState {
    /// Wrap a configured [`Recon`].
    pub const fn new(recon: Recon) -> Self {
        Self { recon }
    }
}

type Shared = State<Arc<AppState>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Query-string parameters accepted across endpoints.
///
/// Everything is optional text so a bad value never turns into an extractor
/// rejection; validation happens in [`Params::query`].
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    domain: Option<String>,
    url: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    record_type: Option<String>,
    host: Option<String>,
    target: Option<String>,
    ip: Option<String>,
    mode: Option<String>,
    limit: Option<String>,
}

impl Params {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "domain" => self.domain.as_deref(),
            "url" => self.url.as_deref(),
            "name" => self.name.as_deref(),
            "host" => self.host.as_deref(),
            "target" => self.target.as_deref(),
            "ip" => self.ip.as_deref(),
            _ => None,
        }
    }

    /// Build the query for `kind`, rejecting a missing target with 400.
    fn query(&self, kind: QueryKind) -> Result<Query, ApiError> {
        let target = kind.required_param().and_then(|field| self.field(field));
        let options = QueryOptions {
            record_type: self.record_type.clone(),
            mode: WaybackMode::from_param(self.mode.as_deref()),
            // Unparseable limits fall back to the configured default.
            limit: self.limit.as_deref().and_then(|l| l.trim().parse().ok()),
        };
        Ok(Query::new(kind, target, options)?)
    }
}

/// `GET /api/subdomains?domain=`
pub async fn subdomains(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<SubdomainReport> {
    let query = params.query(QueryKind::SubdomainEnum)?;
    Ok(Json(state.recon.subdomains(&query).await?))
}

/// `GET /api/wayback?url=&mode=&limit=`
///
/// An archive-blocked target answers 451 with an empty result body.
pub async fn wayback(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> Result<(StatusCode, Json<WaybackReport>), ApiError> {
    let kind = match WaybackMode::from_param(params.mode.as_deref()) {
        WaybackMode::Snapshots => QueryKind::WaybackSnapshot,
        WaybackMode::Urls => QueryKind::WaybackUrlList,
    };
    let query = params.query(kind)?;
    let report = state.recon.wayback(&query).await?;
    let status = if report.is_blocked() {
        StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

/// `GET /api/dns?name=&type=`
pub async fn dns(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<Value> {
    let query = params.query(QueryKind::DnsLookup)?;
    Ok(Json(state.recon.dns(&query).await?))
}

/// `GET /api/headers?url=`
pub async fn headers(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<HeaderAuditReport> {
    let query = params.query(QueryKind::HeaderAudit)?;
    Ok(Json(state.recon.headers(&query).await?))
}

/// `GET /api/ssllabs?host=`
pub async fn ssllabs(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<Value> {
    let query = params.query(QueryKind::TlsGrade)?;
    Ok(Json(state.recon.tls_grade(&query).await?))
}

/// `GET /api/techstack?url=`
pub async fn techstack(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<TechReport> {
    let query = params.query(QueryKind::TechFingerprint)?;
    Ok(Json(state.recon.techstack(&query).await?))
}

/// `GET /api/robots?url=`
pub async fn robots(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<RobotsReport> {
    let query = params.query(QueryKind::RobotsFetch)?;
    Ok(Json(state.recon.robots(&query).await?))
}

/// `GET /api/content-discovery?url=`
pub async fn content_discovery(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<ProbeReport> {
    let query = params.query(QueryKind::ContentProbe)?;
    Ok(Json(state.recon.content_probe(&query).await?))
}

/// `GET /api/asn?target=`
pub async fn asn(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<Value> {
    let query = params.query(QueryKind::AsnLookup)?;
    let value = state.recon.asn(&query).await.map_err(ApiError::upstream)?;
    Ok(Json(value))
}

/// `GET /api/httpinfo?url=`
pub async fn httpinfo(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<HttpInfoReport> {
    let query = params.query(QueryKind::HttpInfo)?;
    Ok(Json(state.recon.http_info(&query).await?))
}

/// `GET /api/topports?limit=`
pub async fn topports(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<TopPortsReport> {
    let query = params.query(QueryKind::TopPorts)?;
    Ok(Json(state.recon.top_ports(&query).await.map_err(ApiError::upstream)?))
}

/// `GET /api/ipreputation?ip=`
pub async fn ipreputation(
    State(state): Shared,
    QueryParams(params): QueryParams<Params>,
) -> ApiResult<Value> {
    let query = params.query(QueryKind::IpReputation)?;
    let value = state.recon.ip_reputation(&query).await.map_err(ApiError::upstream)?;
    Ok(Json(value))
}

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
