use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use aclgraph_application::{
    DEFAULT_QUEUE_CAPACITY, InternalErrorPolicy, ProcessorSettings, ReadConsistency,
    ShutdownPolicy,
};
use aclgraph_core::{AppError, AppResult, TenantId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub tenant_ids: Vec<TenantId>,
    pub settings: ProcessorSettings,
    pub stall_threshold: Duration,
    pub liveness_interval: Duration,
}

impl EngineConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty());
        let tenant_ids = parse_tenant_ids(
            lookup("TENANT_IDS")
                .ok_or_else(|| AppError::Validation("TENANT_IDS is required".to_owned()))?
                .as_str(),
        )?;

        let queue_capacity =
            parse_var(&lookup, "COMMAND_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err(AppError::Validation(
                "COMMAND_QUEUE_CAPACITY must be greater than zero".to_owned(),
            ));
        }

        let settings = ProcessorSettings {
            queue_capacity,
            shutdown_policy: parse_var(&lookup, "SHUTDOWN_POLICY", ShutdownPolicy::default())?,
            read_consistency: parse_var(
                &lookup,
                "READ_CONSISTENCY",
                ReadConsistency::default(),
            )?,
            internal_error_policy: parse_var(
                &lookup,
                "INTERNAL_ERROR_POLICY",
                InternalErrorPolicy::default(),
            )?,
            verify_integrity: flag(&lookup, "VERIFY_GRAPH_INTEGRITY"),
            publish_snapshots: flag(&lookup, "PUBLISH_SNAPSHOTS"),
        };

        let stall_threshold_ms = parse_var(&lookup, "LIVENESS_STALL_THRESHOLD_MS", 30_000_u64)?;
        let liveness_interval_ms = parse_var(&lookup, "LIVENESS_CHECK_INTERVAL_MS", 5_000_u64)?;
        if liveness_interval_ms == 0 {
            return Err(AppError::Validation(
                "LIVENESS_CHECK_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            tenant_ids,
            settings,
            stall_threshold: Duration::from_millis(stall_threshold_ms),
            liveness_interval: Duration::from_millis(liveness_interval_ms),
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_tenant_ids(value: &str) -> AppResult<Vec<TenantId>> {
    let mut tenant_ids = Vec::new();
    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
        let tenant_id = TenantId::parse(part)?;
        if !tenant_ids.contains(&tenant_id) {
            tenant_ids.push(tenant_id);
        }
    }

    if tenant_ids.is_empty() {
        return Err(AppError::Validation(
            "TENANT_IDS must name at least one tenant".to_owned(),
        ));
    }

    Ok(tenant_ids)
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
