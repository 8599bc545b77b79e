use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    routing::{AnyRouter, GeodesicRouter, OsrmClient, OsrmConfig, RoutingError},
    safe_points::{CatalogueError, SafePointIndex},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    #[error("failed to build routing client: {0}")]
    Routing(#[from] RoutingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingBackend {
    #[default]
    Osrm,
    Geodesic,
}

impl FromStr for RoutingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "osrm" => Ok(Self::Osrm),
            "geodesic" | "offline" => Ok(Self::Geodesic),
            other => Err(format!("unknown routing backend {other}")),
        }
    }
}

/// Runtime configuration for the course engine and its HTTP front.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub osrm: OsrmConfig,
    pub backend: RoutingBackend,
    /// JSON catalogue replacing the built-in safe points.
    pub safe_points_path: Option<PathBuf>,
    /// Fixed seed for reproducible courses when a request carries none.
    pub seed: Option<u64>,
    pub bind_addr: SocketAddr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            backend: RoutingBackend::default(),
            safe_points_path: None,
            seed: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("OSRM_URL") {
            config.osrm.base_url = url;
        }
        if let Some(profile) = lookup("OSRM_PROFILE") {
            config.osrm.profile = profile;
        }
        if let Some(secs) = parse::<u64>(&lookup, "ROUTE_TIMEOUT_SECS")? {
            config.osrm.route_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "SNAP_TIMEOUT_SECS")? {
            config.osrm.snap_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse::<u32>(&lookup, "ROUTING_MAX_RETRIES")? {
            config.osrm.retry.max_retries = retries;
        }
        if let Some(backend) = parse::<RoutingBackend>(&lookup, "ROUTING_BACKEND")? {
            config.backend = backend;
        }
        config.safe_points_path = lookup("SAFE_POINTS_JSON").map(PathBuf::from);
        config.seed = parse::<u64>(&lookup, "COURSE_SEED")?;
        if let Some(addr) = parse::<SocketAddr>(&lookup, "BIND_ADDR")? {
            config.bind_addr = addr;
        }

        Ok(config)
    }

    pub fn load_safe_points(&self) -> Result<Arc<SafePointIndex>, ConfigError> {
        match &self.safe_points_path {
            Some(path) => {
                let index = SafePointIndex::from_file(path)?;
                tracing::info!("loaded {} safe points from {}", index.len(), path.display());
                Ok(Arc::new(index))
            }
            None => Ok(SafePointIndex::builtin()),
        }
    }

    pub fn build_router(&self) -> Result<AnyRouter, ConfigError> {
        Ok(match self.backend {
            RoutingBackend::Osrm => {
                tracing::info!(
                    "routing via {} ({} profile)",
                    self.osrm.base_url,
                    self.osrm.profile
                );
                AnyRouter::Osrm(OsrmClient::new(self.osrm.clone())?)
            }
            RoutingBackend::Geodesic => {
                tracing::info!("routing offline along geodesic legs");
                AnyRouter::Geodesic(GeodesicRouter::default())
            }
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}
