//! Environment-driven configuration.
//!
//! Every setting has a default; unreadable or invalid values are logged and replaced
//! by that default so the service always starts.

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::warn;

use crate::placement::PlacementConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
}

impl AppConfig {
    /// Reads the configuration from the current environment.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
        }
    }
}

/// Listener settings of the HTTP service.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const HOST_VAR: &'static str = "LOAD_PLANNER_API_HOST";
    const PORT_VAR: &'static str = "LOAD_PLANNER_API_PORT";
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::HOST_VAR).as_deref(),
            env_string(Self::PORT_VAR).as_deref(),
        )
    }

    fn from_values(host: Option<&str>, port: Option<&str>) -> Self {
        let (bind_ip, display_host) = match host {
            None => (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string()),
            Some(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => (ip, raw.to_string()),
                Err(err) => {
                    warn!(
                        var = Self::HOST_VAR,
                        value = raw,
                        error = %err,
                        "invalid bind address, using {}",
                        Self::DEFAULT_HOST
                    );
                    (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
                }
            },
        };

        let port = match port.map(|raw| (raw, raw.parse::<u16>())) {
            None => Self::DEFAULT_PORT,
            Some((_, Ok(value))) if value != 0 => value,
            Some((raw, Ok(_))) => {
                warn!(
                    var = Self::PORT_VAR,
                    value = raw,
                    "port must not be 0, using {}",
                    Self::DEFAULT_PORT
                );
                Self::DEFAULT_PORT
            }
            Some((raw, Err(err))) => {
                warn!(
                    var = Self::PORT_VAR,
                    value = raw,
                    error = %err,
                    "invalid port, using {}",
                    Self::DEFAULT_PORT
                );
                Self::DEFAULT_PORT
            }
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Host as configured, for log messages.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Host that a local browser can reach.
    pub fn browse_host(&self) -> &str {
        if self.binds_to_all_interfaces() {
            "localhost"
        } else {
            &self.display_host
        }
    }
}

/// Placement engine tuning.
#[derive(Clone, Debug, Default)]
pub struct PlannerConfig {
    placement: PlacementConfig,
}

impl PlannerConfig {
    const GRID_RESOLUTION_VAR: &'static str = "LOAD_PLANNER_GRID_RESOLUTION_CM";
    const SUPPORT_RATIO_VAR: &'static str = "LOAD_PLANNER_SUPPORT_RATIO";
    const ALLOW_ROTATION_VAR: &'static str = "LOAD_PLANNER_ALLOW_ROTATION";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::GRID_RESOLUTION_VAR).as_deref(),
            env_string(Self::SUPPORT_RATIO_VAR).as_deref(),
            env_string(Self::ALLOW_ROTATION_VAR).as_deref(),
        )
    }

    fn from_values(
        grid_resolution: Option<&str>,
        support_ratio: Option<&str>,
        allow_rotation: Option<&str>,
    ) -> Self {
        let grid_resolution = parse_f64_setting(
            Self::GRID_RESOLUTION_VAR,
            grid_resolution,
            PlacementConfig::DEFAULT_GRID_RESOLUTION,
            |value| value >= PlacementConfig::MIN_GRID_RESOLUTION && value.is_finite(),
            "must be at least 1 cm",
        );
        let support_ratio = parse_f64_setting(
            Self::SUPPORT_RATIO_VAR,
            support_ratio,
            PlacementConfig::DEFAULT_SUPPORT_RATIO,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
        );
        let allow_rotation = allow_rotation
            .and_then(|raw| parse_bool(raw, Self::ALLOW_ROTATION_VAR))
            .unwrap_or(PlacementConfig::DEFAULT_ALLOW_ROTATION);

        Self {
            placement: PlacementConfig::builder()
                .grid_resolution(grid_resolution)
                .support_ratio(support_ratio)
                .allow_rotation(allow_rotation)
                .build(),
        }
    }

    pub fn placement_config(&self) -> PlacementConfig {
        self.placement
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(var = name, error = %err, "cannot read variable, using default");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(var = var_name, value = other, "not a boolean, using default");
            None
        }
    }
}

/// Parses a numeric setting, falling back to `default` when absent or invalid.
///
/// Accepted values that differ from the default are logged, since placement
/// output then no longer matches the reference layout.
fn parse_f64_setting(
    var_name: &str,
    raw: Option<&str>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if validator(value) => {
            let tolerance = default.abs().max(1.0) * 1e-9;
            if (value - default).abs() > tolerance {
                warn!(
                    var = var_name,
                    value,
                    default,
                    "non-default placement setting, layouts will differ from the reference behaviour"
                );
            }
            value
        }
        Ok(_) => {
            warn!(var = var_name, value = raw, "{}, using {}", invalid_hint, default);
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = raw,
                error = %err,
                "not a number, using {}",
                default
            );
            default
        }
    }
}
