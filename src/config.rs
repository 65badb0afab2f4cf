use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::models::issue::IssuePriority;
use crate::sla::assignment::ReassignPolicy;
use crate::sla::escalation::EscalationMode;
use crate::sla::policy::{parse_deadlines, SlaPolicy, SlaPolicyError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
    #[error("invalid SLA policy: {0}")]
    Policy(#[from] SlaPolicyError),
}

#[derive(Debug, Clone)]
pub struct RateLimit {
    pub per_millisecond: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub escalation_interval: Duration,
    pub scan_timeout: Duration,
    pub assign_timeout: Duration,
    pub escalation_mode: EscalationMode,
    pub reassign_policy: ReassignPolicy,
    pub ops_email: Option<String>,
    pub sla_policy: SlaPolicy,
    pub leaderboard_top_n: usize,
    pub rate_limit: RateLimit,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let frontend_origin =
            get("FRONTEND_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        let mut sla_policy = SlaPolicy::default();
        for priority in IssuePriority::ALL {
            let name = format!("SLA_POLICY_{}", priority.as_str());
            if let Some(raw) = get(&name) {
                sla_policy = sla_policy.with_override(priority, parse_deadlines(&raw)?);
            }
        }
        sla_policy.validate()?;

        Ok(Config {
            database_url,
            frontend_origin,
            bind_addr: parse_or(&get, "SLA_BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            escalation_interval: seconds(&get, "SLA_ESCALATION_INTERVAL_SECONDS", 300)?,
            scan_timeout: seconds(&get, "SLA_SCAN_TIMEOUT_SECONDS", 30)?,
            assign_timeout: seconds(&get, "SLA_ASSIGN_TIMEOUT_SECONDS", 10)?,
            escalation_mode: parse_or(&get, "SLA_ESCALATION_MODE", EscalationMode::default())?,
            reassign_policy: parse_or(&get, "SLA_REASSIGN_POLICY", ReassignPolicy::default())?,
            ops_email: get("SLA_OPS_EMAIL"),
            sla_policy,
            leaderboard_top_n: parse_or(&get, "SLA_LEADERBOARD_TOP_N", 5)?,
            rate_limit: RateLimit {
                per_millisecond: parse_or(&get, "RATE_LIMITER_MILLISECONDS", 200)?,
                burst_size: parse_or(&get, "RATE_LIMITER_BURST", 20)?,
            },
        })
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            value: raw.clone(),
            reason: err.to_string(),
        }),
    }
}

fn seconds<G>(get: &G, name: &str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, name, default)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value: "0".to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/sla")]).unwrap();
        assert_eq!(config.frontend_origin, "http://localhost:5173");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.escalation_interval, Duration::from_secs(300));
        assert_eq!(config.escalation_mode, EscalationMode::Advisory);
        assert_eq!(config.reassign_policy, ReassignPolicy::Keep);
        assert_eq!(config.sla_policy, SlaPolicy::default());
        assert_eq!(config.leaderboard_top_n, 5);
        assert!(config.ops_email.is_none());
    }

    #[test]
    fn missing_database_url_fails() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn policy_overrides_are_applied_and_validated() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/sla"),
            ("SLA_POLICY_URGENT", "1/12"),
            ("SLA_ESCALATION_MODE", "suggest"),
        ])
        .unwrap();
        assert_eq!(config.sla_policy.urgent.response_hours, 1.0);
        assert_eq!(config.sla_policy.urgent.resolution_hours, 12.0);
        assert_eq!(config.escalation_mode, EscalationMode::Suggest);

        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/sla"),
            ("SLA_POLICY_URGENT", "10/100"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));

        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/sla"),
            ("SLA_POLICY_URGENT", "NaN/NaN"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(SlaPolicyError::Unparseable(_))
        ));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/sla"),
            ("SLA_REASSIGN_POLICY", "sometimes"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SLA_REASSIGN_POLICY"));

        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/sla"),
            ("SLA_SCAN_TIMEOUT_SECONDS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
