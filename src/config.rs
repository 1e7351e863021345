use std::{net::SocketAddr, path::PathBuf};

use crate::{
    constants::{
        DEFAULT_DOCKER_BIN, DEFAULT_GRADER_FILE_NAME, DEFAULT_IMAGE_NAME, DEFAULT_LISTEN_ADDR,
    },
    core::{domain::RunDefaults, supervisor::SupervisorSettings},
};

pub const LISTEN_ADDR_VAR: &str = "GRADER_LISTEN_ADDR";
pub const DOCKER_BIN_VAR: &str = "GRADER_DOCKER_BIN";
pub const DEFAULT_IMAGE_VAR: &str = "GRADER_DEFAULT_IMAGE";
pub const DEFAULT_SCRIPT_VAR: &str = "GRADER_DEFAULT_SCRIPT";
pub const CAPTURE_LIMIT_VAR: &str = "GRADER_CAPTURE_LIMIT_BYTES";

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub docker_bin: PathBuf,
    pub supervisor: SupervisorSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let listen_addr_value =
            non_empty(LISTEN_ADDR_VAR).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr_value
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: LISTEN_ADDR_VAR,
                value: listen_addr_value.clone(),
                reason: e.to_string(),
            })?;

        let capture_limit = match non_empty(CAPTURE_LIMIT_VAR) {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: CAPTURE_LIMIT_VAR,
                        value,
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Ok(limit) => Some(limit),
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: CAPTURE_LIMIT_VAR,
                        value,
                        reason: e.to_string(),
                    });
                }
            },
            None => None,
        };

        Ok(Self {
            listen_addr,
            docker_bin: non_empty(DOCKER_BIN_VAR)
                .unwrap_or_else(|| DEFAULT_DOCKER_BIN.to_string())
                .into(),
            supervisor: SupervisorSettings {
                defaults: RunDefaults {
                    image_name: non_empty(DEFAULT_IMAGE_VAR)
                        .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
                    grader_file_name: non_empty(DEFAULT_SCRIPT_VAR)
                        .unwrap_or_else(|| DEFAULT_GRADER_FILE_NAME.to_string()),
                },
                capture_limit,
                ..SupervisorSettings::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::constants::KILL_GRACE_PERIOD;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.listen_addr, "[::1]:50051".parse().unwrap());
        assert_eq!(config.docker_bin, PathBuf::from("docker"));
        assert_eq!(config.supervisor.defaults, RunDefaults::default());
        assert_eq!(config.supervisor.capture_limit, None);
        assert_eq!(config.supervisor.grace_period, KILL_GRACE_PERIOD);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (LISTEN_ADDR_VAR, "0.0.0.0:7000"),
            (DOCKER_BIN_VAR, "/usr/bin/podman"),
            (DEFAULT_IMAGE_VAR, "grader-py312:3"),
            (DEFAULT_SCRIPT_VAR, "evaluate.py"),
            (CAPTURE_LIMIT_VAR, "1048576"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:7000".parse().unwrap());
        assert_eq!(config.docker_bin, PathBuf::from("/usr/bin/podman"));
        assert_eq!(config.supervisor.defaults.image_name, "grader-py312:3");
        assert_eq!(config.supervisor.defaults.grader_file_name, "evaluate.py");
        assert_eq!(config.supervisor.capture_limit, Some(1048576));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup(&[(DOCKER_BIN_VAR, "  "), (CAPTURE_LIMIT_VAR, "")]))
                .unwrap();

        assert_eq!(config.docker_bin, PathBuf::from("docker"));
        assert_eq!(config.supervisor.capture_limit, None);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [(LISTEN_ADDR_VAR, "localhost")],
            [(CAPTURE_LIMIT_VAR, "lots")],
            [(CAPTURE_LIMIT_VAR, "0")],
        ] {
            let result = ServiceConfig::from_lookup(lookup(&vars));
            assert!(
                matches!(result, Err(ConfigError::Invalid { var, .. }) if var == vars[0].0),
                "vars {vars:?}"
            );
        }
    }
}
