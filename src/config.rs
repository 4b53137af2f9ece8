use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_DATA_PATH: &str = "data/transactions_data.csv";
pub const DEFAULT_TEST_DATA_PATH: &str = "data/test_transactions_data.csv";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub test_mode: bool,
    /// CSV source to load; already resolved for the current mode.
    pub data_path: String,
    /// Opt-in tolerance for the balance-inconsistency fraud rule.
    pub fraud_balance_tolerance: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8000")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let host = env_map
            .get("HOST")
            .cloned()
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let test_mode = parse_flag(&env_map, "TEST_MODE")?;

        let data_path = if test_mode {
            env_map
                .get("TEST_DATA_PATH")
                .cloned()
                .unwrap_or_else(|| DEFAULT_TEST_DATA_PATH.to_string())
        } else {
            env_map
                .get("DATA_PATH")
                .cloned()
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
        };
        if data_path.trim().is_empty() {
            let key = if test_mode { "TEST_DATA_PATH" } else { "DATA_PATH" };
            return Err(ConfigError::MissingEnv(key.to_string()));
        }

        let fraud_balance_tolerance = match env_map.get("FRAUD_BALANCE_TOLERANCE") {
            None => None,
            Some(raw) => {
                let tol = raw.trim().parse::<f64>().map_err(|_| {
                    ConfigError::InvalidValue(
                        "FRAUD_BALANCE_TOLERANCE".to_string(),
                        "must be a number".to_string(),
                    )
                })?;
                if !tol.is_finite() || tol < 0.0 {
                    return Err(ConfigError::InvalidValue(
                        "FRAUD_BALANCE_TOLERANCE".to_string(),
                        "must be a non-negative finite number".to_string(),
                    ));
                }
                Some(tol)
            }
        };

        Ok(Config {
            port,
            host,
            test_mode,
            data_path,
            fraud_balance_tolerance,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(env_map: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match env_map.get(key) {
        None => Ok(false),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "" | "0" | "false" | "no" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("must be 1/true/yes or 0/false/no, got {}", other),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.test_mode);
        assert_eq!(config.data_path, DEFAULT_DATA_PATH);
        assert_eq!(config.fraud_balance_tolerance, None);
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn test_test_mode_switches_data_path() {
        for flag in ["1", "true", "YES"] {
            let config = Config::from_env_map(env(&[
                ("TEST_MODE", flag),
                ("DATA_PATH", "/data/prod.csv"),
                ("TEST_DATA_PATH", "/data/test.csv"),
            ]))
            .unwrap();
            assert!(config.test_mode);
            assert_eq!(config.data_path, "/data/test.csv");
        }

        let config = Config::from_env_map(env(&[("TEST_MODE", "1")])).unwrap();
        assert_eq!(config.data_path, DEFAULT_TEST_DATA_PATH);
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_env_map(env(&[("PORT", "not_a_number")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_test_mode() {
        let result = Config::from_env_map(env(&[("TEST_MODE", "maybe")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "TEST_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_data_path() {
        let result = Config::from_env_map(env(&[("DATA_PATH", "  ")]));
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATA_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_fraud_balance_tolerance() {
        let config = Config::from_env_map(env(&[("FRAUD_BALANCE_TOLERANCE", "0.01")])).unwrap();
        assert_eq!(config.fraud_balance_tolerance, Some(0.01));

        for bad in ["abc", "-1", "inf"] {
            let result = Config::from_env_map(env(&[("FRAUD_BALANCE_TOLERANCE", bad)]));
            match result {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FRAUD_BALANCE_TOLERANCE"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }
}
