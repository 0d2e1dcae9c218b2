//! Service configuration, read from the environment (and `.env`).

use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::domain::pricing::ShippingPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub jwt: JwtConfig,
    pub razorpay: Option<RazorpayConfig>,
    pub shipping: ShippingPolicy,
    pub payment_window: Duration,
    pub max_payment_attempts: u32,
    pub sweep_interval_secs: u64,
    pub admin: Option<AdminSeed>,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig { pub key_id: String, pub key_secret: String }

#[derive(Clone, Debug)]
pub struct AdminSeed { pub email: String, pub password: String }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| get(name).filter(|v| !v.trim().is_empty());
        let value = |name: &str, default: &str| non_empty(name).unwrap_or_else(|| default.to_string());

        let razorpay = match (non_empty("RAZORPAY_KEY_ID"), non_empty("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig { key_id, key_secret }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing { name: "RAZORPAY_KEY_SECRET" }),
            (None, Some(_)) => return Err(ConfigError::Missing { name: "RAZORPAY_KEY_ID" }),
        };
        let admin = match (non_empty("ADMIN_EMAIL"), non_empty("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            port: parse("PORT", &value("PORT", "8083"))?,
            database_url: non_empty("DATABASE_URL"),
            nats_url: non_empty("NATS_URL"),
            currency: value("STORE_CURRENCY", "INR").to_uppercase(),
            jwt: JwtConfig {
                access_secret: non_empty("JWT_ACCESS_SECRET").ok_or(ConfigError::Missing { name: "JWT_ACCESS_SECRET" })?,
                refresh_secret: non_empty("JWT_REFRESH_SECRET").ok_or(ConfigError::Missing { name: "JWT_REFRESH_SECRET" })?,
                access_ttl: Duration::minutes(parse("ACCESS_TOKEN_TTL_MINUTES", &value("ACCESS_TOKEN_TTL_MINUTES", "15"))?),
                refresh_ttl: Duration::days(parse("REFRESH_TOKEN_TTL_DAYS", &value("REFRESH_TOKEN_TTL_DAYS", "7"))?),
            },
            razorpay,
            shipping: ShippingPolicy {
                fee: parse("SHIPPING_FEE", &value("SHIPPING_FEE", "50"))?,
                free_threshold: parse("FREE_SHIPPING_THRESHOLD", &value("FREE_SHIPPING_THRESHOLD", "999"))?,
            },
            payment_window: Duration::minutes(parse("PAYMENT_WINDOW_MINUTES", &value("PAYMENT_WINDOW_MINUTES", "30"))?),
            max_payment_attempts: parse("MAX_PAYMENT_ATTEMPTS", &value("MAX_PAYMENT_ATTEMPTS", "3"))?,
            sweep_interval_secs: parse("PAYMENT_SWEEP_INTERVAL_SECS", &value("PAYMENT_SWEEP_INTERVAL_SECS", "60"))?,
            admin,
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid { name, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [("JWT_ACCESS_SECRET", "a"), ("JWT_REFRESH_SECRET", "r")];

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(lookup(&SECRETS)).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.currency, "INR");
        assert!(cfg.database_url.is_none());
        assert!(cfg.razorpay.is_none());
        assert_eq!(cfg.shipping.free_threshold, Decimal::new(999, 0));
        assert_eq!(cfg.payment_window, Duration::minutes(30));
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(Config::from_lookup(lookup(&[])), Err(ConfigError::Missing { name: "JWT_ACCESS_SECRET" })));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("SHIPPING_FEE", "fifty"));
        assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(ConfigError::Invalid { name: "SHIPPING_FEE", .. })));
    }

    #[test]
    fn test_half_configured_gateway_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("RAZORPAY_KEY_ID", "rzp_test_1"));
        assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(ConfigError::Missing { name: "RAZORPAY_KEY_SECRET" })));
    }
}
