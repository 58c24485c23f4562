use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_REPORTING_TIMEZONE: Tz = chrono_tz::America::Santiago;

/// How payment rows are joined to appointments when computing revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMatchingMode {
    /// Loose join on the digits of each identifier (legacy rows mix `42`, `00000042`, `APT-00000042`).
    Legacy,
    /// Exact join; only valid once identifiers are written in one canonical format.
    Canonical,
}

impl FromStr for PaymentMatchingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "canonical" => Ok(Self::Canonical),
            other => Err(format!("unknown payment matching mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub reporting_timezone: Tz,
    pub payment_matching: PaymentMatchingMode,
    pub environment: Environment,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            reporting_timezone: DEFAULT_REPORTING_TIMEZONE,
            payment_matching: PaymentMatchingMode::Legacy,
            environment: Environment::Development,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            reporting_timezone: match env::var("REPORTING_TIMEZONE") {
                Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                    warn!("REPORTING_TIMEZONE '{}' is not a known zone, using {}", name, DEFAULT_REPORTING_TIMEZONE);
                    DEFAULT_REPORTING_TIMEZONE
                }),
                Err(_) => defaults.reporting_timezone,
            },
            payment_matching: match env::var("PAYMENT_MATCHING") {
                Ok(mode) => mode.parse().unwrap_or_else(|e: String| {
                    warn!("{}, using legacy matching", e);
                    PaymentMatchingMode::Legacy
                }),
                Err(_) => defaults.payment_matching,
            },
            environment: match env::var("APP_ENV").as_deref() {
                Ok("production") | Ok("prod") => Environment::Production,
                _ => Environment::Development,
            },
            port: parse_port(env::var("PORT").ok(), defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// An unset PORT is silent, an unparseable one is logged.
fn parse_port(raw: Option<String>, default: u16) -> u16 {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("PORT '{}' is not a valid port, using {}", raw, default);
            default
        }),
        None => default,
    }
}
