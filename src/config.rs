use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::pricing::PricingPolicy;

/// Whether analytics include every sales point or only production ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AnalyticsMode {
    /// Everything, including internal test sales points.
    #[default]
    Dev,
    /// Only sales points listed in [`AnalyticsScope::production_sales_points`].
    Production,
}

/// Sales-point filter applied by the revenue attributor.
///
/// Passed explicitly into every aggregation so two scopes can be evaluated
/// side by side against the same ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsScope {
    pub mode: AnalyticsMode,
    #[serde(default)]
    pub production_sales_points: Vec<String>,
}

impl AnalyticsScope {
    pub fn dev() -> Self {
        Self::default()
    }

    pub fn production(sales_point_ids: Vec<String>) -> Self {
        Self {
            mode: AnalyticsMode::Production,
            production_sales_points: sales_point_ids,
        }
    }

    /// Sales points to restrict to, or `None` when everything is included.
    ///
    /// Production mode with an empty list includes everything.
    pub fn sales_point_filter(&self) -> Option<&[String]> {
        match self.mode {
            AnalyticsMode::Production if !self.production_sales_points.is_empty() => {
                Some(&self.production_sales_points)
            }
            _ => None,
        }
    }

    pub fn includes(&self, sales_point_id: &str) -> bool {
        self.sales_point_filter()
            .is_none_or(|ids| ids.iter().any(|id| id == sales_point_id))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    pub analytics: AnalyticsScope,
    pub pricing: PricingPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYSMITH_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let mode = env::var("ANALYTICS_MODE")
            .ok()
            .and_then(|v| match AnalyticsMode::from_str(v.trim()) {
                Ok(mode) => Some(mode),
                Err(_) => {
                    tracing::warn!("Ignoring invalid ANALYTICS_MODE={:?}, using dev", v);
                    None
                }
            })
            .unwrap_or_default();

        let production_sales_points = env::var("PRODUCTION_SALES_POINTS")
            .map(|v| parse_id_list(&v))
            .unwrap_or_default();

        let pricing = env::var("PRICING_POLICY")
            .ok()
            .and_then(|v| match v.parse::<PricingPolicy>() {
                Ok(policy) => Some(policy),
                Err(e) => {
                    tracing::warn!("{}, using actual prices", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "keysmith.db".to_string()),
            dev_mode,
            analytics: AnalyticsScope {
                mode,
                production_sales_points,
            },
            pricing,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
