use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::ProxyConfig;

/// Static health document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub start_time: String,
    pub proxy: ProxyInfo,
    pub config: ConfigInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyInfo {
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigInfo {
    pub version: String,
    pub routes: usize,
}

impl HealthReport {
    pub fn new(config: &ProxyConfig, started: DateTime<Utc>) -> Self {
        Self {
            status: "UP",
            start_time: started.to_rfc3339_opts(SecondsFormat::Secs, true),
            proxy: ProxyInfo {
                version: env!("CARGO_PKG_VERSION"),
            },
            config: ConfigInfo {
                version: config.version.clone(),
                routes: config.routes.len(),
            },
        }
    }
}

pub async fn health_handler(State(report): State<Arc<HealthReport>>) -> Response {
    Json(report.as_ref()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use chrono::TimeZone;

    #[test]
    fn document_shape() {
        let config = ProxyConfig {
            version: "2.3.0".into(),
            routes: vec![
                RouteConfig::new("/a", "http://a:1"),
                RouteConfig::new("/b", "http://b:1"),
            ],
            ..ProxyConfig::default()
        };
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(HealthReport::new(&config, started)).unwrap();

        assert_eq!(json["status"], "UP");
        assert_eq!(json["startTime"], "2024-05-01T12:00:00Z");
        assert_eq!(json["proxy"]["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["config"]["version"], "2.3.0");
        assert_eq!(json["config"]["routes"], 2);
    }

    #[tokio::test]
    async fn handler_serves_json() {
        let report = Arc::new(HealthReport::new(&ProxyConfig::default(), Utc::now()));
        let response = health_handler(State(report)).await;
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
