use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use drop_dispatch::FeedFilters;

/// Server configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the drops API
    pub api_base_url: String,
    /// Bearer token for the drops API, if it requires one
    pub api_key: Option<String>,
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Directory for persisted state; in-memory when unset
    pub data_dir: Option<PathBuf>,
    /// Watch filters forwarded to the feed
    pub filters: FeedFilters,
}

impl ServerConfig {
    /// Read the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("DROPS_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let api_key = std::env::var("DROPS_API_KEY").ok();
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let data_dir = std::env::var("WATCH_DATA_DIR").ok().map(PathBuf::from);

        let dates = std::env::var("WATCH_DATES").ok();
        let party_sizes = std::env::var("WATCH_PARTY_SIZES").ok();
        let time_after = std::env::var("WATCH_TIME_AFTER").ok();
        let time_before = std::env::var("WATCH_TIME_BEFORE").ok();

        let filters = FeedFilters {
            dates: parse_dates(dates.as_deref())?,
            party_sizes: parse_party_sizes(party_sizes.as_deref())?,
            time_after: parse_time(time_after.as_deref(), "WATCH_TIME_AFTER")?,
            time_before: parse_time(time_before.as_deref(), "WATCH_TIME_BEFORE")?,
        };

        Ok(Self {
            api_base_url,
            api_key,
            bind_addr,
            data_dir,
            filters,
        })
    }
}

fn parse_dates(raw: Option<&str>) -> Result<Vec<NaiveDate>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            NaiveDate::parse_from_str(part, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}' in WATCH_DATES", part))
        })
        .collect()
}

fn parse_party_sizes(raw: Option<&str>) -> Result<Vec<u32>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("Invalid party size '{}' in WATCH_PARTY_SIZES", part))
        })
        .collect()
}

fn parse_time(raw: Option<&str>, var: &str) -> Result<Option<NaiveTime>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{}' in {}, expected HH:MM", raw.trim(), var))?;
    Ok(Some(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_dates(None).unwrap(), vec![]);
        assert_eq!(parse_dates(Some("")).unwrap(), vec![]);

        let dates = parse_dates(Some("2026-02-18, 2026-02-19")).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 2, 18).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 19).unwrap(),
            ]
        );

        assert!(parse_dates(Some("02/18/2026")).is_err());
    }

    #[test]
    fn test_parse_party_sizes() {
        assert_eq!(parse_party_sizes(Some("2,4")).unwrap(), vec![2, 4]);
        assert!(parse_party_sizes(Some("two")).is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time(Some("18:30"), "WATCH_TIME_AFTER").unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0)
        );
        assert_eq!(parse_time(None, "WATCH_TIME_AFTER").unwrap(), None);
        assert!(parse_time(Some("6pm"), "WATCH_TIME_AFTER").is_err());
    }
}
