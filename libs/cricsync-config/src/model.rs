//! Option records for the sync host.
//!
//! Each record is total: `Default` yields a usable instance with no
//! configuration input at all. No field is range-checked; negative
//! timeouts, retry counts or batch sizes are stored as given.

use chrono::NaiveDate;
use serde::Serialize;

use crate::bind::{Section, SectionReader};
use crate::error::ConfigError;
use crate::secret::SecretString;

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: i32 = 30;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: i32 = 3;
pub const DEFAULT_RATE_LIMIT_DELAY_MS: i32 = 1000;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: i32 = 5;
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: i32 = 30;
pub const DEFAULT_BATCH_SIZE: i32 = 50;

/// CricClubs API access parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientConfig {
    pub api_base_url: String,
    pub username: String,
    pub password: SecretString,
    pub api_key: SecretString,
    pub request_timeout_seconds: i32,
    pub max_retry_attempts: i32,
    pub rate_limit_delay_ms: i32,
    pub max_concurrent_requests: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            username: String::new(),
            password: SecretString::default(),
            api_key: SecretString::default(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Section for ClientConfig {
    const NAME: &'static str = "ClientConfig";

    fn bind(section: &SectionReader<'_>) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            api_base_url: section.string("ApiBaseUrl", d.api_base_url),
            username: section.string("Username", d.username),
            password: section.secret("Password", d.password),
            api_key: section.secret("ApiKey", d.api_key),
            request_timeout_seconds: section
                .i32("RequestTimeoutSeconds", d.request_timeout_seconds)?,
            max_retry_attempts: section.i32("MaxRetryAttempts", d.max_retry_attempts)?,
            rate_limit_delay_ms: section.i32("RateLimitDelayMs", d.rate_limit_delay_ms)?,
            max_concurrent_requests: section
                .i32("MaxConcurrentRequests", d.max_concurrent_requests)?,
        })
    }
}

/// Persistence access parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreConfig {
    pub connection_string: String,
    pub command_timeout_seconds: i32,
    pub enable_sensitive_data_logging: bool,
    pub enable_detailed_errors: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            command_timeout_seconds: DEFAULT_COMMAND_TIMEOUT_SECONDS,
            enable_sensitive_data_logging: false,
            enable_detailed_errors: false,
        }
    }
}

impl StoreConfig {
    /// Whether a connection string has been supplied.
    #[must_use]
    pub fn has_connection(&self) -> bool {
        !self.connection_string.is_empty()
    }
}

impl Section for StoreConfig {
    const NAME: &'static str = "StoreConfig";

    fn bind(section: &SectionReader<'_>) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            connection_string: section.string("ConnectionString", d.connection_string),
            command_timeout_seconds: section
                .i32("CommandTimeoutSeconds", d.command_timeout_seconds)?,
            enable_sensitive_data_logging: section
                .bool("EnableSensitiveDataLogging", d.enable_sensitive_data_logging)?,
            enable_detailed_errors: section.bool("EnableDetailedErrors", d.enable_detailed_errors)?,
        })
    }
}

/// Scope of a synchronization run.
///
/// Id lists keep duplicates and bound order. `from_date`/`to_date` form an
/// inclusive range with no ordering check between them.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncOptions {
    pub season_ids: Vec<i32>,
    pub competition_ids: Vec<i32>,
    pub team_ids: Vec<i32>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub include_player_stats: bool,
    pub include_match_details: bool,
    pub calculate_analytics: bool,
    pub sync_historical_data: bool,
    pub batch_size: i32,
    pub match_formats: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            season_ids: Vec::new(),
            competition_ids: Vec::new(),
            team_ids: Vec::new(),
            from_date: None,
            to_date: None,
            include_player_stats: true,
            include_match_details: true,
            calculate_analytics: true,
            sync_historical_data: false,
            batch_size: DEFAULT_BATCH_SIZE,
            match_formats: Vec::new(),
        }
    }
}

impl Section for SyncOptions {
    const NAME: &'static str = "SyncOptions";

    fn bind(section: &SectionReader<'_>) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            season_ids: section.i32_list("SeasonIds", d.season_ids)?,
            competition_ids: section.i32_list("CompetitionIds", d.competition_ids)?,
            team_ids: section.i32_list("TeamIds", d.team_ids)?,
            from_date: section.optional_date("FromDate", d.from_date)?,
            to_date: section.optional_date("ToDate", d.to_date)?,
            include_player_stats: section.bool("IncludePlayerStats", d.include_player_stats)?,
            include_match_details: section.bool("IncludeMatchDetails", d.include_match_details)?,
            calculate_analytics: section.bool("CalculateAnalytics", d.calculate_analytics)?,
            sync_historical_data: section.bool("SyncHistoricalData", d.sync_historical_data)?,
            batch_size: section.i32("BatchSize", d.batch_size)?,
            match_formats: section.string_list("MatchFormats", d.match_formats),
        })
    }
}
