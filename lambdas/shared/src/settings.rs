//! Process-level settings read from the Lambda environment

use std::time::Duration;
use tracing::warn;

use crate::chunker::DEFAULT_MAX_POLICY_SIZE;

const PERMISSIONS_API_URL_ENV: &str = "DD_IAM_PERMISSIONS_API_URL";
const MAX_POLICY_SIZE_ENV: &str = "DD_MAX_POLICY_SIZE";
const MAX_POLICIES_ENV: &str = "DD_MAX_POLICIES";
const REPORTING_MARGIN_ENV: &str = "DD_REPORTING_MARGIN_MS";
const LOG_STREAM_ENV: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

const DEFAULT_PERMISSIONS_API_URL: &str =
    "https://api.datadoghq.com/api/v2/integration/aws/iam_permissions";
/// Largest cleanup range any template has used
pub const DEFAULT_MAX_POLICIES: usize = 10;
const DEFAULT_REPORTING_MARGIN_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the public IAM permission lists
    pub permissions_api_url: String,
    /// Byte budget of one managed policy document
    pub max_policy_size: usize,
    /// Number of `-partN` policies created and cleaned up
    pub max_policies: usize,
    /// Time kept back from the Lambda deadline for the callback PUT
    pub reporting_margin: Duration,
    pub log_stream: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            permissions_api_url: DEFAULT_PERMISSIONS_API_URL.to_string(),
            max_policy_size: DEFAULT_MAX_POLICY_SIZE,
            max_policies: DEFAULT_MAX_POLICIES,
            reporting_margin: Duration::from_millis(DEFAULT_REPORTING_MARGIN_MS),
            log_stream: String::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            permissions_api_url: lookup(PERMISSIONS_API_URL_ENV)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.permissions_api_url),
            max_policy_size: parse_or(&lookup, MAX_POLICY_SIZE_ENV, defaults.max_policy_size),
            max_policies: parse_or(&lookup, MAX_POLICIES_ENV, defaults.max_policies),
            reporting_margin: Duration::from_millis(parse_or(
                &lookup,
                REPORTING_MARGIN_ENV,
                DEFAULT_REPORTING_MARGIN_MS,
            )),
            log_stream: lookup(LOG_STREAM_ENV).unwrap_or_default(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "Ignoring unparsable setting");
            default
        }),
        None => default,
    }
}
