pub mod network {
    pub const DEFAULT_API_BASE_URL: &str = "https://advertising-api.amazon.com";
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_AUTH_EXCHANGE_MS: u64 = 5_000;
    pub const USER_AGENT: &str = "ads-mcp/0.3";
}

pub mod headers {
    pub const CLIENT_ID: &str = "amazon-advertising-api-clientid";
    pub const SCOPE: &str = "amazon-advertising-api-scope";
    pub const RETRY_AFTER: &str = "retry-after";
}

pub mod retry {
    pub const MAX_ATTEMPTS: usize = 3;
    pub const INITIAL_DELAY_MS: u64 = 1_000;
    pub const MULTIPLIER: f64 = 2.0;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
}

pub mod reports {
    pub const POLL_MAX_ATTEMPTS: usize = 30;
    pub const POLL_INTERVAL_MS: u64 = 2_000;
    pub const DEFAULT_RANGE_DAYS: i64 = 7;
}

pub mod paging {
    pub const DEFAULT_COUNT: u64 = 100;
    pub const MAX_COUNT: u64 = 5_000;
}

pub mod limits {
    pub const LOG_META_MAX_STRING: usize = 512;
    pub const RESULT_MAX_STRING: usize = 20 * 1024;
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 1_024;
}
