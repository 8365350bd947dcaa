//! Protocol and runtime constants
//!
//! Centralized location for the timeouts, defaults and wire literals shared by
//! every layer.

use std::time::Duration;

// Configuration defaults
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_CALLBACK_PORT: u16 = 8888;
pub const DEFAULT_SCOPE: &str = "read write";
pub const DEFAULT_TOKEN_FILE: &str = ".authgate-tokens.json";

// OAuth endpoints (relative to the server URL)
pub const DEVICE_CODE_PATH: &str = "/oauth/device/code";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const TOKEN_INFO_PATH: &str = "/oauth/tokeninfo";
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const CALLBACK_PATH: &str = "/callback";

// Grant types
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
pub const GRANT_DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";

// Timeouts
pub const OAUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);
pub const CALLBACK_IO_TIMEOUT: Duration = Duration::from_secs(10);
pub const LISTENER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
pub const STALE_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const LOCK_ACQUIRE_BUDGET: Duration = Duration::from_secs(40);
pub const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

// Device flow polling
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const POLL_INTERVAL_CEILING: Duration = Duration::from_secs(60);
pub const SLOW_DOWN_MULTIPLIER: f64 = 1.5;
pub const PROGRESS_TICK: Duration = Duration::from_secs(2);

