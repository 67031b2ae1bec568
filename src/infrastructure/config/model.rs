//! Configuration model for the orchestrator.

use serde::{Deserialize, Serialize};

/// Top level configuration, assembled by [`super::ConfigLoader`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub image_api: ImageApiSection,

    #[serde(default)]
    pub admission: AdmissionConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub notifier: NotifierSection,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            image_api: ImageApiSection::default(),
            admission: AdmissionConfig::default(),
            dispatch: DispatchConfig::default(),
            notifier: NotifierSection::default(),
            server: ServerConfig::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// `TEST_DB_*` in spec terms; we run on SQLite rather than the original's
/// Postgres-style pool, so only the fields that still apply survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,
}

fn default_database_path() -> String {
    "orchestrator.db".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_stale_timeout_secs() -> u64 {
    600
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            stale_timeout_secs: default_stale_timeout_secs(),
        }
    }
}

/// `BROKER_REDIS_URL` plus the queue naming env vars (`STANDARD_QUEUE`,
/// `LUMINA_QUEUE`, `SUBTASK_QUEUE`, `SUBTASK_OPS_QUEUE`). The two-logical-queue
/// model (`normal`/`ops`) collapses the four spec.md queue names onto one
/// `key_prefix`; `standard_queue`/`lumina_queue` are kept only so operators
/// configuring Redis externally can still see the names spec.md documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_standard_queue")]
    pub standard_queue: String,

    #[serde(default = "default_lumina_queue")]
    pub lumina_queue: String,

    #[serde(default = "default_subtask_queue")]
    pub subtask_queue: String,

    #[serde(default = "default_subtask_ops_queue")]
    pub subtask_ops_queue: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_key_prefix() -> String {
    "nietest_subtask".to_string()
}

fn default_standard_queue() -> String {
    "test_master".to_string()
}

fn default_lumina_queue() -> String {
    "nietest_master_ops".to_string()
}

fn default_subtask_queue() -> String {
    "nietest_subtask".to_string()
}

fn default_subtask_ops_queue() -> String {
    "nietest_subtask_ops".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            standard_queue: default_standard_queue(),
            lumina_queue: default_lumina_queue(),
            subtask_queue: default_subtask_queue(),
            subtask_ops_queue: default_subtask_ops_queue(),
        }
    }
}

/// `NIETA_XTOKEN` plus the upstream polling env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImageApiSection {
    #[serde(default)]
    pub x_token: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_task_status_url")]
    pub task_status_url: String,

    #[serde(default = "default_lumina_api_url")]
    pub lumina_api_url: String,

    #[serde(default = "default_lumina_task_status_url")]
    pub lumina_task_status_url: String,

    #[serde(default = "default_max_polling_attempts")]
    pub max_polling_attempts: u32,

    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,

    #[serde(default = "default_lumina_max_polling_attempts")]
    pub lumina_max_polling_attempts: u32,

    #[serde(default = "default_lumina_polling_interval_secs")]
    pub lumina_polling_interval_secs: u64,

    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u32,
}

fn default_api_url() -> String {
    "https://api.talesofai.cn/v3/make_image".to_string()
}

fn default_task_status_url() -> String {
    "https://api.talesofai.cn/v1/artifact/task/{task_uuid}".to_string()
}

fn default_lumina_api_url() -> String {
    "https://ops.api.talesofai.cn/v3/make_image".to_string()
}

fn default_lumina_task_status_url() -> String {
    "https://ops.api.talesofai.cn/v1/artifact/task/{task_uuid}".to_string()
}

const fn default_max_polling_attempts() -> u32 {
    30
}

const fn default_polling_interval_secs() -> u64 {
    2
}

const fn default_lumina_max_polling_attempts() -> u32 {
    50
}

const fn default_lumina_polling_interval_secs() -> u64 {
    3
}

const fn default_submit_timeout_secs() -> u64 {
    300
}

const fn default_poll_timeout_secs() -> u64 {
    30
}

const fn default_rate_limit_per_second() -> u32 {
    5
}

impl Default for ImageApiSection {
    fn default() -> Self {
        Self {
            x_token: String::new(),
            api_url: default_api_url(),
            task_status_url: default_task_status_url(),
            lumina_api_url: default_lumina_api_url(),
            lumina_task_status_url: default_lumina_task_status_url(),
            max_polling_attempts: default_max_polling_attempts(),
            polling_interval_secs: default_polling_interval_secs(),
            lumina_max_polling_attempts: default_lumina_max_polling_attempts(),
            lumina_polling_interval_secs: default_lumina_polling_interval_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            rate_limit_per_second: default_rate_limit_per_second(),
        }
    }
}

/// Admission control timing (spec.md §4.4). These rarely need tuning, but
/// are exposed so integration tests and operators can shrink them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdmissionConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_admission_timeout_secs")]
    pub admission_timeout_secs: u64,

    #[serde(default = "default_recent_task_window_secs")]
    pub recent_task_window_secs: i64,
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_admission_timeout_secs() -> u64 {
    60 * 60
}

const fn default_recent_task_window_secs() -> i64 {
    600
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            admission_timeout_secs: default_admission_timeout_secs(),
            recent_task_window_secs: default_recent_task_window_secs(),
        }
    }
}

/// `MAX_RETRIES` and the dispatch delay-curve knobs of spec.md §4.5/§4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_max_retries() -> u32 {
    0
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// `FEISHU_TASK_WEBHOOK_URL` / `FEISHU_DEBUG_WEBHOOK_URL` stand-ins. When
/// `webhook_url` is unset the orchestrator falls back to the logging-only
/// notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotifierSection {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self { webhook_url: None }
    }
}

/// HTTP API bind address and the operator bearer token (`spec.md` §1 scopes
/// the real JWT/user/role layer out; this is the stand-in seam).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub bearer_token: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bearer_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default)]
    pub log_dir: Option<std::path::PathBuf>,

    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    #[serde(default = "default_rotation")]
    pub rotation: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> i64 {
    30
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: default_true(),
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}
