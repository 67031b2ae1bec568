//! Notifier adapters (C9, supplement grounded in
//! `original_source/backend/utils/feishu.py`): a default tracing-backed
//! sink and an optional webhook POST, both fire-and-forget.

mod log_sink;
mod webhook;

pub use log_sink::LoggingNotifier;
pub use webhook::HttpWebhookNotifier;
