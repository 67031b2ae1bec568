//! Redis adapters: the queue client backing the normal/ops broker lists.

pub mod queue_client;

pub use queue_client::RedisQueueClient;
