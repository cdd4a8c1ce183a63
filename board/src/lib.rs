// Core library for the job scheduling board: job records, schedule index,
// per-runner delivery queues, and the atomic tick that connects them.

pub mod board;
pub mod codec;
pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod queue;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use crate::board::Board;
pub use crate::codec::Format;
pub use crate::errors::BoardError;
pub use crate::queue::{JobHandler, ListenConfig, Queue};
pub use crate::schedule::ScheduleDescriptor;
pub use crate::store::{AtomicStore, MemoryStore, RedisStore};
