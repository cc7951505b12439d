//! Test doubles for the tag engine core
//!
//! In-memory mock implementations of the repository and queue traits plus
//! fluent builders for fixtures, so unit tests run without a database or a
//! message broker.

pub mod builders;
pub mod mocks;

pub use builders::TagConfigBuilder;
pub use mocks::{
    MockConfigRepository, MockJobRepository, MockShardRepository, MockTaskRepository,
    MockWorkQueue,
};
