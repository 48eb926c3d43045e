//! Retry support for row store and object store calls.

pub mod retry;

pub use retry::{Classify, RetryConfig, RetryPolicy, RetryableError};
