#[cfg(test)]
#[macro_use]
mod mocks;

mod conductor;
mod download_cache;
mod downloader;
mod playback;
mod queue;
mod registry;
mod resolver;
mod retry;
mod traits;
mod types;

pub(crate) use conductor::QueueStateError;
pub(crate) use download_cache::*;
pub(crate) use playback::PlaybackError;
pub(crate) use registry::*;
pub(crate) use resolver::*;
pub(crate) use retry::{Backoff, RetryPolicy};
pub(crate) use traits::*;
pub(crate) use types::*;

#[cfg(test)]
mod playback_tests;
