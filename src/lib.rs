//! `reqhook` is a hook-driven async HTTP request pipeline.
//!
//! A [`Request`] passes through ordered hook phases: Validate, Build,
//! Send, Unmarshal, Retry on failure, and Complete, which always runs.
//! A [`Retryer`] decides whether a failed attempt is tried again and how
//! long to back off first:
//! - [`Request::send`] drives the phases
//! - [`HookList`] and [`Hooks`] hold the callbacks
//! - [`DefaultRetryer`] computes jittered exponential backoff
//! - [`handlers::default_hooks`] wires JSON over `reqwest`

mod client;
mod config;
mod error;
mod hook;
mod operation;
mod request;
mod retry;
mod wire;

pub mod handlers;

pub use client::Client;
pub use config::{Config, LogLevel};
pub use error::{Error, Temporary};
pub use hook::{Hook, HookFuture, HookList, Hooks, Phase};
pub use operation::Operation;
pub use request::{HttpRequest, HttpResponse, Request};
pub use retry::{
    apply_jitter, jitter_with, DefaultRetryer, DelayConfig, NoOpRetryer, RetryConfig, Retryer,
};
pub use tokio_util::sync::CancellationToken;
pub use wire::{ErrorField, ErrorPayload};

pub type Result<T> = std::result::Result<T, Error>;
