//! The request context threaded through every hook, and the driver that
//! runs the phases in order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::HeaderMap, Method, StatusCode, Url};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    Config, DefaultRetryer, Error, Hooks, NoOpRetryer, Operation, Phase, Result, RetryConfig,
    Retryer,
};

/// Transport-ready request produced by Build hooks.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Transport response recorded by Send hooks.
///
/// The default value (status `0`, no headers, empty body) stands in when no
/// response was ever received.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Mutable execution context for one call.
///
/// `I` is the input payload encoded by Build hooks; `O` is the output slot
/// filled by Unmarshal hooks. The driver only looks at `error` and the
/// built flag. A request is single-owner and is discarded after `send`.
pub struct Request<I, O> {
    pub config: Arc<Config>,
    pub operation: Operation,
    pub hooks: Hooks<I, O>,
    pub params: I,
    pub data: O,
    /// First error recorded by a hook. `None` means success so far.
    pub error: Option<Error>,
    /// Values for `{name}` placeholders in the operation path.
    pub path_params: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub http_request: Option<HttpRequest>,
    pub http_response: Option<HttpResponse>,
    pub retry: RetryConfig,
    pub retryer: Box<dyn Retryer>,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    built: bool,
    custom_retryer: bool,
}

impl<I, O> fmt::Debug for Request<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("hooks", &self.hooks)
            .field("error", &self.error)
            .field("built", &self.built)
            .field("retry", &self.retry)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<I, O> Request<I, O> {
    /// Creates a request. The retry budget comes from `config`; a
    /// [`DefaultRetryer`] is attached when `max_retries > 0`.
    pub fn new(
        config: Arc<Config>,
        operation: Operation,
        hooks: Hooks<I, O>,
        params: I,
        data: O,
    ) -> Self {
        let mut retry = RetryConfig::new(config.max_retries)
            .with_retry_error_codes(config.retry_error_codes.iter().cloned());
        retry.max_elapsed = config.max_retry_elapsed;
        let retryer = default_retryer(&config, config.max_retries);

        Self {
            config,
            operation,
            hooks,
            params,
            data,
            error: None,
            path_params: Vec::new(),
            query: Vec::new(),
            http_request: None,
            http_response: None,
            retry,
            retryer,
            cancel: None,
            deadline: None,
            built: false,
            custom_retryer: false,
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attaches a cancellation token checked before every send attempt and
    /// raced against transport calls and retry waits.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attaches a custom retryer. It is kept by later [`Self::with_retry`]
    /// calls.
    pub fn with_retryer(mut self, retryer: impl Retryer + 'static) -> Self {
        self.retryer = Box::new(retryer);
        self.custom_retryer = true;
        self
    }

    /// Replaces the retry budget. Unless a custom retryer was attached, the
    /// retryer follows the new budget: a [`DefaultRetryer`] built from the
    /// configured delay when `max_retries > 0`, otherwise [`NoOpRetryer`].
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        if !self.custom_retryer {
            self.retryer = default_retryer(&self.config, retry.max_retries);
        }
        self.retry = retry;
        self
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancellation or deadline error if either already fired.
    pub fn interruption(&self) -> Option<Error> {
        if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Some(Error::Canceled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Some(Error::DeadlineExceeded);
        }
        None
    }

    /// Future resolving with the matching error once the request is
    /// canceled or its deadline passes. Pending forever when neither is set.
    pub fn interrupted(&self) -> impl Future<Output = Error> + Send + 'static {
        let token = self.cancel.clone();
        let deadline = self.deadline;
        async move {
            let canceled = async {
                match &token {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending().await,
                }
            };
            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                () = canceled => Error::Canceled,
                () = expired => Error::DeadlineExceeded,
            }
        }
    }

    /// Runs Validate then Build hooks once.
    ///
    /// Later calls return the recorded outcome without re-running hooks,
    /// both after success and after a recorded failure.
    pub async fn build(&mut self) -> Result<()> {
        if !self.built && self.error.is_none() {
            if let Some(err) = self.interruption() {
                self.error = Some(err);
            } else {
                self.run_phase(Phase::Validate).await;
                if self.error.is_none() {
                    self.run_phase(Phase::Build).await;
                    self.built = self.error.is_none();
                }
            }
        }
        self.outcome()
    }

    /// Executes the request: build, send, unmarshal, retry on eligible
    /// failures, and finally run Complete hooks regardless of outcome.
    ///
    /// Returns the request's final error, if any.
    pub async fn send(&mut self) -> Result<()> {
        self.attempt().await;
        if self.http_response.is_none() {
            self.http_response = Some(HttpResponse::default());
        }
        self.run_phase(Phase::Complete).await;
        self.outcome()
    }

    /// Sends the request and hands back the output payload.
    pub async fn execute(mut self) -> Result<O> {
        self.send().await?;
        Ok(self.data)
    }

    async fn attempt(&mut self) {
        if self.build().await.is_err() {
            return;
        }
        self.retry.start();

        loop {
            if let Some(err) = self.interruption() {
                self.error = Some(err);
                return;
            }

            self.run_phase(Phase::Send).await;
            if self.error.is_none() {
                self.run_phase(Phase::Unmarshal).await;
            }
            match &self.error {
                None => return,
                Some(err) if err.is_interruption() => return,
                Some(_) => {}
            }

            self.run_phase(Phase::Retry).await;
            if !self.retryer.is_retryable(&self.retry, self.error.as_ref()) {
                return;
            }

            let delay = self.retry.cap_delay(self.retryer.retry_delay(&self.retry));
            if let Err(err) = self.wait_before_retry(delay).await {
                self.error = Some(err);
                return;
            }

            self.retry.record_retry();
            self.error = None;
            self.http_response = None;
            if self.build().await.is_err() {
                return;
            }
        }
    }

    async fn wait_before_retry(&self, delay: Duration) -> Result<()> {
        if let Some(err) = self.interruption() {
            return Err(err);
        }
        let interrupted = self.interrupted();
        tokio::select! {
            () = sleep(delay) => Ok(()),
            err = interrupted => Err(err),
        }
    }

    async fn run_phase(&mut self, phase: Phase) {
        let hooks = self.hooks.phase(phase).clone();
        hooks.run(self).await;
    }

    fn outcome(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn default_retryer(config: &Config, max_retries: u32) -> Box<dyn Retryer> {
    if max_retries == 0 {
        Box::new(NoOpRetryer)
    } else {
        Box::new(DefaultRetryer::new(config.retry_delay))
    }
}
