use std::sync::Arc;

use crate::{Config, Hooks, Operation, Request, Result};

/// Shared entry point for building requests against one API.
///
/// The client owns an immutable [`Config`]; hook templates are built once
/// by the caller (usually with [`crate::handlers::default_hooks`]) and
/// cloned into every request, so per-request customization never reaches
/// the template.
#[derive(Clone, Debug)]
pub struct Client {
    config: Arc<Config>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `REQHOOK_ENDPOINT` — base endpoint URL
    /// - `REQHOOK_TOKEN` — bearer token (prefix optional)
    ///
    /// Returns an error if either variable is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reqhook::Client;
    ///
    /// let client = Client::from_env().expect("missing REQHOOK_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint = std::env::var("REQHOOK_ENDPOINT")
            .map_err(|_| "missing REQHOOK_ENDPOINT environment variable".to_owned())?;
        let token = std::env::var("REQHOOK_TOKEN")
            .map_err(|_| "missing REQHOOK_TOKEN environment variable".to_owned())?;
        if endpoint.trim().is_empty() {
            return Err("REQHOOK_ENDPOINT is set but empty".to_owned());
        }
        if token.trim().is_empty() {
            return Err("REQHOOK_TOKEN is set but empty".to_owned());
        }
        Ok(Self::new(Config::new(endpoint).with_bearer(token)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a request with its own copy of `hooks`.
    pub fn new_request<I, O>(
        &self,
        operation: Operation,
        hooks: &Hooks<I, O>,
        params: I,
        data: O,
    ) -> Request<I, O> {
        Request::new(
            Arc::clone(&self.config),
            operation,
            hooks.clone(),
            params,
            data,
        )
    }

    /// Builds, sends and decodes one call into a default-initialized output.
    pub async fn call<I, O>(
        &self,
        operation: Operation,
        hooks: &Hooks<I, O>,
        params: I,
    ) -> Result<O>
    where
        O: Default,
    {
        self.new_request(operation, hooks, params, O::default())
            .execute()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::{Config, Hook, Hooks, Operation, Request};

    #[test]
    fn debug_redacts_authorization_value() {
        let client =
            Client::new(Config::new("https://api.example.com").with_bearer("secret-token"));
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn requests_get_independent_hook_copies() {
        let client = Client::new(Config::new("http://127.0.0.1"));
        let mut template: Hooks<(), String> = Hooks::new();
        template
            .send
            .push_back(Hook::sync("send", |request: &mut Request<(), String>| {
                request.data.push_str("send:");
            }));

        let mut request =
            client.new_request(Operation::get("Ping", "/ping"), &template, (), String::new());
        request
            .hooks
            .send
            .push_front(Hook::sync("trace", |request: &mut Request<(), String>| {
                request.data.push_str("trace:");
            }));

        assert_eq!(request.execute().await.expect("call"), "trace:send:");
        assert_eq!(template.send.len(), 1);

        let output = client
            .call(Operation::get("Ping", "/ping"), &template, ())
            .await
            .expect("call");
        assert_eq!(output, "send:");
    }
}
