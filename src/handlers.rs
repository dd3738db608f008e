//! Stock hooks for JSON-over-HTTP APIs.
//!
//! [`default_hooks`] assembles them into a template that a composition
//! root builds once and clones per request.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::Url;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    wire::ErrorPayload, Error, Hook, Hooks, HttpRequest, HttpResponse, LogLevel, Request, Result,
};

pub const VALIDATE_ENDPOINT: &str = "reqhook.validate_endpoint";
pub const BUILD_JSON_BODY: &str = "reqhook.build_json_body";
pub const SET_HEADER: &str = "reqhook.set_header";
pub const SEND_HTTP: &str = "reqhook.send_http";
pub const UNMARSHAL_JSON: &str = "reqhook.unmarshal_json";
pub const LOG_REQUEST: &str = "reqhook.log_request";
pub const LOG_RESPONSE: &str = "reqhook.log_response";
pub const LOG_RETRY: &str = "reqhook.log_retry";
pub const LOG_ERROR: &str = "reqhook.log_error";

const USER_AGENT_VALUE: &str = concat!("reqhook/", env!("CARGO_PKG_VERSION"));
const JSON: &str = "application/json";

/// Default template: endpoint validation, JSON body, reqwest transport,
/// JSON decoding and level-gated logging.
pub fn default_hooks<I, O>() -> Hooks<I, O>
where
    I: Serialize + Send,
    O: DeserializeOwned + Send,
{
    let mut hooks = Hooks::new();
    hooks.validate.push_back(validate_endpoint());
    hooks.build.push_back(build_json_body());
    hooks.send.push_back(log_request());
    hooks.send.push_back(send_http());
    hooks.unmarshal.push_back(log_response());
    hooks.unmarshal.push_back(unmarshal_json());
    hooks.retry.push_back(log_retry());
    hooks.complete.push_back(log_error());
    hooks
}

/// Validate: the configured endpoint must resolve to an absolute URL.
pub fn validate_endpoint<I, O>() -> Hook<I, O> {
    Hook::sync(VALIDATE_ENDPOINT, |request: &mut Request<I, O>| {
        if request.error.is_some() {
            return;
        }
        let endpoint = request.config.resolved_endpoint();
        if endpoint.is_empty() {
            request.error = Some(Error::Validation("endpoint is not configured".to_owned()));
            return;
        }
        if let Err(err) = Url::parse(&endpoint) {
            request.error = Some(Error::Validation(format!(
                "invalid endpoint '{endpoint}': {err}"
            )));
        }
    })
}

/// Build: resolves the URL and headers and encodes `params` as JSON for
/// methods that carry a body.
pub fn build_json_body<I, O>() -> Hook<I, O>
where
    I: Serialize,
{
    Hook::sync(BUILD_JSON_BODY, |request: &mut Request<I, O>| {
        if request.error.is_some() {
            return;
        }
        match encode_http_request(request) {
            Ok(http) => request.http_request = Some(http),
            Err(err) => request.error = Some(err),
        }
    })
}

/// Build: sets one header on the already-encoded request. Push it after
/// [`build_json_body`].
pub fn set_header<I, O>(name: HeaderName, value: HeaderValue) -> Hook<I, O> {
    Hook::sync(SET_HEADER, move |request: &mut Request<I, O>| {
        if request.error.is_some() {
            return;
        }
        match request.http_request.as_mut() {
            Some(http) => {
                http.headers.insert(name.clone(), value.clone());
            }
            None => {
                request.error = Some(Error::Build(format!(
                    "cannot set header '{name}' before the request body is built"
                )));
            }
        }
    })
}

/// Send: performs the transport call with the configured timeout, racing
/// the request's cancellation token and deadline.
pub fn send_http<I, O>() -> Hook<I, O>
where
    I: Send,
    O: Send,
{
    Hook::new(SEND_HTTP, |request| Box::pin(send(request)))
}

/// Unmarshal: decodes a 2xx body into `data`, anything else into
/// [`Error::Remote`]. An empty 2xx body leaves `data` untouched.
pub fn unmarshal_json<I, O>() -> Hook<I, O>
where
    O: DeserializeOwned,
{
    Hook::sync(UNMARSHAL_JSON, |request: &mut Request<I, O>| {
        if request.error.is_some() {
            return;
        }
        let Some(response) = request.http_response.as_ref() else {
            request.error = Some(Error::Decode("no response to unmarshal".to_owned()));
            return;
        };

        if !response.is_success() {
            request.error = Some(remote_error(response));
            return;
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match serde_json::from_slice::<O>(&response.body) {
            Ok(data) => request.data = data,
            Err(err) => {
                request.error = Some(Error::Decode(format!(
                    "invalid response JSON: {err}; body: {}",
                    response.text()
                )));
            }
        }
    })
}

pub fn log_request<I, O>() -> Hook<I, O> {
    Hook::sync(LOG_REQUEST, |request: &mut Request<I, O>| {
        let level = request.config.log_level;
        let Some(http) = request.http_request.as_ref() else {
            return;
        };
        if level.matches(LogLevel::DEBUG_WITH_HTTP_BODY) {
            tracing::debug!(
                operation = %request.operation.name,
                body = %String::from_utf8_lossy(&http.body),
                "{} {}",
                http.method,
                http.url
            );
        } else if level.matches(LogLevel::DEBUG) {
            tracing::debug!(operation = %request.operation.name, "{} {}", http.method, http.url);
        }
    })
}

pub fn log_response<I, O>() -> Hook<I, O> {
    Hook::sync(LOG_RESPONSE, |request: &mut Request<I, O>| {
        let level = request.config.log_level;
        let Some(response) = request.http_response.as_ref() else {
            return;
        };
        if level.matches(LogLevel::DEBUG_WITH_HTTP_BODY) {
            tracing::debug!(
                operation = %request.operation.name,
                status = response.status,
                body = %response.text(),
                "response received"
            );
        } else if level.matches(LogLevel::DEBUG) {
            tracing::debug!(
                operation = %request.operation.name,
                status = response.status,
                "response received"
            );
        }
    })
}

pub fn log_retry<I, O>() -> Hook<I, O> {
    Hook::sync(LOG_RETRY, |request: &mut Request<I, O>| {
        if !request
            .config
            .log_level
            .matches(LogLevel::DEBUG_WITH_REQUEST_RETRIES)
        {
            return;
        }
        if let Some(err) = &request.error {
            tracing::debug!(
                operation = %request.operation.name,
                retry_count = request.retry.retry_count,
                max_retries = request.retry.max_retries,
                "attempt failed: {err}"
            );
        }
    })
}

pub fn log_error<I, O>() -> Hook<I, O> {
    Hook::sync(LOG_ERROR, |request: &mut Request<I, O>| {
        if !request.config.log_level.matches(LogLevel::ERROR) {
            return;
        }
        if let Some(err) = &request.error {
            tracing::error!(
                operation = %request.operation.name,
                code = %err.code(),
                "request failed: {err}"
            );
        }
    })
}

fn encode_http_request<I, O>(request: &Request<I, O>) -> Result<HttpRequest>
where
    I: Serialize,
{
    let endpoint = request.config.resolved_endpoint();
    let path = request.operation.expand_path(&request.path_params)?;
    let separator = if path.is_empty() || path.starts_with('/') {
        ""
    } else {
        "/"
    };
    let mut url = Url::parse(&format!("{endpoint}{separator}{path}"))
        .map_err(|err| Error::Build(format!("invalid request url: {err}")))?;
    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(
            request
                .query
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON));
    if let Some(authorization) = &request.config.authorization {
        let value = HeaderValue::from_str(authorization)
            .map_err(|_| Error::Build("authorization is not a valid header value".to_owned()))?;
        headers.insert(AUTHORIZATION, value);
    }

    let body = if request.operation.has_body() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        serde_json::to_vec(&request.params)
            .map_err(|err| Error::Build(format!("failed to encode request body: {err}")))?
    } else {
        Vec::new()
    };

    Ok(HttpRequest {
        method: request.operation.method.clone(),
        url,
        headers,
        body,
    })
}

async fn send<I, O>(request: &mut Request<I, O>)
where
    I: Send,
    O: Send,
{
    if request.error.is_some() {
        return;
    }
    let Some(http) = request.http_request.as_ref() else {
        request.error = Some(Error::Build("request was not built".to_owned()));
        return;
    };
    let call = request
        .config
        .http
        .request(http.method.clone(), http.url.clone())
        .headers(http.headers.clone())
        .timeout(Duration::from_millis(request.config.timeout_ms))
        .body(http.body.clone())
        .send();
    let interrupted = request.interrupted();

    let result = tokio::select! {
        result = read_response(call) => result,
        err = interrupted => Err(err),
    };
    match result {
        Ok(response) => request.http_response = Some(response),
        Err(err) => request.error = Some(err),
    }
}

async fn read_response<F>(call: F) -> Result<HttpResponse>
where
    F: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let response = call.await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn remote_error(response: &HttpResponse) -> Error {
    let payload = serde_json::from_slice::<ErrorPayload>(&response.body).unwrap_or_default();
    let message = payload
        .message()
        .filter(|message| !message.is_empty())
        .or_else(|| {
            response
                .status_code()
                .and_then(|status| status.canonical_reason())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "unexpected response status".to_owned());

    Error::Remote {
        status: response.status,
        code: payload.code(),
        message,
        body: response.text(),
    }
}
