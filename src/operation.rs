use reqwest::Method;

use crate::{Error, Result};

/// Descriptor of one remote action: a name, an HTTP method and a path
/// template with `{name}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub method: Method,
    pub path: String,
}

impl Operation {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::POST, path)
    }

    /// Whether requests for this operation carry an encoded body.
    pub fn has_body(&self) -> bool {
        !matches!(
            self.method,
            Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS
        )
    }

    /// Expands `{name}` placeholders in one pass over the template.
    ///
    /// Each value is percent-encoded as a single path segment, so it can
    /// neither add segments nor start a query or fragment. Substituted text
    /// is never expanded again. Unknown placeholders are kept verbatim.
    pub fn expand_path(&self, params: &[(String, String)]) -> Result<String> {
        let mut expanded = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            expanded.push_str(&rest[..open]);
            let tail = &rest[open..];
            let Some(close) = tail.find('}') else {
                rest = tail;
                break;
            };
            let name = &tail[1..close];
            match params.iter().find(|(candidate, _)| candidate == name) {
                Some((_, value)) => expanded.push_str(&encode_segment(name, value)?),
                None => expanded.push_str(&tail[..=close]),
            }
            rest = &tail[close + 1..];
        }
        expanded.push_str(rest);
        Ok(expanded)
    }
}

fn encode_segment(name: &str, value: &str) -> Result<String> {
    if value == "." || value == ".." {
        return Err(Error::Build(format!(
            "path parameter '{name}' cannot be a dot segment"
        )));
    }
    Ok(urlencoding::encode(value).into_owned())
}
