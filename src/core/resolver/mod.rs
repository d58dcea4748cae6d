//! External Query Resolver seam.
//!
//! The relay never answers a tool query itself. Whatever reasoning or routing
//! sits behind a query lives in an external collaborator reached through the
//! [`QueryResolver`] trait; the production implementation is a plain HTTP
//! client. The trait is injected into the dispatch bridge at session-creation
//! time, so nothing in this crate holds global mutable state.

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::errors::ResolverError;

/// External collaborator answering a natural-language query.
///
/// Failures never propagate past the dispatch bridge; the caller converts
/// them into a user-facing string.
#[async_trait]
pub trait QueryResolver: Send + Sync {
    /// Resolve a query to plain text. No timeout is applied here; the outer
    /// tool-invocation path bounds total latency.
    async fn resolve(&self, query: &str) -> Result<String, ResolverError>;
}

/// HTTP-backed resolver.
///
/// Posts `{"query": "..."}` to the configured endpoint and accepts either a
/// JSON body with a `result` field or a plain-text body.
pub struct HttpQueryResolver {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpQueryResolver {
    /// Create a resolver for the given endpoint.
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl QueryResolver for HttpQueryResolver {
    async fn resolve(&self, query: &str) -> Result<String, ResolverError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| ResolverError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::Request(format!(
                "resolver returned status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolverError::Response(e.to_string()))?;

        // JSON answers carry the text under "result"; anything else is taken
        // as the answer verbatim
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => match map.get("result") {
                Some(Value::String(result)) => Ok(result.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(ResolverError::Response(
                    "JSON body without a result field".to_string(),
                )),
            },
            Ok(Value::String(text)) => Ok(text),
            _ => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_endpoint_parse() {
        let url = Url::parse("http://127.0.0.1:8090/query").unwrap();
        let resolver = HttpQueryResolver::new(url);
        assert_eq!(resolver.endpoint.path(), "/query");
    }
}
