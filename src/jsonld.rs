//! JSON-LD context loading and document canonicalization.
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use thiserror::Error;

use crate::error::{BoxedError, Error};

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const CREDENTIALS_EXAMPLES_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/examples/v1";
pub const ED25519_2020_V1_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";
pub const JWS_2020_V1_CONTEXT: &str = "https://w3id.org/security/suites/jws-2020/v1";

pub const AT_CONTEXT: &str = "@context";

/// Resolves a remote JSON-LD context by URL.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Value, BoxedError>;
}

impl<F> DocumentLoader for F
where
    F: Fn(&str) -> Result<Value, BoxedError> + Send + Sync,
{
    fn load(&self, url: &str) -> Result<Value, BoxedError> {
        self(url)
    }
}

#[derive(Debug, Error)]
#[error("Unknown context: {0}")]
pub struct UnknownContext(pub String);

/// Loader answering from a fixed set of context documents.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    contexts: BTreeMap<String, Value>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, url: impl Into<String>, document: Value) -> Self {
        self.contexts.insert(url.into(), document);
        self
    }

    /// Add contexts from their JSON text, keyed by URL.
    pub fn with_context_map_from(
        mut self,
        preparsed_context_map: HashMap<String, String>,
    ) -> Result<Self, Error> {
        for (url, jsonld) in preparsed_context_map {
            let document: Value = serde_json::from_str(&jsonld)?;
            self.contexts.insert(url, document);
        }
        Ok(self)
    }
}

impl DocumentLoader for StaticLoader {
    fn load(&self, url: &str) -> Result<Value, BoxedError> {
        match self.contexts.get(url) {
            Some(document) => Ok(document.clone()),
            None => Err(Box::new(UnknownContext(url.to_string()))),
        }
    }
}

/// Turns a JSON-LD document into the bytes that get hashed and signed.
pub trait Canonicalizer: Send + Sync {
    fn canonicalize(
        &self,
        document: &Value,
        loader: Option<&dyn DocumentLoader>,
    ) -> Result<Vec<u8>, Error>;
}

/// JSON Canonicalization Scheme (RFC 8785).
///
/// When a loader is supplied every context referenced by URL must resolve
/// through it; the loaded documents are not expanded into the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JcsCanonicalizer;

impl Canonicalizer for JcsCanonicalizer {
    fn canonicalize(
        &self,
        document: &Value,
        loader: Option<&dyn DocumentLoader>,
    ) -> Result<Vec<u8>, Error> {
        if let Some(loader) = loader {
            let mut urls = Vec::new();
            collect_context_urls(document, &mut urls);
            for url in urls {
                let context = loader.load(url).map_err(|source| Error::DocumentLoader {
                    url: url.to_string(),
                    source,
                })?;
                if !context.is_object() {
                    return Err(Error::Canonicalization(format!(
                        "Context {} is not a JSON object",
                        url
                    )));
                }
            }
        }
        let bytes =
            serde_jcs::to_vec(document).map_err(|e| Error::Canonicalization(e.to_string()))?;
        log::trace!("canonical form is {} bytes", bytes.len());
        Ok(bytes)
    }
}

fn collect_context_urls<'a>(value: &'a Value, urls: &mut Vec<&'a str>) {
    match value {
        Value::Object(object) => {
            for (key, value) in object {
                if key == AT_CONTEXT {
                    match value {
                        Value::String(url) => urls.push(url),
                        Value::Array(items) => {
                            urls.extend(items.iter().filter_map(Value::as_str));
                            items.iter().for_each(|item| collect_context_urls(item, urls));
                        }
                        other => collect_context_urls(other, urls),
                    }
                } else {
                    collect_context_urls(value, urls);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_context_urls(item, urls)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn jcs_sorts_keys() {
        let doc = json!({"b": 1, "a": [true, null]});
        let bytes = JcsCanonicalizer.canonicalize(&doc, None).unwrap();
        assert_eq!(bytes, br#"{"a":[true,null],"b":1}"#);
    }

    #[test]
    fn contexts_resolved_through_loader() {
        let doc = json!({
            "@context": [CREDENTIALS_V1_CONTEXT, {"ex": "https://example.org/"}],
            "proof": {"@context": ED25519_2020_V1_CONTEXT}
        });
        let loader = StaticLoader::new().with_context(CREDENTIALS_V1_CONTEXT, json!({"@context": {}}));
        let err = JcsCanonicalizer
            .canonicalize(&doc, Some(&loader))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CanonicalizationFailed);
        assert!(err.to_string().contains(ED25519_2020_V1_CONTEXT));

        let loader = loader.with_context(ED25519_2020_V1_CONTEXT, json!({"@context": {}}));
        JcsCanonicalizer.canonicalize(&doc, Some(&loader)).unwrap();
    }

    #[test]
    fn context_map_from_text() {
        let mut map = HashMap::new();
        map.insert(
            "https://example.org/ctx".to_string(),
            r#"{"@context": {"name": "https://schema.org/name"}}"#.to_string(),
        );
        let loader = StaticLoader::new().with_context_map_from(map).unwrap();
        assert!(loader.load("https://example.org/ctx").is_ok());
        assert!(loader.load("https://example.org/other").is_err());
    }
}
