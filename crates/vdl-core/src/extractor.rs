//! Source extractors turn a platform page URL into a fetchable source.
//!
//! The planner only depends on this trait; concrete extractors are supplied
//! by the embedding application at engine construction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// How the extracted source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Direct,
    Segmented,
}

/// Result of an extraction: the real media URL plus headers it needs.
#[derive(Debug, Clone)]
pub struct ExtractedSource {
    pub url: String,
    pub kind: SourceKind,
    /// Extra headers (Referer, cookies); added on top of the task's own headers.
    pub headers: HashMap<String, String>,
}

#[async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Platform name as used in the task kind (`platform(<name>)`).
    fn name(&self) -> &str;

    async fn extract(
        &self,
        page_url: &str,
        headers: &HashMap<String, String>,
    ) -> anyhow::Result<ExtractedSource>;
}

/// Extractors by lowercase platform name.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn SourceExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor, replacing any previous one with the same name.
    pub fn register(&mut self, extractor: Arc<dyn SourceExtractor>) {
        self.extractors
            .insert(extractor.name().to_ascii_lowercase(), extractor);
    }

    pub fn with(mut self, extractor: Arc<dyn SourceExtractor>) -> Self {
        self.register(extractor);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceExtractor>> {
        self.extractors.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extractors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl SourceExtractor for Fixed {
        fn name(&self) -> &str {
            "Example"
        }

        async fn extract(
            &self,
            page_url: &str,
            _headers: &HashMap<String, String>,
        ) -> anyhow::Result<ExtractedSource> {
            Ok(ExtractedSource {
                url: format!("{}/master.m3u8", page_url),
                kind: SourceKind::Segmented,
                headers: HashMap::from([("Referer".to_string(), page_url.to_string())]),
            })
        }
    }

    #[tokio::test]
    async fn registry_lookup_is_case_insensitive() {
        let registry = ExtractorRegistry::new().with(Arc::new(Fixed));
        assert_eq!(registry.names(), vec!["example".to_string()]);
        let ext = registry.get("EXAMPLE").unwrap();
        let src = ext.extract("https://site/v/1", &HashMap::new()).await.unwrap();
        assert_eq!(src.url, "https://site/v/1/master.m3u8");
        assert_eq!(src.kind, SourceKind::Segmented);
        assert!(registry.get("other").is_none());
    }
}
