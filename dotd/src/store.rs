//! Holds the latest generation result

use tracing::debug;

use crate::task::GenerationResult;

/// Zero or one result, replaced wholesale
#[derive(Debug, Default)]
pub struct ResultStore {
    current: Option<GenerationResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, result: GenerationResult) {
        debug!(tags = result.tags.len(), "ResultStore::set: called");
        self.current = Some(result);
    }

    pub fn clear(&mut self) {
        debug!("ResultStore::clear: called");
        self.current = None;
    }

    pub fn current(&self) -> Option<&GenerationResult> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(analysis: &str) -> GenerationResult {
        GenerationResult {
            image_url: None,
            analysis: analysis.to_string(),
            recommendation: String::new(),
            tags: vec!["Basic".to_string()],
        }
    }

    #[test]
    fn test_set_replaces_not_merges() {
        let mut store = ResultStore::new();
        assert!(store.current().is_none());

        store.set(result("first"));
        store.set(GenerationResult {
            tags: Vec::new(),
            ..result("second")
        });

        let current = store.current().unwrap();
        assert_eq!(current.analysis, "second");
        assert!(current.tags.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut store = ResultStore::new();
        store.set(result("x"));
        store.clear();
        assert!(store.current().is_none());
    }
}
