//! Document registry - the set of documents a provider synchronizes

use crate::document::{DocumentId, Engine};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::sync::Arc;

/// Documents indexed by ID, iterated in registration order
#[derive(Default)]
pub struct Registry {
    documents: IndexMap<DocumentId, Arc<dyn Engine>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            documents: IndexMap::new(),
        }
    }

    /// Register a document under `id`
    pub fn register(&mut self, id: DocumentId, document: Arc<dyn Engine>) -> Result<()> {
        if self.documents.contains_key(&id) {
            return Err(Error::DocumentExists(id.to_string()));
        }

        self.documents.insert(id, document);
        Ok(())
    }

    /// Builder-style [`Registry::register`]
    pub fn with(mut self, id: DocumentId, document: Arc<dyn Engine>) -> Result<Self> {
        self.register(id, document)?;
        Ok(self)
    }

    /// Look up a document by its raw ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Engine>> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Iterate over documents in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &Arc<dyn Engine>)> {
        self.documents.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.documents.keys()).finish()
    }
}
