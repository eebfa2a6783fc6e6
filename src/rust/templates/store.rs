use std::collections::{BTreeMap, HashMap};

use ndarray::Array1;

use super::{Domain, TemplateStoreBuilder};
use crate::shape::{NormalizedContour, Shape};

/// Everything known about one category.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub category_key: String,
    /// Unit vectors, in load order
    pub reference_embeddings: Vec<Array1<f32>>,
    /// Normalised once at load time; shapes only
    pub canonical_contour: Option<NormalizedContour>,
    pub per_category_threshold: Option<f32>,
}

impl TemplateEntry {
    pub fn references(key: impl Into<String>, embeddings: Vec<Array1<f32>>) -> Self {
        Self {
            category_key: key.into(),
            reference_embeddings: embeddings,
            canonical_contour: None,
            per_category_threshold: None,
        }
    }

    pub fn contour(shape: Shape, contour: NormalizedContour) -> Self {
        Self {
            category_key: shape.key().to_string(),
            reference_embeddings: Vec::new(),
            canonical_contour: Some(contour),
            per_category_threshold: None,
        }
    }
}

/// Summary of a loaded store
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateStoreInfo {
    pub categories: BTreeMap<Domain, Vec<String>>,
    pub reference_count: usize,
    pub embedding_size: Option<usize>,
}

/// Read-only map from (domain, category key) to [`TemplateEntry`].
///
/// A category with no usable references has no entry at all; `get` returning `None` is the
/// only representation of absence.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    pub(super) domains: HashMap<Domain, BTreeMap<String, TemplateEntry>>,
    pub(super) embedding_size: Option<usize>,
}

impl TemplateStore {
    pub fn builder() -> TemplateStoreBuilder {
        TemplateStoreBuilder::new()
    }

    pub fn get(&self, domain: Domain, key: &str) -> Option<&TemplateEntry> {
        self.domains.get(&domain)?.get(key)
    }

    /// Entries of a domain in ascending key order.
    pub fn entries(&self, domain: Domain) -> impl Iterator<Item = &TemplateEntry> + '_ {
        self.domains.get(&domain).into_iter().flat_map(|m| m.values())
    }

    pub fn category_count(&self, domain: Domain) -> usize {
        self.domains.get(&domain).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.domains.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn canonical_contour(&self, shape: Shape) -> Option<&NormalizedContour> {
        self.get(Domain::Shape, shape.key())?.canonical_contour.as_ref()
    }

    /// Length shared by every reference embedding, if any were loaded.
    pub fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    pub fn info(&self) -> TemplateStoreInfo {
        let categories = Domain::ALL
            .iter()
            .map(|&d| (d, self.entries(d).map(|e| e.category_key.clone()).collect::<Vec<_>>()))
            .filter(|(_, keys)| !keys.is_empty())
            .collect();
        let reference_count = self
            .domains
            .values()
            .flat_map(|m| m.values())
            .map(|e| e.reference_embeddings.len())
            .sum();
        TemplateStoreInfo { categories, reference_count, embedding_size: self.embedding_size }
    }
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<TemplateStore>();
    }
};
