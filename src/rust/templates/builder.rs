use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use ndarray::Array1;

use super::store::{TemplateEntry, TemplateStore};
use super::Domain;
use crate::classifier::utils::normalize_vector;
use crate::classifier::AssessmentError;
use crate::shape::{NormalizedContour, Shape};

/// A builder for constructing a [`TemplateStore`] with a fluent interface.
///
/// # Example
/// ```
/// use inkcheck::templates::{Domain, TemplateStore};
/// use ndarray::array;
///
/// let store = TemplateStore::builder()
///     .add_references(Domain::Letter, "A", vec![array![1.0, 0.0]])?
///     .add_references(Domain::Digit, "7", vec![array![0.0, 1.0]])?
///     .build()?;
/// assert_eq!(store.len(), 2);
/// # Ok::<(), inkcheck::AssessmentError>(())
/// ```
#[derive(Debug, Default)]
pub struct TemplateStoreBuilder {
    domains: HashMap<Domain, BTreeMap<String, TemplateEntry>>,
    embedding_size: Option<usize>,
    overrides: BTreeMap<String, f32>,
}

impl TemplateStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-category thresholds, applied to matching keys when the store is built.
    pub fn with_threshold_overrides(mut self, overrides: &BTreeMap<String, f32>) -> Self {
        self.overrides.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        self
    }

    /// Validates a category key according to the following rules:
    /// - Letters are a single ASCII letter; case is significant
    /// - Digits are a single ASCII digit
    /// - Sentence ids are non-empty, at most 128 characters and contain no path separators
    fn validate_key(domain: Domain, key: &str) -> Result<(), AssessmentError> {
        const MAX_SENTENCE_ID: usize = 128;

        let mut chars = key.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        match domain {
            Domain::Letter if single.is_some_and(|c| c.is_ascii_alphabetic()) => Ok(()),
            Domain::Letter => Err(AssessmentError::Input(format!("Letter key must be a single ASCII letter, got '{}'", key))),
            Domain::Digit if single.is_some_and(|c| c.is_ascii_digit()) => Ok(()),
            Domain::Digit => Err(AssessmentError::Input(format!("Digit key must be a single ASCII digit, got '{}'", key))),
            Domain::Sentence => {
                if key.trim().is_empty() {
                    return Err(AssessmentError::Input("Sentence id cannot be empty".into()));
                }
                if key.len() > MAX_SENTENCE_ID {
                    return Err(AssessmentError::Input(format!(
                        "Sentence id is too long ({} chars, max is {})",
                        key.len(),
                        MAX_SENTENCE_ID
                    )));
                }
                if key.contains(['/', '\\']) {
                    return Err(AssessmentError::Input(format!("Sentence id '{}' contains a path separator", key)));
                }
                Ok(())
            }
            Domain::Shape => key
                .parse::<Shape>()
                .map(|_| ())
                .map_err(|_| AssessmentError::Input(format!("Unknown shape key '{}'", key))),
        }
    }

    fn insert(&mut self, domain: Domain, entry: TemplateEntry) -> Result<(), AssessmentError> {
        let categories = self.domains.entry(domain).or_default();
        if categories.contains_key(&entry.category_key) {
            return Err(AssessmentError::Input(format!(
                "Duplicate {} category '{}'",
                domain, entry.category_key
            )));
        }
        categories.insert(entry.category_key.clone(), entry);
        Ok(())
    }

    /// Adds the reference embeddings of one letter, digit or sentence category.
    ///
    /// Each embedding is re-normalised to unit length.
    ///
    /// # Errors
    /// - `Input` if the key is invalid for the domain, or already present
    /// - `Input` if no embeddings are given, one of them is all zeros, or their lengths
    ///   differ from embeddings added earlier
    pub fn add_references(
        mut self,
        domain: Domain,
        key: impl Into<String>,
        embeddings: Vec<Array1<f32>>,
    ) -> Result<Self, AssessmentError> {
        let key = key.into();
        if domain == Domain::Shape {
            return Err(AssessmentError::Input("Shape templates are contours; use add_shape".into()));
        }
        Self::validate_key(domain, &key)?;
        if embeddings.is_empty() {
            return Err(AssessmentError::Input(format!("Category '{}' must have at least one reference", key)));
        }

        let mut normalized = Vec::with_capacity(embeddings.len());
        for (i, embedding) in embeddings.iter().enumerate() {
            let expected = *self.embedding_size.get_or_insert(embedding.len());
            if embedding.len() != expected {
                return Err(AssessmentError::Input(format!(
                    "Reference {} of '{}' has {} dimensions, expected {}",
                    i + 1,
                    key,
                    embedding.len(),
                    expected
                )));
            }
            let unit = normalize_vector(embedding);
            if unit.iter().all(|&x| x == 0.0) {
                return Err(AssessmentError::Input(format!("Reference {} of '{}' is a zero vector", i + 1, key)));
            }
            normalized.push(unit);
        }

        self.insert(domain, TemplateEntry::references(key, normalized))?;
        Ok(self)
    }

    /// Adds the canonical contour of a shape. The contour must already be normalised.
    pub fn add_shape(mut self, shape: Shape, contour: NormalizedContour) -> Result<Self, AssessmentError> {
        if contour.len() < 3 {
            return Err(AssessmentError::Input(format!(
                "Canonical contour for {} has only {} points",
                shape,
                contour.len()
            )));
        }
        self.insert(Domain::Shape, TemplateEntry::contour(shape, contour))?;
        Ok(self)
    }

    /// Number of categories added so far.
    pub fn len(&self) -> usize {
        self.domains.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the store.
    ///
    /// # Errors
    /// - `ProviderUnavailable` if no category at all was added
    pub fn build(mut self) -> Result<TemplateStore, AssessmentError> {
        if self.is_empty() {
            return Err(AssessmentError::ProviderUnavailable("No usable templates were loaded".into()));
        }

        for (key, threshold) in &self.overrides {
            let mut applied = false;
            for domain in [Domain::Letter, Domain::Digit, Domain::Sentence] {
                if let Some(entry) = self.domains.get_mut(&domain).and_then(|m| m.get_mut(key)) {
                    entry.per_category_threshold = Some(*threshold);
                    applied = true;
                }
            }
            if !applied {
                warn!("Threshold override for '{}' matches no loaded category", key);
            }
        }

        for domain in Domain::ALL {
            let count = self.domains.get(&domain).map_or(0, BTreeMap::len);
            info!("Template store: {} {} categories", count, domain);
        }

        Ok(TemplateStore { domains: self.domains, embedding_size: self.embedding_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ContourShape, Point};
    use ndarray::array;

    fn square() -> NormalizedContour {
        ContourShape::new(vec![Point::new(0, 0), Point::new(0, 9), Point::new(9, 9), Point::new(9, 0)]).normalize()
    }

    #[test]
    fn test_key_validation() {
        let builder = || TemplateStore::builder();
        assert!(builder().add_references(Domain::Letter, "AB", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Letter, "7", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Digit, "x", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Sentence, "", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Sentence, "../etc", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Shape, "LINES", vec![array![1.0]]).is_err());
        assert!(builder().add_references(Domain::Sentence, "the_cat_sat", vec![array![1.0]]).is_ok());
    }

    #[test]
    fn test_letters_are_case_sensitive() {
        let store = TemplateStore::builder()
            .add_references(Domain::Letter, "a", vec![array![1.0, 0.0]])
            .unwrap()
            .add_references(Domain::Letter, "A", vec![array![0.0, 1.0]])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(store.category_count(Domain::Letter), 2);
        let keys: Vec<_> = store.entries(Domain::Letter).map(|e| e.category_key.as_str()).collect();
        assert_eq!(keys, vec!["A", "a"]);
    }

    #[test]
    fn test_rejects_duplicates_empties_and_mismatched_lengths() {
        assert!(TemplateStore::builder()
            .add_references(Domain::Digit, "1", vec![array![1.0, 0.0]])
            .unwrap()
            .add_references(Domain::Digit, "1", vec![array![1.0, 0.0]])
            .is_err());
        assert!(TemplateStore::builder().add_references(Domain::Digit, "1", vec![]).is_err());
        assert!(TemplateStore::builder().add_references(Domain::Digit, "1", vec![array![0.0, 0.0]]).is_err());
        assert!(TemplateStore::builder()
            .add_references(Domain::Digit, "1", vec![array![1.0, 0.0]])
            .unwrap()
            .add_references(Domain::Digit, "2", vec![array![1.0, 0.0, 0.0]])
            .is_err());
    }

    #[test]
    fn test_references_are_normalized() {
        let store = TemplateStore::builder()
            .add_references(Domain::Digit, "3", vec![array![3.0, 4.0]])
            .unwrap()
            .build()
            .unwrap();
        let v = &store.get(Domain::Digit, "3").unwrap().reference_embeddings[0];
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert_eq!(store.embedding_size(), Some(2));
    }

    #[test]
    fn test_overrides_and_shapes() {
        let mut overrides = BTreeMap::new();
        overrides.insert("6".to_string(), 0.86);
        let store = TemplateStore::builder()
            .with_threshold_overrides(&overrides)
            .add_references(Domain::Digit, "6", vec![array![1.0, 0.0]])
            .unwrap()
            .add_shape(Shape::Square, square())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(store.get(Domain::Digit, "6").unwrap().per_category_threshold, Some(0.86));
        assert!(store.canonical_contour(Shape::Square).is_some());
        assert!(store.canonical_contour(Shape::Circles).is_none());
        assert_eq!(store.info().reference_count, 1);
    }

    #[test]
    fn test_empty_store_is_unavailable() {
        assert!(matches!(TemplateStore::builder().build(), Err(AssessmentError::ProviderUnavailable(_))));
    }
}
