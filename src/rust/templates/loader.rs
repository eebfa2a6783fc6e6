use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::Array1;

use super::{Domain, TemplateStore, TemplateStoreBuilder};
use crate::canvas::Canvas;
use crate::classifier::AssessmentError;
use crate::config::Thresholds;
use crate::embedding::EmbeddingProvider;
use crate::shape::{Shape, ShapeClassifier};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Reads a template root laid out as
///
/// ```text
/// letters/<L>/*.png        upper- and lowercase drawings, all filed under the uppercase letter
/// digits/<d>/*.png
/// sentences/<id>/*.png
/// shapes/<shape>_canonical.png
/// ```
///
/// and embeds every reference with the given provider. Unreadable references are logged
/// and skipped; a category left with nothing usable is left out of the store.
pub struct TemplateLoader<'a> {
    root: PathBuf,
    provider: &'a dyn EmbeddingProvider,
    shapes: &'a ShapeClassifier,
    thresholds: Option<&'a Thresholds>,
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            paths.sort();
            paths
        }
        Err(e) => {
            warn!("Cannot read {:?}: {}", dir, e);
            Vec::new()
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
}

impl<'a> TemplateLoader<'a> {
    pub fn new(root: impl Into<PathBuf>, provider: &'a dyn EmbeddingProvider, shapes: &'a ShapeClassifier) -> Self {
        Self { root: root.into(), provider, shapes, thresholds: None }
    }

    pub fn with_thresholds(mut self, thresholds: &'a Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    fn load_canvas(path: &Path) -> Option<Canvas> {
        let bytes = fs::read(path).map_err(|e| warn!("Skipping {:?}: {}", path, e)).ok()?;
        Canvas::decode(&bytes).map_err(|e| warn!("Skipping {:?}: {}", path, e)).ok()
    }

    fn embed_file(&self, path: &Path) -> Option<Array1<f32>> {
        let canvas = Self::load_canvas(path)?;
        match self.provider.embed(&canvas) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                None
            }
        }
    }

    fn add_category(
        builder: TemplateStoreBuilder,
        domain: Domain,
        key: &str,
        embeddings: Vec<Array1<f32>>,
    ) -> Result<TemplateStoreBuilder, AssessmentError> {
        if embeddings.is_empty() {
            warn!("No usable references for {} '{}'; category left out", domain, key);
            return Ok(builder);
        }
        debug!("{} '{}': {} references", domain, key, embeddings.len());
        builder.add_references(domain, key, embeddings)
    }

    fn load_letters(&self, mut builder: TemplateStoreBuilder) -> Result<TemplateStoreBuilder, AssessmentError> {
        let dir = self.root.join(Domain::Letter.dir_name());
        // letters/a and letters/A feed the same category
        let mut letters: BTreeMap<char, Vec<Array1<f32>>> = BTreeMap::new();
        for letter_dir in list_dir(&dir).into_iter().filter(|p| p.is_dir()) {
            let name = file_stem(&letter_dir);
            let mut chars = name.chars();
            let letter = match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
                _ => {
                    warn!("Ignoring {:?}: not a single letter", letter_dir);
                    continue;
                }
            };

            let references = letters.entry(letter).or_default();
            for path in list_dir(&letter_dir).into_iter().filter(|p| is_image(p)) {
                references.extend(self.embed_file(&path));
            }
        }
        for (letter, references) in letters {
            builder = Self::add_category(builder, Domain::Letter, &letter.to_string(), references)?;
        }
        Ok(builder)
    }

    fn load_keyed(&self, domain: Domain, mut builder: TemplateStoreBuilder) -> Result<TemplateStoreBuilder, AssessmentError> {
        let dir = self.root.join(domain.dir_name());
        for category_dir in list_dir(&dir).into_iter().filter(|p| p.is_dir()) {
            let key = category_dir.file_name().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let embeddings: Vec<Array1<f32>> = list_dir(&category_dir)
                .into_iter()
                .filter(|p| is_image(p))
                .filter_map(|p| self.embed_file(&p))
                .collect();
            builder = match Self::add_category(builder, domain, &key, embeddings) {
                Ok(builder) => builder,
                Err(e) => return Err(AssessmentError::Config(format!("{:?}: {}", category_dir, e))),
            };
        }
        Ok(builder)
    }

    fn load_shapes(&self, mut builder: TemplateStoreBuilder) -> Result<TemplateStoreBuilder, AssessmentError> {
        let dir = self.root.join(Domain::Shape.dir_name());
        for shape in Shape::ALL {
            let path = dir.join(shape.template_file_name());
            if !path.exists() {
                warn!("No canonical template for {} at {:?}", shape, path);
                continue;
            }
            let Some(canvas) = Self::load_canvas(&path) else {
                continue;
            };
            match self.shapes.canonical_contour(canvas.gray()) {
                Some(contour) => builder = builder.add_shape(shape, contour)?,
                None => warn!("Canonical template {:?} has no contour", path),
            }
        }
        Ok(builder)
    }

    /// Loads every domain present under the root.
    ///
    /// # Errors
    /// - `ProviderUnavailable` if the root does not exist or nothing usable was found
    /// - `Config` if a category directory has an invalid name
    pub fn load(&self) -> Result<TemplateStore, AssessmentError> {
        if !self.root.is_dir() {
            return Err(AssessmentError::ProviderUnavailable(format!(
                "Template root {:?} does not exist",
                self.root
            )));
        }
        info!("Loading templates from {:?} with the {} embedder", self.root, self.provider.name());

        let mut builder = TemplateStore::builder();
        if let Some(thresholds) = self.thresholds {
            builder = builder.with_threshold_overrides(&thresholds.category_overrides);
        }
        builder = self.load_letters(builder)?;
        builder = self.load_keyed(Domain::Digit, builder)?;
        builder = self.load_keyed(Domain::Sentence, builder)?;
        builder = self.load_shapes(builder)?;
        builder.build()
    }
}
