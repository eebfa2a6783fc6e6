//! Reference templates: embeddings for characters and sentences, canonical contours for
//! shapes. Built once during warm-up and read-only afterwards.

mod builder;
mod loader;
mod store;

use std::fmt;

use serde::Serialize;

pub use builder::TemplateStoreBuilder;
pub use loader::TemplateLoader;
pub use store::{TemplateEntry, TemplateStore, TemplateStoreInfo};

/// The family a category key belongs to. Keys are unique within a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Letter,
    Digit,
    Sentence,
    Shape,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Letter, Domain::Digit, Domain::Sentence, Domain::Shape];

    /// Directory holding this domain's references under the template root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Domain::Letter => "letters",
            Domain::Digit => "digits",
            Domain::Sentence => "sentences",
            Domain::Shape => "shapes",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Letter => "letter",
            Domain::Digit => "digit",
            Domain::Sentence => "sentence",
            Domain::Shape => "shape",
        };
        f.write_str(name)
    }
}
