//! Source language identifiers.
//!
//! Languages are an open set: a pack introduces a new language simply by
//! naming it. The constants below cover the packs shipped with the crate.

use std::borrow::Cow;
use std::fmt;

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// A source language name such as `typescript` or `go`.
///
/// Names are normalized to lowercase so `"Python"` and `"python"` compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Language(Cow<'static, str>);

impl Language {
    pub const TYPESCRIPT: Language = Language(Cow::Borrowed("typescript"));
    pub const JAVASCRIPT: Language = Language(Cow::Borrowed("javascript"));
    pub const JAVA: Language = Language(Cow::Borrowed("java"));
    pub const PYTHON: Language = Language(Cow::Borrowed("python"));
    pub const GO: Language = Language(Cow::Borrowed("go"));

    /// Create a language from any name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Language(Cow::Owned(name.as_ref().trim().to_ascii_lowercase()))
    }

    /// The normalized language name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Determine the language from a file extension (without the dot).
    ///
    /// Only the languages with a shipped grammar are known here.
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS
            .get(ext.trim_start_matches('.').to_ascii_lowercase().as_str())
            .cloned()
    }

    /// All file extensions with a known language.
    pub fn known_extensions() -> impl Iterator<Item = &'static str> {
        EXTENSIONS.keys().copied()
    }
}

/// File extension to language table.
static EXTENSIONS: phf::Map<&'static str, Language> = phf_map! {
    "ts" => Language::TYPESCRIPT,
    "tsx" => Language::TYPESCRIPT,
    "mts" => Language::TYPESCRIPT,
    "cts" => Language::TYPESCRIPT,
    "js" => Language::JAVASCRIPT,
    "jsx" => Language::JAVASCRIPT,
    "mjs" => Language::JAVASCRIPT,
    "cjs" => Language::JAVASCRIPT,
    "java" => Language::JAVA,
    "py" => Language::PYTHON,
    "pyi" => Language::PYTHON,
    "go" => Language::GO,
};

impl From<String> for Language {
    fn from(name: String) -> Self {
        Language::new(name)
    }
}

impl From<&str> for Language {
    fn from(name: &str) -> Self {
        Language::new(name)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0.into_owned()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Language::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_normalization() {
        assert_eq!(Language::new("Python"), Language::PYTHON);
        assert_eq!(Language::new(" GO "), Language::GO);
        assert_eq!(Language::from("typescript"), Language::TYPESCRIPT);
        assert_ne!(Language::JAVA, Language::JAVASCRIPT);
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TYPESCRIPT));
        assert_eq!(Language::from_extension(".tsx"), Some(Language::TYPESCRIPT));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JAVASCRIPT));
        assert_eq!(Language::from_extension("java"), Some(Language::JAVA));
        assert_eq!(Language::from_extension("PY"), Some(Language::PYTHON));
        assert_eq!(Language::from_extension("go"), Some(Language::GO));
        assert_eq!(Language::from_extension("rs"), None);
    }

    #[test]
    fn test_language_serde() {
        let json = serde_json::to_string(&Language::GO).unwrap();
        assert_eq!(json, "\"go\"");

        let parsed: Language = serde_json::from_str("\"Java\"").unwrap();
        assert_eq!(parsed, Language::JAVA);
    }

    #[test]
    fn test_custom_language() {
        let kotlin = Language::new("kotlin");
        assert_eq!(kotlin.as_str(), "kotlin");
        assert_eq!(kotlin.to_string(), "kotlin");
    }
}
