//! What an editing session is editing: the original article or one of its
//! translations.

use std::fmt;

use resh_common::ValidationError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifier of an article in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(SmolStr);

impl DocumentId {
    pub fn new(id: impl AsRef<str>) -> Result<Self, ValidationError> {
        let id = id.as_ref().trim();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidDocumentId(id.to_owned()));
        }
        Ok(Self(SmolStr::new(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0.to_string()
    }
}

/// Lowercase language tag: `es`, `pt-br`, `zh-hant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(SmolStr);

impl LanguageCode {
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim().to_ascii_lowercase().replace('_', "-");
        let mut parts = code.split('-');
        let primary = parts.next().unwrap_or_default();
        let region = parts.next();
        let valid = primary.len() == 2
            && primary.chars().all(|c| c.is_ascii_lowercase())
            && region.is_none_or(|r| {
                (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
            })
            && parts.next().is_none();
        if !valid {
            return Err(ValidationError::InvalidLanguage(code));
        }
        Ok(Self(SmolStr::new(code)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0.to_string()
    }
}

/// The document a session edits.
///
/// The original article and its translations share one editor; matching on
/// this enum keeps every handler explicit about which one it is touching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditingTarget {
    Original {
        document: DocumentId,
    },
    Translation {
        document: DocumentId,
        language: LanguageCode,
    },
}

impl EditingTarget {
    pub fn original(document: DocumentId) -> Self {
        EditingTarget::Original { document }
    }

    pub fn translation(document: DocumentId, language: LanguageCode) -> Self {
        EditingTarget::Translation { document, language }
    }

    pub fn document(&self) -> &DocumentId {
        match self {
            EditingTarget::Original { document } | EditingTarget::Translation { document, .. } => {
                document
            }
        }
    }

    pub fn language(&self) -> Option<&LanguageCode> {
        match self {
            EditingTarget::Original { .. } => None,
            EditingTarget::Translation { language, .. } => Some(language),
        }
    }

    pub fn is_translation(&self) -> bool {
        matches!(self, EditingTarget::Translation { .. })
    }
}

impl fmt::Display for EditingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditingTarget::Original { document } => write!(f, "{document}"),
            EditingTarget::Translation { document, language } => {
                write!(f, "{document} [{language}]")
            }
        }
    }
}

/// Input for translating an article into one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub document: DocumentId,
    pub language: LanguageCode,
    pub title: String,
    pub content: String,
    /// Target keyword in the destination language. Required.
    pub keyword: Option<String>,
}

impl TranslationRequest {
    /// Check the request before any generation call is made.
    ///
    /// A failure here is final for the operation; callers must surface it
    /// rather than retry through another provider.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keyword.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ValidationError::MissingKeyword {
                language: self.language.to_string(),
            });
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingField("content"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        Ok(())
    }

    pub fn target(&self) -> EditingTarget {
        EditingTarget::translation(self.document.clone(), self.language.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentId {
        DocumentId::new("article-42").unwrap()
    }

    #[test]
    fn language_codes_are_normalised() {
        assert_eq!(LanguageCode::new("ES").unwrap().as_str(), "es");
        assert_eq!(LanguageCode::new("pt_BR").unwrap().as_str(), "pt-br");
        assert!(LanguageCode::new("spanish").is_err());
        assert!(LanguageCode::new("e").is_err());
        assert!(LanguageCode::new("en-us-x").is_err());
    }

    #[test]
    fn document_ids_reject_blank() {
        assert!(DocumentId::new("  ").is_err());
        assert!(DocumentId::new("a b").is_err());
        assert_eq!(doc().to_string(), "article-42");
    }

    #[test]
    fn target_accessors() {
        let original = EditingTarget::original(doc());
        let translation = EditingTarget::translation(doc(), LanguageCode::new("es").unwrap());
        assert_eq!(original.language(), None);
        assert!(!original.is_translation());
        assert_eq!(translation.language().unwrap().as_str(), "es");
        assert_eq!(translation.document(), original.document());
        assert_eq!(translation.to_string(), "article-42 [es]");
    }

    #[test]
    fn target_serialises_tagged() {
        let target = EditingTarget::translation(doc(), LanguageCode::new("fr").unwrap());
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"translation","document":"article-42","language":"fr"}"#
        );
        let back: EditingTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn translation_without_keyword_is_rejected() {
        let request = TranslationRequest {
            document: doc(),
            language: LanguageCode::new("es").unwrap(),
            title: "Title".into(),
            content: "<p>Body</p>".into(),
            keyword: Some("   ".into()),
        };
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingKeyword {
                language: "es".into()
            })
        );
    }

    #[test]
    fn complete_translation_request_passes() {
        let request = TranslationRequest {
            document: doc(),
            language: LanguageCode::new("es").unwrap(),
            title: "Title".into(),
            content: "<p>Body</p>".into(),
            keyword: Some("mejor época".into()),
        };
        assert!(request.validate().is_ok());
        assert!(request.target().is_translation());
    }
}
