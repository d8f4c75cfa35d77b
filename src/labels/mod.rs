//! Drug label lookup and section normalization.
//!
//! A [`LabelResolver`] queries a [`DrugLabelSource`] with a brand token and
//! turns the first matching document into a [`LabelRecord`]: six fixed
//! sections, each with the redundant leading title stripped.

pub mod openfda;

use std::future::Future;

use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LookupError, PipelineError};
use crate::models::LookupToken;

pub use openfda::{LabelSourceConfig, OpenFdaClient};

/// Characters removed after a stripped section title
const TITLE_SEPARATORS: &[char] = &[' ', ':', '.', '-'];

/// Label sections in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelSection {
    ActiveIngredients,
    Purposes,
    Uses,
    Warnings,
    DosageAndAdministration,
    OtherInformation,
}

impl LabelSection {
    pub const ALL: [LabelSection; 6] = [
        LabelSection::ActiveIngredients,
        LabelSection::Purposes,
        LabelSection::Uses,
        LabelSection::Warnings,
        LabelSection::DosageAndAdministration,
        LabelSection::OtherInformation,
    ];

    /// Human-readable title used as the output key
    pub fn title(self) -> &'static str {
        match self {
            LabelSection::ActiveIngredients => "Active ingredients",
            LabelSection::Purposes => "Purposes",
            LabelSection::Uses => "Uses",
            LabelSection::Warnings => "Warnings",
            LabelSection::DosageAndAdministration => "Dosage and administration",
            LabelSection::OtherInformation => "Other information",
        }
    }

    /// Field name in the label document
    pub fn field(self) -> &'static str {
        match self {
            LabelSection::ActiveIngredients => "active_ingredient",
            LabelSection::Purposes => "purpose",
            LabelSection::Uses => "indications_and_usage",
            LabelSection::Warnings => "warnings",
            LabelSection::DosageAndAdministration => "dosage_and_administration",
            // Kept as the deployed mapping; see DESIGN.md open questions.
            LabelSection::OtherInformation => "inactive_ingredient",
        }
    }
}

/// Normalized label sections, always iterated in [`LabelSection::ALL`] order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRecord {
    sections: Vec<(LabelSection, String)>,
}

impl LabelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a section. Blank text is ignored so absent sections never appear empty.
    pub fn insert(&mut self, section: LabelSection, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        match self.sections.binary_search_by_key(&section, |(s, _)| *s) {
            Ok(idx) => self.sections[idx].1 = text,
            Err(idx) => self.sections.insert(idx, (section, text)),
        }
    }

    pub fn get(&self, section: LabelSection) -> Option<&str> {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelSection, &str)> {
        self.sections.iter().map(|(s, text)| (*s, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Serialize for LabelRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (section, text) in &self.sections {
            map.serialize_entry(section.title(), text)?;
        }
        map.end()
    }
}

/// Source of raw label documents, e.g. the openFDA drug label endpoint
pub trait DrugLabelSource: Send + Sync {
    /// Look up the first document whose brand name matches `brand_name` exactly.
    /// `Ok(None)` means the source has no match.
    fn search(
        &self,
        brand_name: &str,
    ) -> impl Future<Output = Result<Option<Value>, LookupError>> + Send;
}

/// Source that never matches; used when label lookup is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabelSource;

impl DrugLabelSource for NoLabelSource {
    async fn search(&self, _brand_name: &str) -> Result<Option<Value>, LookupError> {
        Ok(None)
    }
}

/// Flatten a raw field into text: strings are trimmed, lists of strings are
/// newline-joined with blank entries dropped. Anything else yields nothing.
pub fn join_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Remove a leading, case-insensitive copy of `title` and the separator
/// characters that follow it. Repeated copies are all removed, so applying
/// this twice equals applying it once.
pub fn strip_leading_title<'a>(title: &str, text: &'a str) -> &'a str {
    let mut rest = text.trim_start();
    if title.is_empty() {
        return rest;
    }
    while let Some(head) = rest.get(..title.len()) {
        if !head.eq_ignore_ascii_case(title) {
            break;
        }
        rest = rest[title.len()..].trim_start_matches(TITLE_SEPARATORS).trim_start();
    }
    rest
}

/// Build a record from one raw label document
pub fn extract_sections(document: &Value) -> LabelRecord {
    let mut record = LabelRecord::new();
    for section in LabelSection::ALL {
        let Some(text) = document.get(section.field()).and_then(join_field) else {
            continue;
        };
        record.insert(section, strip_leading_title(section.title(), &text));
    }
    record
}

/// Resolves lookup tokens into label records
pub struct LabelResolver<S> {
    source: S,
}

impl<S: DrugLabelSource> LabelResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lookup that reports failures. An empty token or an unmatched token
    /// gives an empty record.
    pub async fn try_resolve(&self, token: &LookupToken) -> Result<LabelRecord, PipelineError> {
        if token.is_empty() {
            return Ok(LabelRecord::new());
        }
        match self.source.search(token.as_str()).await? {
            Some(document) => Ok(extract_sections(&document)),
            None => {
                debug!(token = %token, "no label document matched");
                Ok(LabelRecord::new())
            }
        }
    }

    /// Lookup that never fails: any source error becomes an empty record.
    pub async fn resolve(&self, token: &LookupToken) -> LabelRecord {
        match self.try_resolve(token).await {
            Ok(record) => record,
            Err(e) => {
                warn!(token = %token, error = %e, "label lookup failed, continuing without label");
                LabelRecord::new()
            }
        }
    }
}
