//! Annotation fields - the document model overlaid on pages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::geometry::{PageSize, Rect};

/// Unique identifier for a field.
///
/// Opaque string; generated ids are UUID v4, but ids supplied by a host
/// through `set_fields` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Create a new unique field ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is blank and needs generating.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FieldId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a field's `content` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Literal text, wrapped.
    Text,
    /// Image source, usually a data URI.
    Image,
    /// Raw HTML or SVG markup.
    Html,
    /// Self-contained embeddable document rendered in isolation.
    Signature,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// An annotation placed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Unique identifier, stable for the field's lifetime.
    #[serde(default)]
    pub id: FieldId,
    /// Owning page (0-based).
    pub page_index: usize,
    /// Geometry in unscaled document points, origin bottom-left.
    pub rect: Rect,
    /// Content interpretation.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Content payload.
    #[serde(default)]
    pub content: String,
    /// Visual properties merged onto the field container.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    /// Whether the field can be moved.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub draggable: bool,
    /// Whether the field can be resized.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub resizable: bool,
    /// Whether the field shows a delete control.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub deletable: bool,
    /// Opaque host data, never interpreted.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Field {
    /// Create a new field with a generated id and default flags.
    #[must_use]
    pub fn new(page_index: usize, rect: Rect, kind: FieldKind, content: impl Into<String>) -> Self {
        Self {
            id: FieldId::new(),
            page_index,
            rect,
            kind,
            content: content.into(),
            style: BTreeMap::new(),
            draggable: true,
            resizable: true,
            deletable: true,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<FieldId>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a style property.
    #[must_use]
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    /// Set whether the field can be dragged.
    #[must_use]
    pub fn with_draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    /// Set whether the field can be resized.
    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Set whether the field can be deleted.
    #[must_use]
    pub fn with_deletable(mut self, deletable: bool) -> Self {
        self.deletable = deletable;
        self
    }

    /// Attach host metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Shallow-merge a patch into this field.
    pub fn apply(&mut self, patch: &FieldPatch) {
        if let Some(page_index) = patch.page_index {
            self.page_index = page_index;
        }
        if let Some(rect) = patch.rect {
            self.rect = rect;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(style) = &patch.style {
            self.style.clone_from(style);
        }
        if let Some(draggable) = patch.draggable {
            self.draggable = draggable;
        }
        if let Some(resizable) = patch.resizable {
            self.resizable = resizable;
        }
        if let Some(deletable) = patch.deletable {
            self.deletable = deletable;
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata.clone_from(metadata);
        }
    }

    /// Check that the field fits on its page.
    ///
    /// Bounds are inclusive: a rect touching the page edge is accepted.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self, pages: &[PageSize]) -> Result<(), ValidationError> {
        let page = pages
            .get(self.page_index)
            .ok_or(ValidationError::PageOutOfRange {
                page_index: self.page_index,
                page_count: pages.len(),
            })?;

        let Rect {
            x,
            y,
            width,
            height,
        } = self.rect;

        if !(width > 0.0 && height > 0.0) {
            return Err(ValidationError::NonPositiveSize { width, height });
        }
        if !(x >= 0.0 && y >= 0.0) {
            return Err(ValidationError::NegativeOrigin { x, y });
        }
        if x + width > page.width || y + height > page.height {
            return Err(ValidationError::OutOfBounds {
                right: x + width,
                top: y + height,
                page_width: page.width,
                page_height: page.height,
            });
        }
        Ok(())
    }
}

/// A partial update merged into a stored field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    /// New owning page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<usize>,
    /// New geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    /// New content interpretation.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    /// New content payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Replacement style map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BTreeMap<String, String>>,
    /// New draggable flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    /// New resizable flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resizable: Option<bool>,
    /// New deletable flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    /// Replacement metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl FieldPatch {
    /// Patch that only moves the field.
    #[must_use]
    pub fn rect(rect: Rect) -> Self {
        Self {
            rect: Some(rect),
            ..Self::default()
        }
    }

    /// Patch that moves the field to another page.
    #[must_use]
    pub fn placement(page_index: usize, rect: Rect) -> Self {
        Self {
            page_index: Some(page_index),
            rect: Some(rect),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGES: [PageSize; 2] = [PageSize::new(612.0, 792.0), PageSize::new(612.0, 792.0)];

    fn text_field(rect: Rect) -> Field {
        Field::new(0, rect, FieldKind::Text, "hi")
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(FieldId::new(), FieldId::new());
    }

    #[test]
    fn test_validate_accepts_touching_bounds() {
        let field = text_field(Rect::new(512.0, 742.0, 100.0, 50.0));
        assert!(field.validate(&PAGES).is_ok());
    }

    #[test]
    fn test_validate_rejects_one_unit_over() {
        let field = text_field(Rect::new(513.0, 0.0, 100.0, 50.0));
        assert!(matches!(
            field.validate(&PAGES),
            Err(ValidationError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let field = text_field(Rect::new(0.0, 0.0, 0.0, 50.0));
        assert!(matches!(
            field.validate(&PAGES),
            Err(ValidationError::NonPositiveSize { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let field = text_field(Rect::new(0.0, 0.0, f64::NAN, 50.0));
        assert!(field.validate(&PAGES).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_page() {
        let mut field = text_field(Rect::new(0.0, 0.0, 10.0, 10.0));
        field.page_index = 2;
        assert_eq!(
            field.validate(&PAGES),
            Err(ValidationError::PageOutOfRange {
                page_index: 2,
                page_count: 2
            })
        );
    }

    #[test]
    fn test_apply_patch_is_shallow() {
        let mut field = text_field(Rect::new(0.0, 0.0, 10.0, 10.0)).with_style("border", "none");
        let id = field.id.clone();
        field.apply(&FieldPatch {
            content: Some("bye".to_string()),
            draggable: Some(false),
            ..FieldPatch::default()
        });
        assert_eq!(field.id, id);
        assert_eq!(field.content, "bye");
        assert!(!field.draggable);
        assert_eq!(field.style.get("border").map(String::as_str), Some("none"));
    }

    #[test]
    fn test_json_defaults_flags_to_true() {
        let field: Field = serde_json::from_str(
            r#"{"id":"a","pageIndex":1,"rect":{"x":1,"y":2,"width":3,"height":4},"type":"signature","content":"<iframe/>"}"#,
        )
        .expect("should parse");
        assert_eq!(field.id.as_str(), "a");
        assert_eq!(field.kind, FieldKind::Signature);
        assert!(field.draggable && field.resizable && field.deletable);
        assert!(field.metadata.is_null());
    }

    #[test]
    fn test_json_missing_id_generates_one() {
        let field: Field = serde_json::from_str(
            r#"{"pageIndex":0,"rect":{"x":0,"y":0,"width":1,"height":1},"type":"text"}"#,
        )
        .expect("should parse");
        assert!(!field.id.is_empty());
    }

    #[test]
    fn test_empty_patch() {
        assert!(FieldPatch::default().is_empty());
        assert!(!FieldPatch::rect(Rect::default()).is_empty());
    }
}
