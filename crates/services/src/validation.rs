//! # Content Validator
//!
//! Turns an untrusted JSON payload into cleaned field values, or into the
//! complete list of problems found in it.
//!
//! Stages run in order and accumulate errors:
//! 1. type-check every declared field (the only fail-fast boundary),
//! 2. sanitize text and text-list fields,
//! 3. validate every content block independently,
//! 4. resolve category references,
//! 5. derive the slug and check it is free.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use domains::models::{Block, CategoryId};
use domains::{Result, ValidationError};

use crate::references::ReferenceResolver;
use crate::sanitize::sanitize;
use crate::slug::slugify;

/// Outcome of a validation run: cleaned values or every error found.
pub type Checked<T> = std::result::Result<T, Vec<ValidationError>>;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Text,
    TextList,
    Blocks,
}

impl FieldShape {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (FieldShape::Text, Value::String(_)) => true,
            (FieldShape::TextList, Value::Array(items)) => items.iter().all(Value::is_string),
            (FieldShape::Blocks, Value::Array(_)) => true,
            _ => false,
        }
    }
}

/// Extra format rule checked on a non-empty cleaned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Email,
    MinLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    pub required: bool,
    pub allow_empty: bool,
    /// Compared and stored as received. Used for secrets.
    pub verbatim: bool,
    pub rule: Option<Rule>,
}

impl FieldSpec {
    const fn new(name: &'static str, shape: FieldShape) -> Self {
        Self {
            name,
            shape,
            required: false,
            allow_empty: false,
            verbatim: false,
            rule: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldShape::Text)
    }

    pub const fn list(name: &'static str) -> Self {
        Self::new(name, FieldShape::TextList)
    }

    pub const fn blocks(name: &'static str) -> Self {
        Self::new(name, FieldShape::Blocks)
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn allow_empty(self) -> Self {
        Self {
            allow_empty: true,
            ..self
        }
    }

    pub const fn verbatim(self) -> Self {
        Self {
            verbatim: true,
            ..self
        }
    }

    pub const fn rule(self, rule: Rule) -> Self {
        Self {
            rule: Some(rule),
            ..self
        }
    }
}

/// Which collection a derived slug must be unique in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugTarget {
    Article,
    /// Categories also require a unique title.
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugSource {
    pub from: &'static str,
    pub target: SlugTarget,
}

/// Declared shape of one payload kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
    /// Text-list field holding category ids to resolve.
    pub categories: Option<&'static str>,
    /// Create paths only.
    pub slug: Option<SlugSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanValue {
    Text(String),
    TextList(Vec<String>),
    Blocks(Vec<Block>),
}

/// Sanitized, normalized field values. Never holds raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanPayload {
    values: BTreeMap<&'static str, CleanValue>,
    pub categories: Option<Vec<CategoryId>>,
    pub slug: Option<String>,
}

impl CleanPayload {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(CleanValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(CleanValue::TextList(items)) => Some(items),
            _ => None,
        }
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        match self.values.remove(name) {
            Some(CleanValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn take_blocks(&mut self, name: &str) -> Option<Vec<Block>> {
        match self.values.remove(name) {
            Some(CleanValue::Blocks(blocks)) => Some(blocks),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &CleanValue)> + '_ {
        self.values.iter().map(|(name, value)| (*name, value))
    }
}

fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|value| !value.is_null())
}

/// Stage 1. Missing required fields and wrong types are returned alone.
fn type_check<'a>(fields: &[FieldSpec], payload: &'a Value) -> Checked<&'a Map<String, Value>> {
    let Some(object) = payload.as_object() else {
        return Err(vec![ValidationError::BadSyntax {
            field: "body".to_string(),
        }]);
    };

    let errors: Vec<ValidationError> = fields
        .iter()
        .filter_map(|spec| match present(object, spec.name) {
            None if spec.required => Some(ValidationError::Missing {
                field: spec.name.to_string(),
            }),
            Some(value) if !spec.shape.accepts(value) => Some(ValidationError::BadSyntax {
                field: spec.name.to_string(),
            }),
            _ => None,
        })
        .collect();

    if errors.is_empty() {
        Ok(object)
    } else {
        Err(errors)
    }
}

fn clean_text(spec: &FieldSpec, raw: &str, errors: &mut Vec<ValidationError>) -> String {
    let field = || spec.name.to_string();
    let clean = if spec.verbatim {
        raw.to_string()
    } else {
        sanitize(raw)
    };

    if clean != raw {
        errors.push(ValidationError::InvalidCharacters { field: field() });
    }
    if clean.trim().is_empty() {
        if !spec.allow_empty {
            errors.push(ValidationError::Empty { field: field() });
        }
        return clean;
    }

    match spec.rule {
        Some(Rule::Email) if !EMAIL.is_match(&clean) => {
            errors.push(ValidationError::InvalidFormat { field: field() });
        }
        Some(Rule::MinLength(min)) if clean.chars().count() < min => {
            errors.push(ValidationError::TooShort {
                field: field(),
                min,
            });
        }
        _ => {}
    }
    clean
}

fn clean_list(spec: &FieldSpec, items: &[Value], errors: &mut Vec<ValidationError>) -> Vec<String> {
    let mut dirty = false;
    let mut empty = false;
    let mut cleaned = Vec::with_capacity(items.len());

    for raw in items.iter().filter_map(Value::as_str) {
        let clean = sanitize(raw);
        dirty |= clean != raw;
        if clean.trim().is_empty() {
            empty = true;
        } else {
            cleaned.push(clean);
        }
    }

    if dirty {
        errors.push(ValidationError::InvalidCharacters {
            field: spec.name.to_string(),
        });
    }
    if empty {
        errors.push(ValidationError::Empty {
            field: spec.name.to_string(),
        });
    }
    cleaned
}

fn block_property(
    block: &Map<String, Value>,
    index: usize,
    property: &'static str,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    match block.get(property) {
        None | Some(Value::Null) => {
            errors.push(ValidationError::BlockMissing { index, property });
            None
        }
        Some(Value::String(raw)) => {
            let clean = sanitize(raw);
            if clean != *raw {
                errors.push(ValidationError::BlockInvalidCharacters { index, property });
            }
            if clean.trim().is_empty() {
                errors.push(ValidationError::BlockMissing { index, property });
                return None;
            }
            Some(clean)
        }
        Some(_) => {
            errors.push(ValidationError::BlockBadSyntax { index, property });
            None
        }
    }
}

/// Stage 3. Every block is checked; failures carry the 1-based position.
fn clean_blocks(spec: &FieldSpec, items: &[Value], errors: &mut Vec<ValidationError>) -> Vec<Block> {
    if items.is_empty() && !spec.allow_empty {
        errors.push(ValidationError::Empty {
            field: spec.name.to_string(),
        });
    }

    let mut blocks = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let index = position + 1;
        let Value::Object(block) = item else {
            errors.push(ValidationError::BlockBadSyntax {
                index,
                property: "block",
            });
            continue;
        };
        let kind = block_property(block, index, "type", errors);
        let content = block_property(block, index, "content", errors);
        if let (Some(kind), Some(content)) = (kind, content) {
            blocks.push(Block { kind, content });
        }
    }
    blocks
}

/// Stages 2 and 3 for a type-checked object.
fn clean_fields(
    fields: &[FieldSpec],
    object: &Map<String, Value>,
    errors: &mut Vec<ValidationError>,
) -> CleanPayload {
    let mut clean = CleanPayload::default();
    for spec in fields {
        let value = match (spec.shape, present(object, spec.name)) {
            (FieldShape::Text, Some(Value::String(raw))) => {
                CleanValue::Text(clean_text(spec, raw, errors))
            }
            (FieldShape::TextList, Some(Value::Array(items))) => {
                CleanValue::TextList(clean_list(spec, items, errors))
            }
            (FieldShape::Blocks, Some(Value::Array(items))) => {
                CleanValue::Blocks(clean_blocks(spec, items, errors))
            }
            _ => continue,
        };
        clean.values.insert(spec.name, value);
    }
    clean
}

/// Field-level validation without any store lookup.
pub fn check_fields(fields: &[FieldSpec], payload: &Value) -> Checked<CleanPayload> {
    let object = type_check(fields, payload)?;
    let mut errors = Vec::new();
    let clean = clean_fields(fields, object, &mut errors);
    if errors.is_empty() {
        Ok(clean)
    } else {
        Err(errors)
    }
}

/// Full validation including reference resolution and slug derivation.
#[derive(Clone)]
pub struct ContentValidator {
    resolver: ReferenceResolver,
}

impl ContentValidator {
    pub fn new(resolver: ReferenceResolver) -> Self {
        Self { resolver }
    }

    /// Only store failures surface as `Err`; payload problems come back
    /// inside the `Checked` value.
    pub async fn validate(&self, schema: &Schema, payload: &Value) -> Result<Checked<CleanPayload>> {
        let object = match type_check(schema.fields, payload) {
            Ok(object) => object,
            Err(errors) => return Ok(Err(errors)),
        };

        let mut errors = Vec::new();
        let mut clean = clean_fields(schema.fields, object, &mut errors);

        if let Some(field) = schema.categories {
            if let Some(ids) = clean.list(field) {
                match self.resolver.resolve_categories(ids).await? {
                    Ok(resolved) => clean.categories = Some(resolved),
                    Err(error) => errors.push(error),
                }
            }
        }

        if let Some(source) = schema.slug {
            // An empty title was already reported by the field stage.
            if let Some(title) = clean.text(source.from).filter(|t| !t.trim().is_empty()) {
                let slug = slugify(title);
                if slug.is_empty() {
                    errors.push(ValidationError::SlugGenerationFailed {
                        field: "slug".to_string(),
                        from: source.from.to_string(),
                    });
                } else {
                    let taken = match source.target {
                        SlugTarget::Article => self.resolver.article_slug_taken(&slug).await?,
                        SlugTarget::Category => self.resolver.category_taken(&slug, title).await?,
                    };
                    if taken {
                        errors.push(ValidationError::AlreadyTaken {
                            field: source.from.to_string(),
                        });
                    }
                    clean.slug = Some(slug);
                }
            }
        }

        if errors.is_empty() {
            Ok(Ok(clean))
        } else {
            Ok(Err(errors))
        }
    }
}
