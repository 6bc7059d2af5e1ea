//! Validated configuration fields.
//!
//! A [`Field`] owns one logical value together with the rules for it: its
//! name, its [`Shape`], and whether it is required, optional or defaulted.
//! Raw values are shape-checked on write; values that are already typed are
//! stored as-is. Template documents store placeholder text, which every
//! validated operation rejects.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Result};
use crate::types::{Shape, ShapeError, value_text};
use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, PartialEq)]
enum FieldValue<T> {
    Unset,
    Set(T),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
enum FieldKind<T> {
    Required,
    Optional,
    Default(T),
}

/// A named, shape-checked configuration value
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T: Shape> {
    name: &'static str,
    value: FieldValue<T>,
    kind: FieldKind<T>,
}

impl<T: Shape> Field<T> {
    /// A field that must be set before its section validates
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            value: FieldValue::Unset,
            kind: FieldKind::Required,
        }
    }

    /// A field that may stay unset
    pub fn optional(name: &'static str) -> Self {
        Self {
            name,
            value: FieldValue::Unset,
            kind: FieldKind::Optional,
        }
    }

    /// A field that reads as `default` until set
    pub fn with_default(name: &'static str, default: T) -> Self {
        Self {
            name,
            value: FieldValue::Unset,
            kind: FieldKind::Default(default),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current value, falling back to the default. `None` means unset.
    pub fn get(&self) -> Option<&T> {
        match (&self.value, &self.kind) {
            (FieldValue::Set(v), _) => Some(v),
            (_, FieldKind::Default(d)) => Some(d),
            _ => None,
        }
    }

    /// Whether a value was explicitly stored (defaults do not count)
    pub fn is_set(&self) -> bool {
        matches!(self.value, FieldValue::Set(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.value, FieldValue::Placeholder(_))
    }

    /// Store an already-validated value
    pub fn set(&mut self, value: T) {
        self.value = FieldValue::Set(value);
    }

    /// Shape-check and store a raw value
    pub fn set_value(&mut self, raw: &Value) -> Result<()> {
        let value = T::from_value(raw).map_err(|e| invalid_value(self.name, raw, &e))?;
        self.value = FieldValue::Set(value);
        Ok(())
    }

    /// Shape-check and store a raw string
    pub fn set_str(&mut self, raw: &str) -> Result<()> {
        self.set_value(&Value::String(raw.to_string()))
    }

    /// Forget the stored value; reads fall back to the default again
    pub fn clear(&mut self) {
        self.value = FieldValue::Unset;
    }

    pub(crate) fn set_placeholder(&mut self, text: &str) {
        self.value = FieldValue::Placeholder(text.to_string());
    }

    /// Re-check the stored value against the field's rules
    pub fn validate(&self) -> Result<()> {
        match &self.value {
            FieldValue::Set(v) => v.check().map_err(|e| {
                Diagnostic::new(
                    e.code,
                    format!("Invalid value '{}' for field '{}': {}", v.describe(), self.name, e),
                    self.name,
                )
            }),
            FieldValue::Placeholder(text) => Err(Diagnostic::new(
                DiagnosticCode::E0111FieldNotSet,
                format!(
                    "Field '{}' still holds the template placeholder '{}': expected {}",
                    self.name,
                    text,
                    T::expected()
                ),
                self.name,
            )),
            FieldValue::Unset => match self.kind {
                FieldKind::Required => Err(Diagnostic::new(
                    DiagnosticCode::E0111FieldNotSet,
                    format!("Field '{}' is not set: expected {}", self.name, T::expected()),
                    self.name,
                )),
                _ => Ok(()),
            },
        }
    }

    /// Validated serializable value; `None` when the field may be omitted
    pub fn to_value(&self) -> Result<Option<Value>> {
        self.validate()?;
        Ok(self.raw_value())
    }

    /// Serializable value without validation, placeholders included
    pub fn raw_value(&self) -> Option<Value> {
        match &self.value {
            FieldValue::Set(v) => Some(v.to_value()),
            FieldValue::Placeholder(text) => Some(Value::String(text.clone())),
            FieldValue::Unset => None,
        }
    }

    /// Text for operator reports: the value, the placeholder, or "unset"
    pub fn describe(&self) -> String {
        match (&self.value, self.get()) {
            (FieldValue::Placeholder(text), _) => text.clone(),
            (_, Some(v)) => v.describe(),
            (_, None) => "unset".to_string(),
        }
    }
}

fn invalid_value(name: &str, raw: &Value, err: &ShapeError) -> Diagnostic {
    Diagnostic::new(
        err.code,
        format!("Invalid value '{}' for field '{}': {}", value_text(raw), name, err),
        name,
    )
}

/// Shape-check a raw string for a value that lives outside any section
pub fn parse_named<T: Shape>(name: &str, raw: &str) -> Result<T> {
    let raw = Value::String(raw.to_string());
    T::from_value(&raw).map_err(|e| invalid_value(name, &raw, &e))
}

// =============================================================================
// Section dictionaries
// =============================================================================

/// Builds the ordered mapping for one section.
///
/// In checked mode every field is validated first; unchecked mode is only
/// used to render template documents.
pub struct DictWriter {
    map: Mapping,
    checked: bool,
}

impl DictWriter {
    pub fn new(checked: bool) -> Self {
        Self {
            map: Mapping::new(),
            checked,
        }
    }

    /// A writer for a nested subsection, in the same mode
    pub fn child(&self) -> Self {
        Self::new(self.checked)
    }

    pub fn field<T: Shape>(&mut self, field: &Field<T>) -> Result<()> {
        let value = if self.checked {
            field.to_value()?
        } else {
            field.raw_value()
        };
        if let Some(value) = value {
            self.map.insert(Value::String(field.name().to_string()), value);
        }
        Ok(())
    }

    pub fn nested(&mut self, key: &str, map: Mapping) {
        self.map.insert(Value::String(key.to_string()), Value::Mapping(map));
    }

    pub fn finish(self) -> Mapping {
        self.map
    }
}

/// Reads fields out of one section's mapping, rejecting unknown keys.
pub struct DictReader<'a> {
    map: &'a Mapping,
    known: Vec<&'static str>,
}

impl<'a> DictReader<'a> {
    pub fn new(map: &'a Mapping) -> Self {
        Self { map, known: vec![] }
    }

    /// Borrow the mapping of a section from a raw value
    pub fn mapping<'v>(value: &'v Value, section: &str) -> Result<&'v Mapping> {
        value.as_mapping().ok_or_else(|| {
            Diagnostic::new(
                DiagnosticCode::E0119SectionInvalid,
                format!(
                    "Section '{section}' must be a mapping, found '{}'",
                    value_text(value)
                ),
                "",
            )
        })
    }

    pub fn field<T: Shape>(&mut self, field: &mut Field<T>) -> Result<()> {
        self.known.push(field.name());
        if let Some(raw) = self.map.get(field.name()) {
            field.set_value(raw)?;
        }
        Ok(())
    }

    /// Raw value of a nested subsection, if present
    pub fn nested(&mut self, key: &'static str) -> Option<&'a Value> {
        self.known.push(key);
        self.map.get(key)
    }

    /// Fail on any key no field claimed
    pub fn finish(self) -> Result<()> {
        for key in self.map.keys() {
            let name = key.as_str().map(str::to_string).unwrap_or_else(|| value_text(key));
            if !self.known.contains(&name.as_str()) {
                return Err(Diagnostic::new(
                    DiagnosticCode::E0112UnknownField,
                    format!(
                        "Unrecognised field '{name}': expected one of {}",
                        self.known.join(", ")
                    ),
                    name,
                ));
            }
        }
        Ok(())
    }
}
