//! Configuration sections.
//!
//! Every section is a record of [`Field`]s that can be validated on its own,
//! flattened into an ordered YAML mapping, and rebuilt from one. Sections
//! never print; `update` methods narrate through a [`Reporter`].

pub mod azure;
pub mod backend;
pub mod pulumi;
pub mod shm;
pub mod sre;
pub mod tags;

pub use azure::{AzureChanges, ConfigSectionAzure};
pub use backend::{BackendChanges, ConfigSectionBackend};
pub use pulumi::{ConfigSectionPulumi, PulumiChanges};
pub use shm::{ConfigSectionShm, ShmChanges};
pub use sre::{
    ConfigSectionSre, ConfigSubsectionRemoteDesktopOpts, ConfigSubsectionResearchDesktopOpts,
    RemoteDesktopChanges, SreChanges,
};
pub use tags::{ConfigSectionTags, TagsChanges};

use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::Shape;
use serde_yaml::{Mapping, Value};
use std::fmt;

/// Behaviour shared by every section
pub trait Section: Default + Clone + PartialEq + fmt::Debug {
    /// Key of the section in the configuration document
    const KEY: &'static str;

    /// A section whose every field holds a "replace me" placeholder
    fn template() -> Self;

    /// Write fields in document order
    fn write(&self, out: &mut DictWriter) -> Result<()>;

    /// Read whichever fields are present in `input`
    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()>;

    /// Check every field, failing on the first malformed or unset one
    fn validate(&self) -> Result<()> {
        self.write(&mut DictWriter::new(true))
    }

    /// Validate, then flatten into an ordered mapping
    fn to_dict(&self) -> Result<Mapping> {
        let mut out = DictWriter::new(true);
        self.write(&mut out)?;
        Ok(out.finish())
    }

    /// Flatten without validation (template rendering)
    fn to_dict_unchecked(&self) -> Result<Mapping> {
        let mut out = DictWriter::new(false);
        self.write(&mut out)?;
        Ok(out.finish())
    }

    /// Rebuild a section from a mapping produced by [`Section::to_dict`]
    fn from_dict(map: &Mapping) -> Result<Self> {
        let mut section = Self::default();
        section.apply_dict(map)?;
        Ok(section)
    }

    /// Overwrite the fields present in `map`; unknown keys are rejected
    fn apply_dict(&mut self, map: &Mapping) -> Result<()> {
        let mut input = DictReader::new(map);
        self.read(&mut input)?;
        input.finish()
    }

    /// Shape-check and store one field by name
    fn set_field(&mut self, name: &str, raw: &Value) -> Result<()> {
        let mut map = Mapping::new();
        map.insert(Value::String(name.to_string()), raw.clone());
        self.apply_dict(&map)
    }
}

/// Store a supplied value, validate it, and report the result.
///
/// The field is left untouched when validation fails.
pub(crate) fn apply_change<T: Shape>(
    section: &str,
    field: &mut Field<T>,
    value: Option<T>,
    reporter: &dyn Reporter,
) -> Result<()> {
    if let Some(value) = value {
        let mut candidate = field.clone();
        candidate.set(value);
        candidate.validate()?;
        *field = candidate;
        reporter.field_updated(section, field.name(), &field.describe());
    }
    Ok(())
}

/// Write a nested subsection under `key`
pub(crate) fn write_nested<S: Section>(out: &mut DictWriter, key: &str, section: &S) -> Result<()> {
    let mut nested = out.child();
    section.write(&mut nested).map_err(|d| d.within(key))?;
    out.nested(key, nested.finish());
    Ok(())
}

/// Read a nested subsection stored under `key`, if present
pub(crate) fn read_nested<S: Section>(input: &mut DictReader<'_>, key: &'static str, section: &mut S) -> Result<()> {
    if let Some(raw) = input.nested(key) {
        let map = DictReader::mapping(raw, key).map_err(|d| d.within(key))?;
        section.apply_dict(map).map_err(|d| d.within(key))?;
    }
    Ok(())
}
