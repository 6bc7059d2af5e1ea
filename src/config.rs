//! The configuration document.
//!
//! A [`Config`] holds at most one of each context-level section plus one
//! [`ConfigSectionSre`] per SRE, keyed by sanitised SRE name. Sections are
//! created on first mutable access, seeded from the attached [`Context`]
//! when there is one. Decoded documents leave missing sections absent.
//!
//! SRE indices are handed out as `max(existing, highest ever issued) + 1`,
//! so removing an SRE never frees its index for the rest of the document's
//! lifetime unless [`Config::reset_sre_indices`] is called.

use crate::context::Context;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Result};
use crate::field::DictReader;
use crate::naming::sanitise_sre_name;
use crate::section::{
    ConfigSectionAzure, ConfigSectionBackend, ConfigSectionPulumi, ConfigSectionShm,
    ConfigSectionSre, ConfigSectionTags, Section,
};
use crate::types::{SreIndex, value_text};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Top-level key holding the per-SRE sections
const SRE_KEY: &str = "sre";

/// Key of the single SRE in a template document
const TEMPLATE_SRE_NAME: &str = "example";

#[derive(Debug, Clone, Default)]
pub struct Config {
    azure: Option<ConfigSectionAzure>,
    backend: Option<ConfigSectionBackend>,
    pulumi: Option<ConfigSectionPulumi>,
    shm: Option<ConfigSectionShm>,
    sres: BTreeMap<String, ConfigSectionSre>,
    tags: Option<ConfigSectionTags>,
    template: bool,
    /// Highest SRE index issued so far
    last_index: u32,
    /// Supplies defaults for sections created lazily
    pub(crate) context: Option<Context>,
    /// Remote blob this document was loaded from or will be written to
    pub(crate) blob_name: Option<String>,
}

/// Documents are equal when their content is; bindings are ignored
impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.azure == other.azure
            && self.backend == other.backend
            && self.pulumi == other.pulumi
            && self.shm == other.shm
            && self.sres == other.sres
            && self.tags == other.tags
            && self.template == other.template
    }
}

/// Generates the read accessor and the get-or-create accessor of a section.
macro_rules! section_accessors {
    ($field:ident, $field_mut:ident, $ty:ty) => {
        pub fn $field(&self) -> Option<&$ty> {
            self.$field.as_ref()
        }

        /// Section, created (seeded from the context, if any) on first access
        pub fn $field_mut(&mut self) -> &mut $ty {
            let context = self.context.as_ref();
            self.$field.get_or_insert_with(|| match context {
                Some(context) => <$ty>::from_context(context),
                None => <$ty>::default(),
            })
        }
    };
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty document whose sections default from `context`
    pub fn for_context(context: &Context) -> Self {
        Self {
            context: Some(context.clone()),
            ..Self::default()
        }
    }

    /// Document whose every field holds a "replace me" placeholder
    pub fn template() -> Self {
        Self {
            azure: Some(ConfigSectionAzure::template()),
            backend: Some(ConfigSectionBackend::template()),
            pulumi: Some(ConfigSectionPulumi::template()),
            shm: Some(ConfigSectionShm::template()),
            sres: BTreeMap::from([(TEMPLATE_SRE_NAME.to_string(), ConfigSectionSre::template())]),
            tags: Some(ConfigSectionTags::template()),
            template: true,
            ..Self::default()
        }
    }

    pub fn is_template(&self) -> bool {
        self.template
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Remote blob name this document is bound to, if any
    pub fn blob_name(&self) -> Option<&str> {
        self.blob_name.as_deref()
    }

    section_accessors!(azure, azure_mut, ConfigSectionAzure);
    section_accessors!(backend, backend_mut, ConfigSectionBackend);
    section_accessors!(pulumi, pulumi_mut, ConfigSectionPulumi);
    section_accessors!(shm, shm_mut, ConfigSectionShm);
    section_accessors!(tags, tags_mut, ConfigSectionTags);

    // =========================================================================
    // SREs
    // =========================================================================

    /// An existing SRE; unknown names are a config error
    pub fn sre(&self, name: &str) -> Result<&ConfigSectionSre> {
        self.sres
            .get(&sanitise_sre_name(name))
            .ok_or_else(|| sre_not_found(name))
    }

    /// Mutable access to an existing SRE; unknown names are a config error
    pub fn existing_sre_mut(&mut self, name: &str) -> Result<&mut ConfigSectionSre> {
        self.sres
            .get_mut(&sanitise_sre_name(name))
            .ok_or_else(|| sre_not_found(name))
    }

    /// An SRE, created with the next free index if unknown.
    ///
    /// Calling twice with the same new name returns the same section. Names
    /// that sanitise to nothing are rejected, as is a new SRE once every
    /// index has been issued.
    pub fn sre_mut(&mut self, name: &str) -> Result<&mut ConfigSectionSre> {
        let key = sanitise_sre_name(name);
        if key.is_empty() {
            return Err(empty_sre_name(name));
        }
        let next = self.next_sre_index();
        match self.sres.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let Some(next) = next else {
                    return Err(Diagnostic::new(
                        DiagnosticCode::E0110InvalidIndex,
                        format!("No SRE index is left for '{}'", entry.key()),
                        format!("{SRE_KEY}.{}.index", entry.key()),
                    ));
                };
                tracing::debug!(sre = %entry.key(), index = next.get(), "creating SRE section");
                self.last_index = next.get();
                Ok(entry.insert(ConfigSectionSre::with_index(next)))
            }
        }
    }

    /// Sanitised names of every SRE, sorted
    pub fn sre_names(&self) -> impl Iterator<Item = &str> {
        self.sres.keys().map(String::as_str)
    }

    pub fn sres(&self) -> impl Iterator<Item = (&str, &ConfigSectionSre)> {
        self.sres.iter().map(|(name, sre)| (name.as_str(), sre))
    }

    /// Drop an SRE. Unknown names are ignored; returns whether one was removed.
    pub fn remove_sre(&mut self, name: &str) -> bool {
        self.sres.remove(&sanitise_sre_name(name)).is_some()
    }

    /// Forget indices of removed SREs so the next one follows the highest
    /// index still in use
    pub fn reset_sre_indices(&mut self) {
        self.last_index = self.highest_sre_index();
    }

    fn highest_sre_index(&self) -> u32 {
        self.sres
            .values()
            .filter_map(|sre| sre.index.get().map(SreIndex::get))
            .max()
            .unwrap_or(0)
    }

    fn next_sre_index(&self) -> Option<SreIndex> {
        SreIndex::after(self.last_index.max(self.highest_sre_index()))
    }

    /// Two SREs must never share an index
    fn check_sre_indices(&self) -> Result<()> {
        let mut seen: BTreeMap<u32, &str> = BTreeMap::new();
        for (name, sre) in &self.sres {
            let Some(index) = sre.index.get() else {
                continue;
            };
            if let Some(other) = seen.insert(index.get(), name.as_str()) {
                return Err(Diagnostic::new(
                    DiagnosticCode::E0107DuplicateEntry,
                    format!("SRE index {index} is used by both '{other}' and '{name}'"),
                    format!("{SRE_KEY}.{name}.index"),
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Pulumi stacks
    // =========================================================================

    pub fn add_stack(&mut self, name: &str, path: &str) -> Result<()> {
        self.pulumi_mut().add_stack(name, path)
    }

    /// Removing an unknown stack is not an error
    pub fn remove_stack(&mut self, name: &str) {
        if let Some(pulumi) = self.pulumi.as_mut() {
            pulumi.remove_stack(name);
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Whether every required section is present and valid.
    ///
    /// With `require_sres`, at least one SRE must also exist. Templates are
    /// never complete.
    pub fn is_complete(&self, require_sres: bool) -> bool {
        if self.template {
            return false;
        }
        let sections_valid = valid(self.azure.as_ref())
            && valid(self.backend.as_ref())
            && valid(self.pulumi.as_ref())
            && valid(self.shm.as_ref())
            && valid(self.tags.as_ref());
        sections_valid
            && (!require_sres || !self.sres.is_empty())
            && self.sres.values().all(|sre| sre.validate().is_ok())
            && self.check_sre_indices().is_ok()
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize the whole document.
    ///
    /// Every present section is validated first, except in templates, whose
    /// placeholders are written as-is.
    pub fn to_yaml(&self) -> Result<String> {
        let checked = !self.template;
        if checked {
            self.check_sre_indices()?;
        }
        let mut doc = Mapping::new();
        write_section(&mut doc, self.azure.as_ref(), checked)?;
        write_section(&mut doc, self.backend.as_ref(), checked)?;
        write_section(&mut doc, self.pulumi.as_ref(), checked)?;
        write_section(&mut doc, self.shm.as_ref(), checked)?;
        if !self.sres.is_empty() {
            let mut sres = Mapping::new();
            for (name, sre) in &self.sres {
                let map = section_dict(sre, checked).map_err(|d| d.within(name).within(SRE_KEY))?;
                sres.insert(Value::String(name.clone()), Value::Mapping(map));
            }
            doc.insert(Value::String(SRE_KEY.to_string()), Value::Mapping(sres));
        }
        write_section(&mut doc, self.tags.as_ref(), checked)?;

        serde_yaml::to_string(&Value::Mapping(doc)).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E0207IoError,
                format!("Could not serialize configuration document: {e}"),
                "",
            )
        })
    }

    /// Decode a document produced by [`Config::to_yaml`].
    ///
    /// Unknown top-level keys are ignored; an unknown field inside a known
    /// section is a parameter error naming `section.field`.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E0203YamlParseError,
                format!("Could not parse configuration document: {e}"),
                "",
            )
        })?;
        let doc = value.as_mapping().ok_or_else(|| {
            Diagnostic::new(
                DiagnosticCode::E0204NotAMapping,
                format!(
                    "Configuration document must be a mapping of section names, found '{}'",
                    value_text(&value)
                ),
                "",
            )
        })?;

        let mut config = Config {
            azure: read_section(doc)?,
            backend: read_section(doc)?,
            pulumi: read_section(doc)?,
            shm: read_section(doc)?,
            sres: read_sres(doc)?,
            tags: read_section(doc)?,
            ..Config::default()
        };
        config.check_sre_indices()?;
        config.last_index = config.highest_sre_index();
        Ok(config)
    }
}

fn empty_sre_name(name: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::E0106EmptyValue,
        format!("SRE name '{name}' contains no usable characters"),
        SRE_KEY,
    )
}

fn sre_not_found(name: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::E0205SreNotFound,
        format!("SRE {name} does not exist"),
        name,
    )
}

fn valid<S: Section>(section: Option<&S>) -> bool {
    section.is_some_and(|s| s.validate().is_ok())
}

fn section_dict<S: Section>(section: &S, checked: bool) -> Result<Mapping> {
    if checked {
        section.to_dict()
    } else {
        section.to_dict_unchecked()
    }
}

fn write_section<S: Section>(doc: &mut Mapping, section: Option<&S>, checked: bool) -> Result<()> {
    if let Some(section) = section {
        let map = section_dict(section, checked).map_err(|d| d.within(S::KEY))?;
        doc.insert(Value::String(S::KEY.to_string()), Value::Mapping(map));
    }
    Ok(())
}

fn read_section<S: Section>(doc: &Mapping) -> Result<Option<S>> {
    match doc.get(S::KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => {
            let map = DictReader::mapping(raw, S::KEY).map_err(|d| d.within(S::KEY))?;
            S::from_dict(map).map(Some).map_err(|d| d.within(S::KEY))
        }
    }
}

fn read_sres(doc: &Mapping) -> Result<BTreeMap<String, ConfigSectionSre>> {
    let mut sres = BTreeMap::new();
    let Some(raw) = doc.get(SRE_KEY).filter(|v| !v.is_null()) else {
        return Ok(sres);
    };
    let entries = DictReader::mapping(raw, SRE_KEY).map_err(|d| d.within(SRE_KEY))?;
    for (name, raw_sre) in entries {
        let name = name.as_str().map(str::to_string).unwrap_or_else(|| value_text(name));
        let key = sanitise_sre_name(&name);
        if key.is_empty() {
            return Err(empty_sre_name(&name));
        }
        let sre = DictReader::mapping(raw_sre, &name)
            .and_then(ConfigSectionSre::from_dict)
            .map_err(|d| d.within(&name).within(SRE_KEY))?;
        if sres.insert(key.clone(), sre).is_some() {
            return Err(Diagnostic::new(
                DiagnosticCode::E0107DuplicateEntry,
                format!("More than one SRE is named '{key}'"),
                format!("{SRE_KEY}.{key}"),
            ));
        }
    }
    Ok(sres)
}
