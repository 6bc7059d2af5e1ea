//! Tags stamped on every deployed resource.

use super::{Section, apply_change};
use crate::context::Context;
use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::NonEmptyString;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionTags {
    pub deployed_by: Field<NonEmptyString>,
    pub deployment: Field<NonEmptyString>,
    pub project: Field<NonEmptyString>,
    pub version: Field<NonEmptyString>,
}

#[derive(Debug, Clone, Default)]
pub struct TagsChanges {
    pub deployed_by: Option<NonEmptyString>,
    pub deployment: Option<NonEmptyString>,
    pub project: Option<NonEmptyString>,
    pub version: Option<NonEmptyString>,
}

impl Default for ConfigSectionTags {
    fn default() -> Self {
        Self {
            deployed_by: Field::with_default(
                "deployed_by",
                NonEmptyString::new_unchecked(env!("CARGO_PKG_NAME")),
            ),
            deployment: Field::required("deployment"),
            project: Field::with_default("project", NonEmptyString::new_unchecked("Data Safe Haven")),
            version: Field::with_default(
                "version",
                NonEmptyString::new_unchecked(env!("CARGO_PKG_VERSION")),
            ),
        }
    }
}

impl ConfigSectionTags {
    pub fn from_context(context: &Context) -> Self {
        let mut section = Self::default();
        section
            .deployment
            .set(NonEmptyString::new_unchecked(context.name()));
        section
    }

    pub fn update(&mut self, changes: TagsChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(Self::KEY, &mut self.deployed_by, changes.deployed_by, reporter)?;
        apply_change(Self::KEY, &mut self.deployment, changes.deployment, reporter)?;
        apply_change(Self::KEY, &mut self.project, changes.project, reporter)?;
        apply_change(Self::KEY, &mut self.version, changes.version, reporter)
    }

    /// Resource tags keyed the way Azure displays them
    pub fn to_tags(&self) -> BTreeMap<String, String> {
        [
            ("deployed by", &self.deployed_by),
            ("deployment", &self.deployment),
            ("project", &self.project),
            ("version", &self.version),
        ]
        .into_iter()
        .filter_map(|(key, field)| field.get().map(|v| (key.to_string(), v.to_string())))
        .collect()
    }
}

impl Section for ConfigSectionTags {
    const KEY: &'static str = "tags";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .deployment
            .set_placeholder("Name of this deployment, used to tag resources");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.deployed_by)?;
        out.field(&self.deployment)?;
        out.field(&self.project)?;
        out.field(&self.version)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.deployed_by)?;
        input.field(&mut self.deployment)?;
        input.field(&mut self.project)?;
        input.field(&mut self.version)
    }
}
