//! Value shapes accepted by configuration fields.
//!
//! Each type here can only be constructed from a value that already has the
//! right shape, so holding one is proof of validity. The [`Shape`] trait is
//! the bridge between these types and raw YAML values.

use crate::diagnostic::DiagnosticCode;
use ipnet::IpNet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;
use strum::{AsRefStr, EnumString, VariantNames};

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static EMAIL_PATTERN: Pattern =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"));

static FQDN_PATTERN: Pattern = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$")
});

static LOCATION_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*$"));

static VM_SKU_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^(Standard|Basic)_\w+$"));

fn is_match(pattern: &Pattern, s: &str) -> bool {
    pattern.as_ref().is_ok_and(|re| re.is_match(s))
}

const FQDN_MAX_LEN: usize = 253;

// =============================================================================
// Shape trait
// =============================================================================

/// Why a raw value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub code: DiagnosticCode,
    /// Description of what was expected instead
    pub expected: String,
}

impl ShapeError {
    pub fn new(code: DiagnosticCode, expected: impl Into<String>) -> Self {
        Self {
            code,
            expected: expected.into(),
        }
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}", self.expected)
    }
}

impl std::error::Error for ShapeError {}

/// A value type that can be checked against and produced from raw YAML.
pub trait Shape: Clone + PartialEq + fmt::Debug {
    /// Human-readable description of accepted values
    fn expected() -> String;

    /// Parse a raw value, rejecting anything with the wrong shape
    fn from_value(value: &Value) -> Result<Self, ShapeError>;

    /// Serializable form of the value
    fn to_value(&self) -> Value;

    /// Re-check invariants that construction alone cannot guarantee
    fn check(&self) -> Result<(), ShapeError> {
        Ok(())
    }

    /// Text shown to operators when the value changes
    fn describe(&self) -> String {
        value_text(&self.to_value())
    }
}

/// Compact single-line rendering of a raw value for messages
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(value_text).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Mapping(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", value_text(k), value_text(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Value::Tagged(tagged) => value_text(&tagged.value),
    }
}

fn expect_str<'a>(value: &'a Value, code: DiagnosticCode, expected: &str) -> Result<&'a str, ShapeError> {
    value
        .as_str()
        .ok_or_else(|| ShapeError::new(code, expected.to_string()))
}

// =============================================================================
// String-backed shapes
// =============================================================================

/// Implements `Shape`, `FromStr`, `Display` and string serde for a newtype
/// whose `FromStr` does the validation.
macro_rules! string_shape {
    ($ty:ident, $code:expr, $expected:expr) => {
        impl Shape for $ty {
            fn expected() -> String {
                $expected.to_string()
            }

            fn from_value(value: &Value) -> Result<Self, ShapeError> {
                expect_str(value, $code, $expected)?.parse()
            }

            fn to_value(&self) -> Value {
                Value::String(self.to_string())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ShapeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_string()
            }
        }
    };
}

/// A GUID in hyphenated form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(uuid::Uuid);

const GUID_EXPECTED: &str = "a GUID, for example 'd5c5c439-1115-4cb6-ab50-b8e547b6c8dd'";

impl FromStr for Guid {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ShapeError::new(DiagnosticCode::E0101InvalidGuid, GUID_EXPECTED);
        // Only the 36-character hyphenated form is accepted
        if s.len() != 36 {
            return Err(invalid());
        }
        uuid::Uuid::try_parse(s).map(Guid).map_err(|_| invalid())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

string_shape!(Guid, DiagnosticCode::E0101InvalidGuid, GUID_EXPECTED);

/// An e-mail address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

const EMAIL_EXPECTED: &str = "a valid email address, for example 'admin@example.com'";

impl FromStr for EmailAddress {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_match(&EMAIL_PATTERN, s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ShapeError::new(DiagnosticCode::E0102InvalidEmail, EMAIL_EXPECTED))
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(EmailAddress, DiagnosticCode::E0102InvalidEmail, EMAIL_EXPECTED);

/// A fully-qualified domain name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fqdn(String);

const FQDN_EXPECTED: &str = "a valid fully qualified domain name, for example 'example.com'";

impl FromStr for Fqdn {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() <= FQDN_MAX_LEN && is_match(&FQDN_PATTERN, s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ShapeError::new(DiagnosticCode::E0108InvalidFqdn, FQDN_EXPECTED))
        }
    }
}

impl fmt::Display for Fqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(Fqdn, DiagnosticCode::E0108InvalidFqdn, FQDN_EXPECTED);

/// An IPv4/IPv6 network in CIDR form.
///
/// Bare addresses become single-host networks and host bits are cleared, so
/// `1.2.3.4` is stored as `1.2.3.4/32` and `10.0.0.7/24` as `10.0.0.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress(IpNet);

const IP_EXPECTED: &str = "a valid IP address or CIDR range, for example '1.2.3.4' or '10.0.0.0/24'";

impl IpAddress {
    pub fn network(&self) -> IpNet {
        self.0
    }
}

impl FromStr for IpAddress {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(Self(net.trunc()));
        }
        s.parse::<IpAddr>()
            .map(|addr| Self(IpNet::from(addr)))
            .map_err(|_| ShapeError::new(DiagnosticCode::E0103InvalidIpAddress, IP_EXPECTED))
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

string_shape!(IpAddress, DiagnosticCode::E0103InvalidIpAddress, IP_EXPECTED);

/// An IANA timezone name such as `Europe/London`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeZone(String);

const TIMEZONE_EXPECTED: &str = "a valid IANA timezone, for example 'Europe/London'";

impl TimeZone {
    pub fn utc() -> Self {
        Self("Etc/UTC".to_string())
    }
}

impl FromStr for TimeZone {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<chrono_tz::Tz>()
            .map(|_| Self(s.to_string()))
            .map_err(|_| ShapeError::new(DiagnosticCode::E0104InvalidTimezone, TIMEZONE_EXPECTED))
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(TimeZone, DiagnosticCode::E0104InvalidTimezone, TIMEZONE_EXPECTED);

/// An Azure region code such as `uksouth`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AzureLocation(String);

const LOCATION_EXPECTED: &str = "an Azure location code, for example 'uksouth'";

impl FromStr for AzureLocation {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_match(&LOCATION_PATTERN, s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ShapeError::new(DiagnosticCode::E0115InvalidLocation, LOCATION_EXPECTED))
        }
    }
}

impl fmt::Display for AzureLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(AzureLocation, DiagnosticCode::E0115InvalidLocation, LOCATION_EXPECTED);

/// An Azure virtual machine SKU such as `Standard_D2s_v4`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AzureVmSku(String);

const VM_SKU_EXPECTED: &str = "a valid Azure VM SKU, for example 'Standard_D2s_v4'";

impl FromStr for AzureVmSku {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_match(&VM_SKU_PATTERN, s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ShapeError::new(DiagnosticCode::E0109InvalidVmSku, VM_SKU_EXPECTED))
        }
    }
}

impl fmt::Display for AzureVmSku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(AzureVmSku, DiagnosticCode::E0109InvalidVmSku, VM_SKU_EXPECTED);

/// A string with at least one non-whitespace character
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

const NON_EMPTY_EXPECTED: &str = "a non-empty string";

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap text the caller has built to be non-empty
    pub(crate) fn new_unchecked(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl FromStr for NonEmptyString {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(ShapeError::new(DiagnosticCode::E0106EmptyValue, NON_EMPTY_EXPECTED))
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

string_shape!(NonEmptyString, DiagnosticCode::E0106EmptyValue, NON_EMPTY_EXPECTED);

// =============================================================================
// Scalar shapes
// =============================================================================

impl Shape for bool {
    fn expected() -> String {
        "a boolean (true or false)".to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ShapeError> {
        value
            .as_bool()
            .ok_or_else(|| ShapeError::new(DiagnosticCode::E0114InvalidType, Self::expected()))
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn describe(&self) -> String {
        if *self { "allowed" } else { "forbidden" }.to_string()
    }
}

/// Strictly positive index identifying an SRE within its SHM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SreIndex(u32);

impl SreIndex {
    pub fn new(index: u32) -> Option<Self> {
        (index > 0).then_some(Self(index))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// The index following `last` (`last` may be zero); `None` past `u32::MAX`
    pub(crate) fn after(last: u32) -> Option<Self> {
        last.checked_add(1).map(Self)
    }
}

impl fmt::Display for SreIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Shape for SreIndex {
    fn expected() -> String {
        "a strictly positive integer".to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ShapeError> {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(SreIndex::new)
            .ok_or_else(|| ShapeError::new(DiagnosticCode::E0110InvalidIndex, Self::expected()))
    }

    fn to_value(&self) -> Value {
        Value::Number(self.0.into())
    }

    fn check(&self) -> Result<(), ShapeError> {
        if self.0 == 0 {
            return Err(ShapeError::new(DiagnosticCode::E0110InvalidIndex, Self::expected()));
        }
        Ok(())
    }
}

// =============================================================================
// Enumerated shapes
// =============================================================================

/// Implements `Shape` for a strum-backed enum.
macro_rules! enum_shape {
    ($ty:ident) => {
        impl Shape for $ty {
            fn expected() -> String {
                format!("one of: {}", <$ty as VariantNames>::VARIANTS.join(", "))
            }

            fn from_value(value: &Value) -> Result<Self, ShapeError> {
                value
                    .as_str()
                    .and_then(|s| s.parse::<$ty>().ok())
                    .ok_or_else(|| {
                        ShapeError::new(DiagnosticCode::E0105InvalidEnumValue, Self::expected())
                    })
            }

            fn to_value(&self) -> Value {
                Value::String(self.as_ref().to_string())
            }
        }
    };
}

/// Database systems that can be deployed inside an SRE
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumString, VariantNames,
)]
#[strum(serialize_all = "snake_case")]
pub enum DatabaseSystem {
    MicrosoftSqlServer,
    Postgresql,
}

enum_shape!(DatabaseSystem);

/// Which external software repositories users may install packages from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AsRefStr, EnumString, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum SoftwarePackageCategory {
    Any,
    PreApproved,
    #[default]
    None,
}

enum_shape!(SoftwarePackageCategory);

// =============================================================================
// Collection shapes
// =============================================================================

impl<T: Shape> Shape for Vec<T> {
    fn expected() -> String {
        format!("a list where each item is {}", T::expected())
    }

    fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let items = value
            .as_sequence()
            .ok_or_else(|| ShapeError::new(DiagnosticCode::E0114InvalidType, Self::expected()))?;
        items
            .iter()
            .map(|item| {
                T::from_value(item).map_err(|e| ShapeError::new(e.code, Self::expected()))
            })
            .collect()
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(Shape::to_value).collect())
    }

    fn check(&self) -> Result<(), ShapeError> {
        self.iter().try_for_each(Shape::check)
    }
}

/// A list whose items must be pairwise distinct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueList<T>(Vec<T>);

impl<T> Default for UniqueList<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: Shape> UniqueList<T> {
    /// Build a list, rejecting duplicate items
    pub fn new(items: Vec<T>) -> Result<Self, ShapeError> {
        let list = Self(items);
        list.check()?;
        Ok(list)
    }

    pub fn items(&self) -> &[T] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Shape> Shape for UniqueList<T> {
    fn expected() -> String {
        format!("a list of unique items where each item is {}", T::expected())
    }

    fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let items = Vec::<T>::from_value(value)
            .map_err(|e| ShapeError::new(e.code, Self::expected()))?;
        Self::new(items)
    }

    fn to_value(&self) -> Value {
        self.0.to_value()
    }

    fn check(&self) -> Result<(), ShapeError> {
        for (i, item) in self.0.iter().enumerate() {
            item.check()?;
            if self.0[..i].contains(item) {
                return Err(ShapeError::new(
                    DiagnosticCode::E0107DuplicateEntry,
                    "all items to be unique",
                ));
            }
        }
        Ok(())
    }
}

/// Mapping of Pulumi stack name to its state location
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackMap(BTreeMap<String, String>);

impl StackMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: NonEmptyString, path: NonEmptyString) {
        self.0.insert(name.to_string(), path.to_string());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Shape for StackMap {
    fn expected() -> String {
        "a mapping of stack name to non-empty state path".to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let invalid = || ShapeError::new(DiagnosticCode::E0114InvalidType, Self::expected());
        let map = value.as_mapping().ok_or_else(invalid)?;
        let mut stacks = BTreeMap::new();
        for (key, path) in map {
            let key = key.as_str().filter(|k| !k.trim().is_empty()).ok_or_else(invalid)?;
            let path = path.as_str().filter(|p| !p.trim().is_empty()).ok_or_else(invalid)?;
            stacks.insert(key.to_string(), path.to_string());
        }
        Ok(Self(stacks))
    }

    fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        for (name, path) in &self.0 {
            map.insert(Value::String(name.clone()), Value::String(path.clone()));
        }
        Value::Mapping(map)
    }
}
