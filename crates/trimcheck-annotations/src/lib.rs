//! Capability annotations for reflection-sensitive values
//!
//! A capability set names the member categories a consumer will access
//! through reflection on a `System.Type` value. Sets combine with bitwise
//! union and use the same numeric encoding as the runtime attribute, so
//! `PublicConstructors` implies `PublicParameterlessConstructor` and `All`
//! implies everything.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

bitflags! {
    /// A set of member categories that may be accessed dynamically.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilityKind: u32 {
        const PUBLIC_PARAMETERLESS_CONSTRUCTOR = 0x0001;
        const PUBLIC_CONSTRUCTORS = 0x0002 | Self::PUBLIC_PARAMETERLESS_CONSTRUCTOR.bits();
        const NON_PUBLIC_CONSTRUCTORS = 0x0004;
        const PUBLIC_METHODS = 0x0008;
        const NON_PUBLIC_METHODS = 0x0010;
        const PUBLIC_FIELDS = 0x0020;
        const NON_PUBLIC_FIELDS = 0x0040;
        const PUBLIC_NESTED_TYPES = 0x0080;
        const NON_PUBLIC_NESTED_TYPES = 0x0100;
        const PUBLIC_PROPERTIES = 0x0200;
        const NON_PUBLIC_PROPERTIES = 0x0400;
        const PUBLIC_EVENTS = 0x0800;
        const NON_PUBLIC_EVENTS = 0x1000;
        const INTERFACES = 0x2000;
        const ALL = !0;
    }
}

/// Kinds that survive a derived-to-base-type projection.
///
/// Constructors and nested types are not inherited-visible, and non-public
/// members are never assumed reachable through the base type.
const BASE_TYPE_PROPAGATED: CapabilityKind = CapabilityKind::PUBLIC_METHODS
    .union(CapabilityKind::PUBLIC_FIELDS)
    .union(CapabilityKind::PUBLIC_EVENTS)
    .union(CapabilityKind::PUBLIC_PROPERTIES)
    .union(CapabilityKind::INTERFACES);

/// Every bit that has a kind name; `ALL` additionally sets the unnamed bits.
const NAMED_KINDS: CapabilityKind = CapabilityKind::PUBLIC_CONSTRUCTORS
    .union(CapabilityKind::NON_PUBLIC_CONSTRUCTORS)
    .union(CapabilityKind::PUBLIC_METHODS)
    .union(CapabilityKind::NON_PUBLIC_METHODS)
    .union(CapabilityKind::PUBLIC_FIELDS)
    .union(CapabilityKind::NON_PUBLIC_FIELDS)
    .union(CapabilityKind::PUBLIC_NESTED_TYPES)
    .union(CapabilityKind::NON_PUBLIC_NESTED_TYPES)
    .union(CapabilityKind::PUBLIC_PROPERTIES)
    .union(CapabilityKind::NON_PUBLIC_PROPERTIES)
    .union(CapabilityKind::PUBLIC_EVENTS)
    .union(CapabilityKind::NON_PUBLIC_EVENTS)
    .union(CapabilityKind::INTERFACES);

// Order matters for rendering: PublicConstructors must come before the
// parameterless bit it contains.
const KIND_NAMES: [(CapabilityKind, &str); 14] = [
    (CapabilityKind::PUBLIC_CONSTRUCTORS, "PublicConstructors"),
    (CapabilityKind::PUBLIC_PARAMETERLESS_CONSTRUCTOR, "PublicParameterlessConstructor"),
    (CapabilityKind::NON_PUBLIC_CONSTRUCTORS, "NonPublicConstructors"),
    (CapabilityKind::PUBLIC_METHODS, "PublicMethods"),
    (CapabilityKind::NON_PUBLIC_METHODS, "NonPublicMethods"),
    (CapabilityKind::PUBLIC_FIELDS, "PublicFields"),
    (CapabilityKind::NON_PUBLIC_FIELDS, "NonPublicFields"),
    (CapabilityKind::PUBLIC_NESTED_TYPES, "PublicNestedTypes"),
    (CapabilityKind::NON_PUBLIC_NESTED_TYPES, "NonPublicNestedTypes"),
    (CapabilityKind::PUBLIC_PROPERTIES, "PublicProperties"),
    (CapabilityKind::NON_PUBLIC_PROPERTIES, "NonPublicProperties"),
    (CapabilityKind::PUBLIC_EVENTS, "PublicEvents"),
    (CapabilityKind::NON_PUBLIC_EVENTS, "NonPublicEvents"),
    (CapabilityKind::INTERFACES, "Interfaces"),
];

impl CapabilityKind {
    /// The empty set; also the implicit annotation of undeclared symbols.
    pub const NONE: CapabilityKind = CapabilityKind::empty();

    /// Whether a value carrying `self` may flow into a position requiring `required`
    pub fn satisfies(self, required: CapabilityKind) -> bool {
        self.contains(required)
    }

    /// Named kinds required but not available
    ///
    /// The unnamed bits of `ALL` are never reported, so the result always
    /// renders as a list of kind names.
    pub fn missing_from(self, required: CapabilityKind) -> CapabilityKind {
        required.difference(self).intersection(NAMED_KINDS)
    }

    /// Annotation carried by `BaseType` of a value annotated with `self`
    pub fn propagated_to_base_type(self) -> CapabilityKind {
        if self == CapabilityKind::ALL {
            CapabilityKind::ALL
        } else {
            self.intersection(BASE_TYPE_PROPAGATED)
        }
    }
}

impl Default for CapabilityKind {
    fn default() -> Self {
        CapabilityKind::NONE
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        if *self == CapabilityKind::ALL {
            return f.write_str("All");
        }

        let mut remaining = *self;
        let mut first = true;
        for (kind, name) in KIND_NAMES {
            if remaining.contains(kind) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                remaining.remove(kind);
                first = false;
            }
        }
        if !remaining.is_empty() {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#x}", remaining.bits())?;
        }
        Ok(())
    }
}

/// Error produced when a textual capability set cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationParseError {
    #[error("empty capability annotation")]
    Empty,
    #[error("unknown capability kind `{0}`")]
    UnknownKind(String),
}

impl FromStr for CapabilityKind {
    type Err = AnnotationParseError;

    /// Parses `"PublicMethods | PublicFields"`; commas are accepted as separators too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result = CapabilityKind::NONE;
        let mut seen_any = false;

        for part in s.split(['|', ',']).map(str::trim) {
            if part.is_empty() {
                continue;
            }
            seen_any = true;
            result |= match part {
                "None" => CapabilityKind::NONE,
                "All" => CapabilityKind::ALL,
                _ => KIND_NAMES
                    .iter()
                    .find(|(_, name)| *name == part)
                    .map(|(kind, _)| *kind)
                    .ok_or_else(|| AnnotationParseError::UnknownKind(part.to_string()))?,
            };
        }

        if seen_any {
            Ok(result)
        } else {
            Err(AnnotationParseError::Empty)
        }
    }
}

impl Serialize for CapabilityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CapabilityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
