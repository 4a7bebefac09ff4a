//! Selection of the resources a patch applies to.
use std::{collections::BTreeMap, fmt};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::resource::Resource;

mod name_pattern;

/// Characters which turn a target name into a glob pattern.
const GLOB_METACHARACTERS: &[char] = &['*', '?', '['];

/// `*` and `?` never match a path separator.
const NAME_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Points to the set of resources a patch is applied to.
///
/// Every field is optional. An empty field matches any value, so the default
/// target matches every resource.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, alias = "Group", skip_serializing_if = "String::is_empty")]
    pub group: String,

    #[serde(default, alias = "Version", skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, alias = "Kind", skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// The name of the target, which may contain glob wildcards to select
    /// multiple resources.
    #[serde(default, alias = "Name", skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Annotations which must all be present on a resource with the same
    /// values.
    #[serde(
        default,
        alias = "MatchAnnotations",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub match_annotations: BTreeMap<String, String>,

    /// Labels which must all be present on a resource with the same values.
    #[serde(
        default,
        alias = "LabelSelector",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub label_selector: BTreeMap<String, String>,
}

impl Target {
    /// Returns whether `resource` is selected by this target.
    pub fn matches(&self, resource: &Resource) -> bool {
        field_matches(&self.group, resource.group())
            && field_matches(&self.version, resource.version())
            && field_matches(&self.kind, resource.kind())
            && self.name_matches(resource.name())
            && subset_matches(&self.label_selector, resource.labels())
            && subset_matches(&self.match_annotations, resource.annotations())
    }

    /// Returns whether the target name contains glob wildcards.
    pub fn name_is_glob(&self) -> bool {
        self.name.contains(GLOB_METACHARACTERS)
    }

    fn name_matches(&self, name: &str) -> bool {
        if self.name.is_empty() {
            return true;
        }

        // A name without wildcards degenerates to an exact match, malformed
        // patterns never match
        name_pattern::to_glob(&self.name)
            .and_then(|glob| Pattern::new(&glob).ok())
            .is_some_and(|pattern| pattern.matches_with(name, NAME_MATCH_OPTIONS))
    }
}

/// Formats the target as `{group version kind name annotations labels}`, the
/// layout used in Kep897Patch error messages.
impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{group} {version} {kind} {name} {annotations} {labels}}}",
            group = self.group,
            version = self.version,
            kind = self.kind,
            name = self.name,
            annotations = MapDisplay(&self.match_annotations),
            labels = MapDisplay(&self.label_selector),
        )
    }
}

/// Renders a map as `map[key:value other:value]`.
struct MapDisplay<'a>(&'a BTreeMap<String, String>);

impl fmt::Display for MapDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("map[")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}:{value}")?;
        }
        f.write_str("]")
    }
}

fn field_matches(expected: &str, actual: &str) -> bool {
    expected.is_empty() || expected == actual
}

/// Every expected entry must be present in `actual` with an identical value.
fn subset_matches(
    expected: &BTreeMap<String, String>,
    actual: Option<&BTreeMap<String, String>>,
) -> bool {
    expected.iter().all(|(key, value)| {
        actual
            .and_then(|actual| actual.get(key))
            .is_some_and(|actual_value| actual_value == value)
    })
}
