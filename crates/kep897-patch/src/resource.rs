//! The resource model the transformer operates on.
//!
//! A [`Resource`] is a dynamically typed Kubernetes object: its type and
//! metadata are parsed, everything else is kept as an opaque JSON body.
use std::{collections::BTreeMap, fmt};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::{loader, target::Target};

/// The `apiVersion` and `kind` of a [`Resource`].
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,
}

/// The identity of a [`Resource`] type, with the `apiVersion` split into its
/// group and version.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Splits an `apiVersion` with the `(<GROUP>/)<VERSION>` format into its
/// group and version. The core group is returned as an empty string.
///
/// ```
/// use kep897_patch::resource::split_api_version;
///
/// assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
/// assert_eq!(split_api_version("v1"), ("", "v1"));
/// ```
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

/// A single Kubernetes object with a typed header and an untyped body.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Resource {
    #[serde(flatten)]
    pub types: TypeMeta,

    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All remaining top-level fields, like `spec` or `data`.
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl Resource {
    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version) = split_api_version(&self.types.api_version);

        GroupVersionKind {
            group: group.to_owned(),
            version: version.to_owned(),
            kind: self.types.kind.clone(),
        }
    }

    pub fn group(&self) -> &str {
        split_api_version(&self.types.api_version).0
    }

    pub fn version(&self) -> &str {
        split_api_version(&self.types.api_version).1
    }

    pub fn kind(&self) -> &str {
        &self.types.kind
    }

    /// Returns the name of the resource, or an empty string if it has none.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = Some(name.into());
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.labels.as_ref()
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{gvk}|{name}", gvk = self.gvk(), name = self.name())
    }
}

/// An ordered collection of [`Resource`]s.
///
/// Resources are kept in insertion order and are not deduplicated: two
/// resources with the same name but a different kind are distinct entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceCollection {
    resources: Vec<Resource>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a multi-document YAML stream into a collection.
    pub fn from_yaml_str(input: &str) -> Result<Self, loader::Error> {
        loader::parse_resources(input, "<inline>").map(Self::from)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Resource> {
        self.resources.get_mut(index)
    }

    /// Removes the resource at `index`, shifting all following resources.
    pub fn remove(&mut self, index: usize) -> Resource {
        self.resources.remove(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Returns every resource matched by `target`, in collection order.
    pub fn matching(&self, target: &Target) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|resource| target.matches(resource))
            .collect()
    }

    /// Looks up a resource by its kind and name.
    pub fn find(&self, kind: &str, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|resource| resource.kind() == kind && resource.name() == name)
    }
}

impl From<Vec<Resource>> for ResourceCollection {
    fn from(resources: Vec<Resource>) -> Self {
        Self { resources }
    }
}

impl FromIterator<Resource> for ResourceCollection {
    fn from_iter<T: IntoIterator<Item = Resource>>(iter: T) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResourceCollection {
    type IntoIter = std::vec::IntoIter<Resource>;
    type Item = Resource;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResourceCollection {
    type IntoIter = std::slice::Iter<'a, Resource>;
    type Item = &'a Resource;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("apps/v1", "apps", "v1")]
    #[case("certificates.k8s.io/v1beta1", "certificates.k8s.io", "v1beta1")]
    #[case("v1", "", "v1")]
    #[case("", "", "")]
    fn api_version_split(#[case] input: &str, #[case] group: &str, #[case] version: &str) {
        assert_eq!(split_api_version(input), (group, version));
    }

    #[test]
    fn deserialize_keeps_body() {
        let resource: Resource = serde_yaml::from_str(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: nginx
              labels:
                env: prod
            spec:
              replicas: 2
        "})
        .expect("test YAML is valid");

        assert_eq!(resource.group(), "apps");
        assert_eq!(resource.version(), "v1");
        assert_eq!(resource.kind(), "Deployment");
        assert_eq!(resource.name(), "nginx");
        assert_eq!(
            resource.labels().and_then(|labels| labels.get("env")),
            Some(&"prod".to_owned())
        );
        assert_eq!(resource.data["spec"]["replicas"], 2);
        assert!(resource.data.get("apiVersion").is_none());
        assert!(resource.data.get("metadata").is_none());
    }

    #[test]
    fn serialize_puts_header_first() {
        let resource: Resource = serde_yaml::from_str(indoc! {"
            spec:
              replicas: 2
            kind: Deployment
            metadata:
              name: nginx
            apiVersion: apps/v1
        "})
        .expect("test YAML is valid");

        let output = serde_yaml::to_string(&resource).expect("resource serializes");
        assert_eq!(
            output,
            indoc! {"
                apiVersion: apps/v1
                kind: Deployment
                metadata:
                  name: nginx
                spec:
                  replicas: 2
            "}
        );
    }

    #[test]
    fn same_name_different_kind_are_distinct() {
        let resources = ResourceCollection::from_yaml_str(indoc! {"
            apiVersion: v1
            kind: Service
            metadata:
              name: web
            ---
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
        "})
        .expect("test YAML is valid");

        assert_eq!(resources.len(), 2);
        assert_eq!(
            resources.find("Deployment", "web").map(Resource::group),
            Some("apps")
        );
        assert_eq!(
            resources.find("Service", "web").map(Resource::group),
            Some("")
        );
    }

    #[test]
    fn display_names_identity() {
        let mut resource = Resource {
            types: TypeMeta {
                api_version: "apps/v1".to_owned(),
                kind: "Deployment".to_owned(),
            },
            ..Default::default()
        };
        resource.set_name("nginx");

        assert_eq!(resource.to_string(), "apps/v1/Deployment|nginx");
    }
}
