//! Merging of patch instances into the resources they target.
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::resource::{GroupVersionKind, Resource, ResourceCollection};

pub mod strategic;

use strategic::Directive;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to find a target for patch {patch}"))]
    NoTarget { patch: String },

    #[snafu(display("found {count} targets for patch {patch}, expected exactly one"))]
    AmbiguousTarget { patch: String, count: usize },

    #[snafu(display("failed to serialize resource {resource}"))]
    SerializeResource {
        source: serde_json::Error,
        resource: String,
    },

    #[snafu(display("resource {resource} is not an object"))]
    NotAnObject { resource: String },

    #[snafu(display("failed to deserialize merged resource {resource}"))]
    DeserializeMerged {
        source: serde_json::Error,
        resource: String,
    },
}

/// Merges patch documents into a collection of resources.
pub trait MergeService {
    /// Merges every patch into the resource it correlates with, mutating
    /// `resources` in place.
    fn apply(&self, resources: &mut ResourceCollection, patches: Vec<Resource>) -> Result<()>;
}

/// A [`MergeService`] performing a strategic merge.
///
/// Each patch is correlated with its target by kind and name. When this is
/// ambiguous, the group and version of the patch are used to narrow down the
/// candidates. The target keeps its own `apiVersion`, `kind` and name.
///
/// A patch carrying a top-level `$patch: delete` directive removes its target
/// from the collection.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrategicMerge;

impl MergeService for StrategicMerge {
    fn apply(&self, resources: &mut ResourceCollection, patches: Vec<Resource>) -> Result<()> {
        for patch in patches {
            let index = find_target(resources, &patch)?;
            let patch_document = to_object(&patch)?;

            if Directive::of(&patch_document) == Some(Directive::Delete) {
                let removed = resources.remove(index);
                debug!(resource = %removed, "deleted resource");
                continue;
            }

            let Some(target) = resources.get_mut(index) else {
                continue;
            };
            *target = merge_resource(target, patch_document)?;
            debug!(resource = %target, "merged patch into resource");
        }

        Ok(())
    }
}

/// Returns the index of the single resource `patch` correlates with.
fn find_target(resources: &ResourceCollection, patch: &Resource) -> Result<usize> {
    let candidates: Vec<(usize, &Resource)> = resources
        .iter()
        .enumerate()
        .filter(|(_, resource)| resource.kind() == patch.kind() && resource.name() == patch.name())
        .collect();

    match candidates.as_slice() {
        [] => NoTargetSnafu {
            patch: patch.to_string(),
        }
        .fail(),
        [(index, _)] => Ok(*index),
        _ => {
            let gvk = patch.gvk();
            let narrowed: Vec<usize> = candidates
                .iter()
                .filter(|(_, resource)| same_group_version(&resource.gvk(), &gvk))
                .map(|(index, _)| *index)
                .collect();

            match narrowed.as_slice() {
                [index] => Ok(*index),
                _ => AmbiguousTargetSnafu {
                    patch: patch.to_string(),
                    count: candidates.len(),
                }
                .fail(),
            }
        }
    }
}

fn same_group_version(lhs: &GroupVersionKind, rhs: &GroupVersionKind) -> bool {
    lhs.group == rhs.group && lhs.version == rhs.version
}

fn to_object(resource: &Resource) -> Result<serde_json::Map<String, Value>> {
    let value = serde_json::to_value(resource).with_context(|_| SerializeResourceSnafu {
        resource: resource.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => NotAnObjectSnafu {
            resource: resource.to_string(),
        }
        .fail(),
    }
}

fn merge_resource(
    target: &Resource,
    mut patch_document: serde_json::Map<String, Value>,
) -> Result<Resource> {
    // The identity of the target never changes
    patch_document.remove("apiVersion");
    patch_document.remove("kind");
    if let Some(metadata) = patch_document
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
    {
        metadata.remove("name");
    }

    let target_document = to_object(target)?;
    let merged = strategic::merge_maps(target_document, patch_document);

    let mut merged: Resource = serde_json::from_value(Value::Object(merged))
        .with_context(|_| DeserializeMergedSnafu {
            resource: target.to_string(),
        })?;

    // A top-level `$patch: replace` drops the identity along with everything else
    merged.types = target.types.clone();
    merged.metadata.name = target.metadata.name.clone();

    Ok(merged)
}
