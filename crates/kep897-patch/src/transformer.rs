//! The Kep897Patch transformer, applying a list of patches in order.
use std::{path::Path, str::FromStr};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};
use strum::{Display, EnumString};
use tracing::{debug, info, instrument};

use crate::{
    loader::Loader,
    merge::{self, MergeService},
    resource::ResourceCollection,
    target::Target,
    template,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("StrategicMergePatch is the only supported patch type, \"{given}\" given"))]
    UnsupportedPatchType { given: String },

    #[snafu(display("0 resources matching {target}"))]
    NoMatchingResources { target: Target },

    #[snafu(transparent)]
    Template { source: template::Error },

    #[snafu(transparent)]
    Merge { source: merge::Error },
}

/// Errors encountered while reading a [`PatchTransformer`] configuration.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("failed to read transformer config from {path}", path = path.display()))]
    ReadConfig {
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[snafu(display("failed to deserialize transformer config"))]
    DeserializeConfig { source: serde_yaml::Error },
}

/// The kinds of patches the transformer knows about.
///
/// Patches declare their type as a string, see [`Patch::patch_type`].
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
pub enum PatchType {
    #[strum(serialize = "StrategicMergePatch")]
    StrategicMerge,
}

/// A single patch, applied to every resource selected by its target.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Relative file path to the patch file.
    #[serde(alias = "Path")]
    pub path: String,

    /// Points to the resources that the patch is applied to.
    #[serde(default, alias = "Target")]
    pub target: Target,

    /// The type of the patch, only `StrategicMergePatch` is supported.
    #[serde(default, rename = "type", alias = "Type")]
    pub type_name: String,
}

impl Patch {
    /// Resolves the declared type name into a [`PatchType`].
    pub fn patch_type(&self) -> Result<PatchType> {
        PatchType::from_str(&self.type_name).map_err(|_| Error::UnsupportedPatchType {
            given: self.type_name.clone(),
        })
    }
}

/// The collaborators a [`PatchTransformer`] needs to do its work.
///
/// A context is created once per invocation and passed to
/// [`PatchTransformer::transform`].
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    loader: &'a dyn Loader,
    merger: &'a dyn MergeService,
}

impl<'a> TransformContext<'a> {
    pub fn new(loader: &'a dyn Loader, merger: &'a dyn MergeService) -> Self {
        Self { loader, merger }
    }

    pub fn loader(&self) -> &'a dyn Loader {
        self.loader
    }

    pub fn merger(&self) -> &'a dyn MergeService {
        self.merger
    }
}

/// The transformer configuration, as read from the plugin config document.
///
/// ```yaml
/// apiVersion: sourceability.com/v1
/// kind: Kep897Patch
/// metadata:
///   name: notImportantHere
/// patches:
/// - path: deployment-patch.yaml
///   target:
///     kind: Deployment
///   type: StrategicMergePatch
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTransformer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    #[serde(default, alias = "Patches")]
    pub patches: Vec<Patch>,
}

impl PatchTransformer {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self {
            patches,
            ..Default::default()
        }
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(input).context(DeserializeConfigSnafu)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        Self::from_yaml_str(&content)
    }

    /// Applies all patches to `resources`, strictly in declaration order.
    ///
    /// Every patch observes the effects of the patches before it, so a label
    /// added by one patch can make a resource eligible for the next one.
    ///
    /// The first error aborts the whole transformation. Patches applied before
    /// the failing one are not rolled back.
    #[instrument(
        skip_all,
        fields(
            name = self.metadata.as_ref().and_then(|meta| meta.name.as_deref()),
            patches = self.patches.len(),
            resources = resources.len(),
        )
    )]
    pub fn transform(
        &self,
        context: &TransformContext<'_>,
        resources: &mut ResourceCollection,
    ) -> Result<()> {
        for (index, patch) in self.patches.iter().enumerate() {
            match patch.patch_type()? {
                PatchType::StrategicMerge => {
                    apply_strategic_merge_patch(context, patch, resources)?;
                }
            }
            info!(index, path = %patch.path, "applied patch");
        }

        Ok(())
    }
}

fn apply_strategic_merge_patch(
    context: &TransformContext<'_>,
    patch: &Patch,
    resources: &mut ResourceCollection,
) -> Result<()> {
    let matched = resources.matching(&patch.target);
    ensure!(
        !matched.is_empty(),
        NoMatchingResourcesSnafu {
            target: patch.target.clone(),
        }
    );
    debug!(
        patch.target = %patch.target,
        matched = matched.len(),
        "found resources matching patch target"
    );

    let template = template::load_template(context.loader(), &patch.path)?;
    let instances = template::instantiate(matched, &template);

    context.merger().apply(resources, instances)?;
    Ok(())
}
