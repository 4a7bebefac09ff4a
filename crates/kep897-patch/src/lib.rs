//! Applies a strategic merge patch to every resource selected by a target.
//!
//! A [`PatchTransformer`] holds a list of [`Patch`]es. Each patch names a
//! patch file and a [`Target`]. For every resource in a [`ResourceCollection`]
//! matching the target, the patch file is instantiated once (renamed to the
//! matched resource) and merged into that resource.
//!
//! ```
//! use indoc::indoc;
//! use kep897_patch::{
//!     PatchTransformer, TransformContext, loader::Loader, merge::StrategicMerge,
//!     resource::{Resource, ResourceCollection},
//! };
//!
//! struct Inline;
//!
//! impl Loader for Inline {
//!     fn load(&self, path: &str) -> Result<Vec<Resource>, kep897_patch::loader::Error> {
//!         kep897_patch::loader::parse_resources(
//!             indoc! {"
//!                 apiVersion: v1
//!                 kind: Pod
//!                 metadata:
//!                   name: notImportantHere
//!                 spec:
//!                   nodeSelector:
//!                     type: prod
//!             "},
//!             path,
//!         )
//!     }
//! }
//!
//! let transformer = PatchTransformer::from_yaml_str(indoc! {"
//!     patches:
//!     - path: pod-patch.yaml
//!       target:
//!         kind: Pod
//!       type: StrategicMergePatch
//! "})
//! .expect("valid transformer config");
//!
//! let mut resources = ResourceCollection::from_yaml_str(indoc! {"
//!     apiVersion: v1
//!     kind: Pod
//!     metadata:
//!       name: elasticsearch
//! "})
//! .expect("valid resources");
//!
//! let context = TransformContext::new(&Inline, &StrategicMerge);
//! transformer
//!     .transform(&context, &mut resources)
//!     .expect("patch applies");
//! ```

pub mod loader;
pub mod logging;
pub mod merge;
pub mod resource;
pub mod target;
pub mod template;
pub mod transformer;
pub mod yaml;

pub use target::Target;
pub use transformer::{Patch, PatchTransformer, PatchType, TransformContext};
