//! Utility functions for writing resources in the YAML file format
use std::io::Write;

use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::resource::ResourceCollection;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize resource {resource} as YAML"))]
    SerializeYaml {
        source: serde_yaml::Error,
        resource: String,
    },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },
}

/// Provides configurable options during YAML serialization.
///
/// For most callers the default implementation [`SerializeOptions::default()`]
/// is sufficient. It produces the same stream layout as `kustomize build`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) before the first document.
    pub explicit_document: bool,
}

/// Serializes all resources as a multi-document YAML stream, separated by
/// `---`.
pub fn serialize_resources<W>(resources: &ResourceCollection, writer: W) -> Result<()>
where
    W: Write,
{
    serialize_resources_with(resources, writer, SerializeOptions::default())
}

/// Like [`serialize_resources`], using the provided [`SerializeOptions`].
pub fn serialize_resources_with<W>(
    resources: &ResourceCollection,
    mut writer: W,
    options: SerializeOptions,
) -> Result<()>
where
    W: Write,
{
    for (index, resource) in resources.iter().enumerate() {
        if index > 0 || options.explicit_document {
            writer
                .write_all(b"---\n")
                .context(WriteDocumentSeparatorSnafu)?;
        }

        let mut serializer = serde_yaml::Serializer::new(&mut writer);
        resource
            .serialize(&mut serializer)
            .with_context(|_| SerializeYamlSnafu {
                resource: resource.to_string(),
            })?;
    }

    Ok(())
}

/// Serializes all resources into a [`String`], see [`serialize_resources`].
pub fn to_string(resources: &ResourceCollection) -> Result<String> {
    let mut buffer = Vec::new();
    serialize_resources(resources, &mut buffer)?;

    // serde_yaml only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
