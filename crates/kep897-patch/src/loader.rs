//! Loading of resources from YAML documents.
use std::path::PathBuf;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::resource::Resource;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read file {path}", path = path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse YAML document #{index} in {origin:?}"))]
    ParseDocument {
        source: serde_yaml::Error,
        origin: String,
        index: usize,
    },

    #[snafu(display("failed to deserialize resource from YAML document #{index} in {origin:?}"))]
    DeserializeResource {
        source: serde_yaml::Error,
        origin: String,
        index: usize,
    },
}

/// Loads the resources contained in a file referenced by a patch.
pub trait Loader {
    /// Loads every resource contained in the file at `path`.
    ///
    /// Empty documents are skipped, so a file containing only `---` separators
    /// yields no resources.
    fn load(&self, path: &str) -> Result<Vec<Resource>>;
}

/// A [`Loader`] reading files from the local filesystem.
///
/// Relative paths are resolved against the root directory, which usually is
/// the directory containing the kustomization.
#[derive(Clone, Debug)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Loader for FileSystemLoader {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn load(&self, path: &str) -> Result<Vec<Resource>> {
        let resolved = self.resolve(path);
        let content = std::fs::read_to_string(&resolved).context(ReadFileSnafu {
            path: resolved.clone(),
        })?;

        let resources = parse_resources(&content, path)?;
        debug!(
            path = %resolved.display(),
            count = resources.len(),
            "loaded resources from file"
        );

        Ok(resources)
    }
}

/// Parses a multi-document YAML stream into resources.
///
/// `origin` is only used to name the input in error messages.
pub fn parse_resources(input: &str, origin: &str) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let value = serde_yaml::Value::deserialize(document).context(ParseDocumentSnafu {
            origin,
            index,
        })?;

        if value.is_null() {
            continue;
        }

        let resource =
            serde_yaml::from_value(value).context(DeserializeResourceSnafu { origin, index })?;
        resources.push(resource);
    }

    Ok(resources)
}
