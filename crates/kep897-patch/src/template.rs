//! Patch templates and their per-resource instances.
use snafu::{Snafu, ensure};
use tracing::debug;

use crate::{
    loader::{self, Loader},
    resource::Resource,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Expected to find 1 resource in file \"{path}\", found {found}"))]
    TemplateCountMismatch { path: String, found: usize },

    #[snafu(transparent)]
    Load { source: loader::Error },
}

/// Loads the patch template stored at `path`.
///
/// The file must contain exactly one document. Files with multiple documents
/// are rejected instead of silently using the first one.
pub fn load_template(loader: &dyn Loader, path: &str) -> Result<Resource> {
    let mut resources = loader.load(path)?;

    ensure!(
        resources.len() == 1,
        TemplateCountMismatchSnafu {
            path,
            found: resources.len(),
        }
    );

    // The length was checked above
    Ok(resources.swap_remove(0))
}

/// Creates one patch instance per matched resource.
///
/// Every instance is an independent copy of `template` which only differs in
/// its name, set to the name of the matched resource. The instances are
/// returned in the order of `matched`.
pub fn instantiate<'a>(
    matched: impl IntoIterator<Item = &'a Resource>,
    template: &Resource,
) -> Vec<Resource> {
    matched
        .into_iter()
        .map(|resource| {
            let mut instance = template.clone();
            instance.set_name(resource.name());

            debug!(%resource, "created patch instance");
            instance
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::resource::ResourceCollection;

    /// Serves a fixed set of in-memory files.
    struct StaticLoader(BTreeMap<&'static str, &'static str>);

    impl Loader for StaticLoader {
        fn load(&self, path: &str) -> Result<Vec<Resource>, loader::Error> {
            let content = self.0.get(path).copied().unwrap_or_default();
            loader::parse_resources(content, path)
        }
    }

    const TEMPLATE: &str = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: notImportantHere
          labels:
            patched: 'true'
        spec:
          template:
            spec:
              nodeSelector:
                type: prod
    "};

    fn static_loader() -> StaticLoader {
        StaticLoader(BTreeMap::from([
            ("single.yaml", TEMPLATE),
            ("empty.yaml", "---\n"),
            (
                "double.yaml",
                indoc! {"
                    kind: Deployment
                    ---
                    kind: Pod
                "},
            ),
        ]))
    }

    #[test]
    fn load_single_document() {
        let template = load_template(&static_loader(), "single.yaml").expect("template loads");
        assert_eq!(template.name(), "notImportantHere");
        assert_eq!(template.kind(), "Deployment");
    }

    #[rstest]
    #[case("empty.yaml", 0)]
    #[case("double.yaml", 2)]
    fn load_rejects_document_count(#[case] path: &str, #[case] expected: usize) {
        let error = load_template(&static_loader(), path).expect_err("count must be rejected");

        assert!(
            matches!(error, Error::TemplateCountMismatch { found, .. } if found == expected),
            "unexpected error: {error:?}"
        );
        assert_eq!(
            error.to_string(),
            format!("Expected to find 1 resource in file \"{path}\", found {expected}")
        );
    }

    #[test]
    fn load_propagates_loader_error() {
        let loader = StaticLoader(BTreeMap::from([("broken.yaml", "kind: [Pod\n")]));
        let error = load_template(&loader, "broken.yaml").expect_err("file is broken");

        assert!(matches!(
            error,
            Error::Load {
                source: loader::Error::ParseDocument { .. }
            }
        ));
    }

    #[test]
    fn instantiate_renames_each_copy() {
        let template: Resource = serde_yaml::from_str(TEMPLATE).expect("test YAML is valid");
        let resources = ResourceCollection::from_yaml_str(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: nginx
            ---
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: nginx-2
        "})
        .expect("test YAML is valid");

        let instances = instantiate(&resources, &template);

        assert_eq!(instances.len(), 2);
        for (instance, resource) in instances.iter().zip(&resources) {
            assert_eq!(instance.name(), resource.name());
            assert_eq!(instance.gvk(), template.gvk());
            assert_eq!(instance.data, template.data);
            assert_eq!(instance.labels(), template.labels());
        }
        assert_eq!(template.name(), "notImportantHere");
    }

    #[test]
    fn instances_do_not_share_state() {
        let template: Resource = serde_yaml::from_str(TEMPLATE).expect("test YAML is valid");
        let resources = ResourceCollection::from_yaml_str(indoc! {"
            kind: Deployment
            metadata:
              name: a
            ---
            kind: Deployment
            metadata:
              name: b
        "})
        .expect("test YAML is valid");

        let mut instances = instantiate(&resources, &template);
        instances[0].data["spec"]["template"]["spec"]["nodeSelector"]["type"] = "dev".into();

        assert_eq!(
            instances[1].data["spec"]["template"]["spec"]["nodeSelector"]["type"],
            "prod"
        );
        assert_eq!(
            template.data["spec"]["template"]["spec"]["nodeSelector"]["type"],
            "prod"
        );
    }

    #[test]
    fn instantiate_nothing() {
        let template: Resource = serde_yaml::from_str(TEMPLATE).expect("test YAML is valid");
        assert!(instantiate(&ResourceCollection::new(), &template).is_empty());
    }
}
