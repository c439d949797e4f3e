//! Image descriptors

use std::path::PathBuf;

/// An image the stack needs, either built locally or pulled from a registry
#[derive(Debug, Clone)]
pub enum ImageSpec {
    /// Built from a local build context
    Build(BuildImage),
    /// Pulled from a remote registry
    Pull(PullImage),
}

/// Locally built image
#[derive(Debug, Clone)]
pub struct BuildImage {
    /// Logical name containers reference
    pub name: String,
    /// Build context directory
    pub context: PathBuf,
    /// Tag applied to the built image
    pub tag: String,
}

/// Remote registry image
#[derive(Debug, Clone)]
pub struct PullImage {
    /// Logical name containers reference
    pub name: String,
    /// Registry reference, e.g. `mongo:bionic`
    pub reference: String,
    /// Keep the image on the host after teardown
    pub keep_locally: bool,
}

impl ImageSpec {
    /// Declare a locally built image
    pub fn build(name: &str, context: PathBuf, tag: &str) -> Self {
        ImageSpec::Build(BuildImage {
            name: name.to_string(),
            context,
            tag: tag.to_string(),
        })
    }

    /// Declare a pulled image
    pub fn pull(name: &str, reference: &str) -> Self {
        ImageSpec::Pull(PullImage {
            name: name.to_string(),
            reference: reference.to_string(),
            keep_locally: false,
        })
    }

    /// Keep a pulled image on the host after teardown
    pub fn keep_locally(mut self, keep: bool) -> Self {
        if let ImageSpec::Pull(ref mut pull) = self {
            pull.keep_locally = keep;
        }
        self
    }

    /// Logical name containers reference
    pub fn name(&self) -> &str {
        match self {
            ImageSpec::Build(build) => &build.name,
            ImageSpec::Pull(pull) => &pull.name,
        }
    }

    /// Reference handed to the engine before digest resolution
    pub fn container_ref(&self) -> &str {
        match self {
            ImageSpec::Build(build) => &build.tag,
            ImageSpec::Pull(pull) => &pull.reference,
        }
    }
}
