//! The desired-state resource graph
//!
//! A `StackGraph` holds everything a stack declares: images, the network,
//! containers, and named outputs. It validates references, computes the
//! dependency-ordered start sequence, and renders a masked plan. Applying
//! the graph is the engine's job.

use super::container::ContainerSpec;
use super::image::ImageSpec;
use super::network::NetworkSpec;
use crate::config::Secret;
use crate::error::{CaravelError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

/// A named stack output
#[derive(Debug, Clone)]
pub enum Output {
    /// Plain value, printed as-is
    Plain(String),
    /// Secret passthrough, masked unless explicitly revealed
    Secret(Secret),
}

impl Output {
    /// Masked rendering
    pub fn masked(&self) -> &str {
        match self {
            Output::Plain(value) => value,
            Output::Secret(_) => crate::config::SECRET_MASK,
        }
    }

    /// Plaintext rendering, for explicit secret display only
    pub fn revealed(&self) -> &str {
        match self {
            Output::Plain(value) => value,
            Output::Secret(secret) => secret.reveal(),
        }
    }
}

/// Desired-state resource graph for one stack
#[derive(Debug, Clone)]
pub struct StackGraph {
    /// Stack name
    pub stack: String,
    images: Vec<ImageSpec>,
    network: NetworkSpec,
    containers: Vec<ContainerSpec>,
    outputs: BTreeMap<String, Output>,
}

impl StackGraph {
    /// Create an empty graph for a stack
    pub fn new(stack: &str, network: NetworkSpec) -> Self {
        Self {
            stack: stack.to_string(),
            images: Vec::new(),
            network,
            containers: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Declare an image
    pub fn add_image(&mut self, image: ImageSpec) {
        self.images.push(image);
    }

    /// Declare a container
    pub fn add_container(&mut self, container: ContainerSpec) {
        self.containers.push(container);
    }

    /// Declare a named output
    pub fn set_output(&mut self, name: &str, output: Output) {
        self.outputs.insert(name.to_string(), output);
    }

    /// Declared images
    pub fn images(&self) -> &[ImageSpec] {
        &self.images
    }

    /// The stack network
    pub fn network(&self) -> &NetworkSpec {
        &self.network
    }

    /// Declared containers
    pub fn containers(&self) -> &[ContainerSpec] {
        &self.containers
    }

    /// Look up a container by name
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Look up an image by logical name
    pub fn image(&self, name: &str) -> Option<&ImageSpec> {
        self.images.iter().find(|i| i.name() == name)
    }

    /// Declared outputs
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(name, out)| (name.as_str(), out))
    }

    /// Look up an output by name
    pub fn output(&self, name: &str) -> Result<&Output> {
        self.outputs
            .get(name)
            .ok_or_else(|| CaravelError::UnknownOutput(name.to_string()))
    }

    /// Validate the graph: unique container names, known image references,
    /// known dependencies
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for container in &self.containers {
            if !names.insert(container.name.as_str()) {
                return Err(CaravelError::DuplicateContainer(container.name.clone()));
            }
        }

        for container in &self.containers {
            if self.image(&container.image).is_none() {
                return Err(CaravelError::ImageNotFound(container.image.clone()));
            }

            for dependency in &container.depends_on {
                if !names.contains(dependency.as_str()) {
                    return Err(CaravelError::UnknownDependency {
                        container: container.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Container start order based on declared dependencies
    pub fn start_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for container in &self.containers {
            self.topological_sort(&container.name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    /// Topological sort for dependency resolution
    fn topological_sort(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(name) {
            return Ok(());
        }

        if visiting.contains(name) {
            return Err(CaravelError::CircularDependency(name.to_string()));
        }

        visiting.insert(name.to_string());

        if let Some(container) = self.container(name) {
            for dependency in &container.depends_on {
                self.topological_sort(dependency, visited, visiting, order)?;
            }
        }

        visiting.remove(name);
        visited.insert(name.to_string());
        order.push(name.to_string());

        Ok(())
    }

    /// Render the plan with all secret values masked
    pub fn render(&self) -> Result<String> {
        let order = self.start_order()?;
        let mut out = String::new();

        writeln!(out, "Stack: {}", self.stack).ok();

        writeln!(out, "Images:").ok();
        for image in &self.images {
            match image {
                ImageSpec::Build(build) => {
                    writeln!(
                        out,
                        "  {} build {} -> {}",
                        build.name,
                        build.context.display(),
                        build.tag
                    )
                    .ok();
                }
                ImageSpec::Pull(pull) => {
                    let keep = if pull.keep_locally {
                        " (keep locally)"
                    } else {
                        ""
                    };
                    writeln!(out, "  {} pull {}{}", pull.name, pull.reference, keep).ok();
                }
            }
        }

        writeln!(out, "Network:").ok();
        writeln!(out, "  {} ({})", self.network.name, self.network.driver).ok();

        writeln!(out, "Containers (start order):").ok();
        for name in &order {
            let Some(container) = self.container(name) else {
                continue;
            };
            let kind = if container.must_run { "" } else { " [one-shot]" };
            writeln!(out, "  {} image={}{}", container.name, container.image, kind).ok();
            for alias in &container.network_aliases {
                writeln!(out, "    alias {}", alias).ok();
            }
            for env in &container.env {
                writeln!(out, "    env {}", env.render_masked()).ok();
            }
            for port in &container.ports {
                writeln!(
                    out,
                    "    port {}:{}/{}",
                    port.external, port.internal, port.protocol
                )
                .ok();
            }
            for mount in &container.mounts {
                writeln!(
                    out,
                    "    mount {} -> {}",
                    mount.source.display(),
                    mount.target
                )
                .ok();
            }
            if !container.command.is_empty() {
                let command: Vec<&str> =
                    container.command.iter().map(|arg| arg.masked()).collect();
                writeln!(out, "    command {}", command.join(" ")).ok();
            }
            for dependency in &container.depends_on {
                writeln!(out, "    depends on {}", dependency).ok();
            }
        }

        writeln!(out, "Outputs:").ok();
        for (name, output) in self.outputs() {
            writeln!(out, "  {} = {}", name, output.masked()).ok();
        }

        Ok(out)
    }
}
