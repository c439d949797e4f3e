//! Applying and destroying stacks through the engine
//!
//! Apply is a single ordered pass: ensure images, ensure the network,
//! then create containers in dependency order. Re-applying converges
//! because containers are replaced by name. Secret values are revealed
//! only while assembling the engine's process arguments.

use super::runtime::{self, EngineRuntime};
use crate::error::{CaravelError, Result};
use crate::resource::{BindMount, ContainerSpec, ImageSpec, NetworkSpec, Protocol, StackGraph};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Write as _;
use uuid::Uuid;

/// Action the engine took for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Image built from a local context
    Built,
    /// Image pulled from a registry
    Pulled,
    /// Resource created
    Created,
    /// Resource already in the desired state
    Unchanged,
    /// Resource removed
    Removed,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Built => write!(f, "built"),
            Action::Pulled => write!(f, "pulled"),
            Action::Created => write!(f, "created"),
            Action::Unchanged => write!(f, "unchanged"),
            Action::Removed => write!(f, "removed"),
        }
    }
}

/// One reconciliation step
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// Resource label, e.g. `container/mongo-dev`
    pub resource: String,
    /// What the engine did
    pub action: Action,
    /// When the step finished
    pub at: DateTime<Utc>,
}

/// Record of one apply or destroy run
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Run identifier
    pub run_id: Uuid,
    /// Stack the run targeted
    pub stack: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Steps taken, in order
    pub entries: Vec<ReportEntry>,
}

impl ApplyReport {
    fn new(stack: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stack: stack.to_string(),
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    fn record(&mut self, resource: impl Into<String>, action: Action) {
        self.entries.push(ReportEntry {
            resource: resource.into(),
            action,
            at: Utc::now(),
        });
    }

    /// Human-readable summary of the run
    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Run {} (stack {})", self.run_id, self.stack).ok();
        for entry in &self.entries {
            writeln!(out, "  {:<9} {}", entry.action.to_string(), entry.resource).ok();
        }
        out
    }
}

/// Handle to the local container engine
pub struct Engine {
    runtime: EngineRuntime,
}

impl Engine {
    /// Detect an engine and wrap it
    pub fn new() -> Result<Self> {
        Ok(Self {
            runtime: runtime::detect()?,
        })
    }

    /// Use a specific runtime
    pub fn with_runtime(runtime: EngineRuntime) -> Self {
        Self { runtime }
    }

    /// Apply the graph: images, network, then containers in start order
    pub async fn apply(&self, graph: &StackGraph) -> Result<ApplyReport> {
        graph.validate()?;
        let order = graph.start_order()?;
        let mut report = ApplyReport::new(&graph.stack);

        // Logical image name -> reference containers will run
        let mut image_refs: HashMap<String, String> = HashMap::new();
        for image in graph.images() {
            let resolved = self.ensure_image(image, &mut report).await?;
            image_refs.insert(image.name().to_string(), resolved);
        }

        self.ensure_network(graph.network(), &mut report).await?;

        for name in &order {
            let spec = graph
                .container(name)
                .ok_or_else(|| CaravelError::ContainerNotFound(name.clone()))?;
            let image_ref = image_refs
                .get(&spec.image)
                .ok_or_else(|| CaravelError::ImageNotFound(spec.image.clone()))?;
            self.run_container(spec, image_ref, &graph.network().name)
                .await?;
            report.record(format!("container/{}", spec.name), Action::Created);
        }

        Ok(report)
    }

    /// Tear the stack down: containers in reverse start order, then the
    /// network, then pulled images not marked keep-locally
    pub async fn destroy(&self, graph: &StackGraph) -> Result<ApplyReport> {
        let order = graph.start_order()?;
        let mut report = ApplyReport::new(&graph.stack);

        for name in order.iter().rev() {
            tracing::info!("removing container {}", name);
            if self.run_quiet(["rm", "-f", name.as_str()]).await {
                report.record(format!("container/{}", name), Action::Removed);
            }
        }

        let network = &graph.network().name;
        if self.run_quiet(["network", "rm", network.as_str()]).await {
            report.record(format!("network/{}", network), Action::Removed);
        }

        for image in graph.images() {
            if let ImageSpec::Pull(pull) = image {
                if !pull.keep_locally && self.run_quiet(["rmi", pull.reference.as_str()]).await {
                    report.record(format!("image/{}", pull.name), Action::Removed);
                }
            }
        }

        Ok(report)
    }

    /// Make an image available and return the reference containers run
    async fn ensure_image(&self, image: &ImageSpec, report: &mut ApplyReport) -> Result<String> {
        match image {
            ImageSpec::Build(build) => {
                if !build.context.is_dir() {
                    return Err(CaravelError::BuildContextMissing(
                        build.context.display().to_string(),
                    ));
                }
                tracing::info!("building image {}", build.tag);
                let context = build.context.to_string_lossy().into_owned();
                self.run_checked(
                    vec![
                        "build".to_string(),
                        "-t".to_string(),
                        build.tag.clone(),
                        context,
                    ],
                    &format!("build {}", build.tag),
                )
                .await?;
                report.record(format!("image/{}", build.name), Action::Built);
                Ok(build.tag.clone())
            }
            ImageSpec::Pull(pull) => {
                if self
                    .run_quiet(["image", "inspect", pull.reference.as_str()])
                    .await
                {
                    report.record(format!("image/{}", pull.name), Action::Unchanged);
                } else {
                    tracing::info!("pulling image {}", pull.reference);
                    self.run_checked(
                        ["pull", pull.reference.as_str()],
                        &format!("pull {}", pull.reference),
                    )
                    .await?;
                    report.record(format!("image/{}", pull.name), Action::Pulled);
                }

                // Pin by repo digest when the engine reports one
                Ok(self
                    .repo_digest(&pull.reference)
                    .await
                    .unwrap_or_else(|| pull.reference.clone()))
            }
        }
    }

    async fn repo_digest(&self, reference: &str) -> Option<String> {
        let stdout = self
            .run_checked(
                ["image", "inspect", reference],
                &format!("inspect {}", reference),
            )
            .await
            .ok()?;
        let parsed: serde_json::Value = serde_json::from_str(&stdout).ok()?;
        parsed
            .get(0)?
            .get("RepoDigests")?
            .get(0)?
            .as_str()
            .map(str::to_string)
    }

    async fn ensure_network(&self, network: &NetworkSpec, report: &mut ApplyReport) -> Result<()> {
        if self
            .run_quiet(["network", "inspect", network.name.as_str()])
            .await
        {
            report.record(format!("network/{}", network.name), Action::Unchanged);
            return Ok(());
        }

        tracing::info!("creating network {}", network.name);
        self.run_checked(
            vec![
                "network".to_string(),
                "create".to_string(),
                "--driver".to_string(),
                network.driver.to_string(),
                network.name.clone(),
            ],
            &format!("network create {}", network.name),
        )
        .await?;
        report.record(format!("network/{}", network.name), Action::Created);
        Ok(())
    }

    async fn run_container(
        &self,
        spec: &ContainerSpec,
        image_ref: &str,
        network: &str,
    ) -> Result<()> {
        for mount in &spec.mounts {
            validate_bind_source(mount)?;
        }

        // Replace any previous container of the same name
        self.run_quiet(["rm", "-f", spec.name.as_str()]).await;

        tracing::info!("creating container {}", spec.name);
        self.run_checked(run_args(spec, image_ref, network), &format!("run {}", spec.name))
            .await?;
        Ok(())
    }

    /// Run an engine command, failing on a non-zero exit. `operation` is
    /// the label used in errors; raw arguments are never echoed because
    /// they can carry revealed secrets.
    async fn run_checked<I, S>(&self, args: I, operation: &str) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = tokio::process::Command::new(self.runtime.command())
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CaravelError::Engine {
                operation: operation.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an engine command where failure is part of normal flow
    async fn run_quiet<I, S>(&self, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        tokio::process::Command::new(self.runtime.command())
            .args(args)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

/// Assemble the `run` invocation for a container. The only place secret
/// env values and commands are revealed.
fn run_args(spec: &ContainerSpec, image_ref: &str, network: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--network".to_string(),
        network.to_string(),
    ];

    for alias in &spec.network_aliases {
        args.push("--network-alias".to_string());
        args.push(alias.clone());
    }

    for env in &spec.env {
        args.push("-e".to_string());
        args.push(env.render_revealed());
    }

    for port in &spec.ports {
        args.push("-p".to_string());
        match port.protocol {
            Protocol::Tcp => args.push(format!("{}:{}", port.external, port.internal)),
            Protocol::Udp => args.push(format!("{}:{}/udp", port.external, port.internal)),
        }
    }

    for mount in &spec.mounts {
        args.push("--mount".to_string());
        let mut value = format!(
            "type=bind,source={},target={}",
            mount.source.display(),
            mount.target
        );
        if mount.read_only {
            value.push_str(",readonly");
        }
        args.push(value);
    }

    args.push(image_ref.to_string());

    for arg in &spec.command {
        args.push(arg.revealed().to_string());
    }

    args
}

/// Check a bind-mount source before handing it to the engine. JSON seed
/// files must parse as an array, matching what `mongoimport --jsonArray`
/// expects.
fn validate_bind_source(mount: &BindMount) -> Result<()> {
    if !mount.source.exists() {
        return Err(CaravelError::SeedData(format!(
            "mount source not found: {}",
            mount.source.display()
        )));
    }

    if mount.source.extension().is_some_and(|ext| ext == "json") {
        let content = std::fs::read_to_string(&mount.source)?;
        let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            CaravelError::SeedData(format!("{}: {}", mount.source.display(), e))
        })?;
        if !value.is_array() {
            return Err(CaravelError::SeedData(format!(
                "{}: expected a JSON array",
                mount.source.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::resource::ContainerSpec;
    use std::io::Write;

    fn sample_spec() -> ContainerSpec {
        ContainerSpec::new("mongo-dev", "mongo")
            .alias("mongo")
            .env("MONGO_INITDB_ROOT_USERNAME", "admin")
            .env("MONGO_INITDB_ROOT_PASSWORD", Secret::new("hunter2"))
            .port(3001, 3000)
    }

    #[test]
    fn test_run_args_reveals_secrets_at_the_boundary() {
        let args = run_args(&sample_spec(), "mongo:bionic", "services-dev");

        assert!(args.contains(&"MONGO_INITDB_ROOT_PASSWORD=hunter2".to_string()));
        assert!(!args.contains(&"MONGO_INITDB_ROOT_PASSWORD=[secret]".to_string()));
    }

    #[test]
    fn test_run_args_shape() {
        let args = run_args(&sample_spec(), "mongo:bionic", "services-dev");

        assert_eq!(args[0], "run");
        assert_eq!(args[1], "-d");
        assert!(args.windows(2).any(|w| w[0] == "--name" && w[1] == "mongo-dev"));
        assert!(args.windows(2).any(|w| w[0] == "--network" && w[1] == "services-dev"));
        assert!(args.windows(2).any(|w| w[0] == "--network-alias" && w[1] == "mongo"));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "3000:3001"));
        assert_eq!(args.last().unwrap(), "mongo:bionic");
    }

    #[test]
    fn test_run_args_command_follows_image() {
        let spec = ContainerSpec::new("seed", "mongo").command(vec![
            "sh".into(),
            "-c".into(),
            Secret::new("mongoimport -p hunter2").into(),
        ]);
        let args = run_args(&spec, "mongo:bionic", "net");

        let image_pos = args.iter().position(|a| a == "mongo:bionic").unwrap();
        assert_eq!(args[image_pos + 1], "sh");
        assert_eq!(args[image_pos + 2], "-c");
        assert_eq!(args[image_pos + 3], "mongoimport -p hunter2");
    }

    #[test]
    fn test_run_args_mount_format() {
        let spec = ContainerSpec::new("seed", "mongo")
            .mount("/project/app/data/products.json".into(), "/home/products.json");
        let args = run_args(&spec, "mongo:bionic", "net");

        assert!(args.contains(
            &"type=bind,source=/project/app/data/products.json,target=/home/products.json"
                .to_string()
        ));
    }

    #[test]
    fn test_validate_bind_source_missing() {
        let mount = BindMount {
            source: "/nonexistent/products.json".into(),
            target: "/home/products.json".to_string(),
            read_only: false,
        };
        assert!(matches!(
            validate_bind_source(&mount),
            Err(CaravelError::SeedData(_))
        ));
    }

    #[test]
    fn test_validate_bind_source_requires_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{\"not\": \"an array\"}}").unwrap();

        let mount = BindMount {
            source: path.clone(),
            target: "/home/products.json".to_string(),
            read_only: false,
        };
        assert!(matches!(
            validate_bind_source(&mount),
            Err(CaravelError::SeedData(_))
        ));

        std::fs::write(&path, "[{\"name\": \"widget\", \"price\": 9.99}]").unwrap();
        assert!(validate_bind_source(&mount).is_ok());
    }

    #[test]
    fn test_report_render() {
        let mut report = ApplyReport::new("dev");
        report.record("image/backend", Action::Built);
        report.record("container/mongo-dev", Action::Created);

        let rendered = report.render();
        assert!(rendered.contains("built"));
        assert!(rendered.contains("image/backend"));
        assert!(rendered.contains("created"));
        assert!(rendered.contains("container/mongo-dev"));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Built.to_string(), "built");
        assert_eq!(Action::Removed.to_string(), "removed");
    }
}
