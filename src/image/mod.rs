//! Multi-architecture image builds
//!
//! All platforms are built by a single `docker buildx build` invocation that
//! imports and exports a registry layer cache. When pushing, the manifest
//! list is published by that same invocation, so a failure on any platform
//! publishes nothing.

use crate::config::schema::ImageConfig;
use crate::config::Paths;
use crate::error::{RiggerError, RiggerResult};
use crate::exec::{CommandRunner, CommandSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry cache shared by every platform of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRef {
    /// Image reference used for both `--cache-from` and `--cache-to`
    pub reference: String,
    /// Target platforms, e.g. `linux/amd64`
    pub platforms: Vec<String>,
}

impl CacheRef {
    pub fn new(reference: impl Into<String>, platforms: Vec<String>) -> Self {
        Self {
            reference: reference.into(),
            platforms,
        }
    }

    /// Cache for `image`: the configured reference, or `<repository>:buildcache`
    pub fn for_image(image: &str, configured: Option<&str>, platforms: Vec<String>) -> Self {
        let reference = match configured {
            Some(r) => r.to_string(),
            None => format!("{}:buildcache", repository(image)),
        };
        Self::new(reference, platforms)
    }
}

/// Result of a publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed(String),
    /// The reference was already published and was left untouched
    AlreadyExists(String),
}

/// Strip the tag and digest from an image reference
pub fn repository(image: &str) -> &str {
    let without_digest = image.split('@').next().unwrap_or(image);
    let name_start = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
    match without_digest[name_start..].rfind(':') {
        Some(colon) => &without_digest[..name_start + colon],
        None => without_digest,
    }
}

/// Replace the tag of an image reference
pub fn with_tag(image: &str, tag: &str) -> String {
    format!("{}:{}", repository(image), tag)
}

/// Builds and publishes images through `docker buildx`
pub struct ImageBuilder {
    runner: Arc<dyn CommandRunner>,
    tool: String,
    builder: String,
    dockerfile: PathBuf,
    context: PathBuf,
    build_args: BTreeMap<String, String>,
    root: PathBuf,
}

impl ImageBuilder {
    pub fn new(config: &ImageConfig, paths: &Paths, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            tool: config.tool.clone(),
            builder: config.builder.clone(),
            dockerfile: config.dockerfile.clone(),
            context: config.context.clone(),
            build_args: config.build_args.clone(),
            root: paths.root.clone(),
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.tool).current_dir(&self.root)
    }

    /// Create the buildx builder instance if it does not exist
    pub async fn ensure_builder(&self) -> RiggerResult<()> {
        let inspect = self
            .command()
            .args(["buildx", "inspect", self.builder.as_str()])
            .captured();
        if self.runner.run(&inspect).await?.is_success() {
            debug!("buildx builder {} exists", self.builder);
            return Ok(());
        }

        info!("Creating buildx builder {}", self.builder);
        let create = self
            .command()
            .args(["buildx", "create", "--name", self.builder.as_str(), "--use"])
            .captured();
        let output = self.runner.run(&create).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(RiggerError::command_exec(create.display(), output.error_tail()))
        }
    }

    /// Build `image` for every platform of `cache` in one invocation.
    ///
    /// The layer cache is imported and exported whether or not `push` is set.
    /// Without `push` the result is validated only.
    pub async fn build(&self, image: &str, cache: &CacheRef, push: bool) -> RiggerResult<()> {
        if cache.platforms.is_empty() {
            return Err(RiggerError::User(
                "No target platforms configured (image.platforms or PLATFORMS)".to_string(),
            ));
        }

        self.ensure_builder().await?;

        let spec = self.build_command(image, cache, push);
        info!(
            "Building {} for {}{}",
            image,
            cache.platforms.join(","),
            if push { " (push)" } else { "" }
        );

        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            return Err(RiggerError::Build {
                image: image.to_string(),
                code: output.code,
            });
        }
        Ok(())
    }

    fn build_command(&self, image: &str, cache: &CacheRef, push: bool) -> CommandSpec {
        let mut spec = self.command().args([
            "buildx".to_string(),
            "build".to_string(),
            "--builder".to_string(),
            self.builder.clone(),
            "--platform".to_string(),
            cache.platforms.join(","),
            "--cache-from".to_string(),
            format!("type=registry,ref={}", cache.reference),
            "--cache-to".to_string(),
            format!("type=registry,ref={},mode=max", cache.reference),
            "--file".to_string(),
            self.dockerfile.to_string_lossy().to_string(),
            "--tag".to_string(),
            image.to_string(),
        ]);

        for (key, value) in &self.build_args {
            spec = spec.arg("--build-arg").arg(format!("{}={}", key, value));
        }

        if push {
            spec = spec.arg("--push");
        }

        spec.arg(self.context.to_string_lossy())
    }

    /// Whether `reference` is already published.
    ///
    /// Only a registry answer of "not found" counts as unpublished; any other
    /// failure (auth, network) is an error.
    pub async fn inspect(&self, reference: &str) -> RiggerResult<bool> {
        let spec = self
            .command()
            .args(["buildx", "imagetools", "inspect", reference])
            .captured();
        let output = self.runner.run(&spec).await?;

        if output.is_success() {
            return Ok(true);
        }

        let stderr = output.stderr.to_lowercase();
        if stderr.contains("not found") || stderr.contains("manifest unknown") {
            debug!("{} is not published", reference);
            return Ok(false);
        }
        Err(RiggerError::command_exec(spec.display(), output.error_tail()))
    }

    /// Build and push, unless the reference is already published
    pub async fn publish(&self, image: &str, cache: &CacheRef) -> RiggerResult<PushOutcome> {
        if self.inspect(image).await? {
            warn!("{} is already published; not overwriting", image);
            return Ok(PushOutcome::AlreadyExists(image.to_string()));
        }
        self.build(image, cache, true).await?;
        Ok(PushOutcome::Pushed(image.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::schema::PathsConfig;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    /// Runner that behaves like a registry: pushed tags become inspectable.
    /// Builds fail when any platform is listed in `broken`.
    pub(crate) fn registry(broken: &'static [&'static str]) -> (ScriptedRunner, Arc<Mutex<HashSet<String>>>) {
        let published = Arc::new(Mutex::new(HashSet::new()));
        let store = published.clone();
        let seen = published.clone();

        let runner = ScriptedRunner::new()
            .on(move |spec| {
                if spec.args.get(1).map(String::as_str) != Some("build") {
                    return None;
                }
                let platforms = flag_value(&spec.args, "--platform")?;
                if platforms.split(',').any(|p| broken.iter().any(|b| *b == p)) {
                    return Some(CommandOutput::failure(1, "exec format error"));
                }
                if spec.args.iter().any(|a| a == "--push") {
                    let tag = flag_value(&spec.args, "--tag")?;
                    store.lock().unwrap().insert(tag.to_string());
                }
                Some(CommandOutput::success())
            })
            .on(move |spec| {
                if spec.args.get(1).map(String::as_str) != Some("imagetools") {
                    return None;
                }
                let reference = spec.args.last()?;
                if seen.lock().unwrap().contains(reference) {
                    Some(CommandOutput::success())
                } else {
                    Some(CommandOutput::failure(1, "ERROR: not found"))
                }
            });

        (runner, published)
    }

    fn builder(runner: Arc<ScriptedRunner>) -> ImageBuilder {
        let paths = Paths::resolve(Path::new("/work/op"), &PathsConfig::default());
        ImageBuilder::new(&ImageConfig::default(), &paths, runner)
    }

    fn multi_arch() -> Vec<String> {
        vec!["linux/amd64".to_string(), "linux/arm64".to_string()]
    }

    #[test]
    fn repository_strips_tag_and_digest() {
        assert_eq!(repository("ghcr.io/acme/op:1.2.3"), "ghcr.io/acme/op");
        assert_eq!(repository("localhost:5000/op"), "localhost:5000/op");
        assert_eq!(repository("localhost:5000/op:dev"), "localhost:5000/op");
        assert_eq!(repository("op@sha256:abc"), "op");
        assert_eq!(with_tag("ghcr.io/acme/op:latest", "1.2.3"), "ghcr.io/acme/op:1.2.3");
    }

    #[test]
    fn default_cache_ref() {
        let cache = CacheRef::for_image("ghcr.io/acme/op:latest", None, multi_arch());
        assert_eq!(cache.reference, "ghcr.io/acme/op:buildcache");

        let cache = CacheRef::for_image("op:latest", Some("reg.example/cache:op"), multi_arch());
        assert_eq!(cache.reference, "reg.example/cache:op");
    }

    #[tokio::test]
    async fn single_invocation_with_cache_for_all_platforms() {
        let runner = Arc::new(ScriptedRunner::new());
        let cache = CacheRef::new("ghcr.io/acme/op:buildcache", multi_arch());

        builder(runner.clone())
            .build("ghcr.io/acme/op:dev", &cache, false)
            .await
            .unwrap();

        let builds: Vec<CommandSpec> = runner
            .calls()
            .into_iter()
            .filter(|c| c.args.get(1).map(String::as_str) == Some("build"))
            .collect();
        assert_eq!(builds.len(), 1);
        let args = &builds[0].args;
        assert_eq!(flag_value(args, "--platform"), Some("linux/amd64,linux/arm64"));
        assert_eq!(
            flag_value(args, "--cache-from"),
            Some("type=registry,ref=ghcr.io/acme/op:buildcache")
        );
        assert_eq!(
            flag_value(args, "--cache-to"),
            Some("type=registry,ref=ghcr.io/acme/op:buildcache,mode=max")
        );
        assert!(!args.contains(&"--push".to_string()));
        assert_eq!(args.last().unwrap(), ".");
    }

    #[tokio::test]
    async fn creates_builder_when_missing() {
        let runner = Arc::new(ScriptedRunner::new().fail_when("buildx inspect", 1));
        let cache = CacheRef::new("op:buildcache", multi_arch());

        builder(runner.clone()).build("op:dev", &cache, false).await.unwrap();

        assert_eq!(runner.count_matching("buildx create --name rigger-builder"), 1);
    }

    #[tokio::test]
    async fn inspect_true_only_after_push() {
        let (runner, _) = registry(&[]);
        let runner = Arc::new(runner);
        let images = builder(runner.clone());
        let cache = CacheRef::new("op:buildcache", multi_arch());

        assert!(!images.inspect("op:1.0.0").await.unwrap());

        images.build("op:1.0.0", &cache, false).await.unwrap();
        assert!(!images.inspect("op:1.0.0").await.unwrap());

        images.build("op:1.0.0", &cache, true).await.unwrap();
        assert!(images.inspect("op:1.0.0").await.unwrap());
        assert!(!images.inspect("op:1.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn failing_platform_publishes_nothing() {
        let (runner, published) = registry(&["linux/arm64"]);
        let runner = Arc::new(runner);
        let images = builder(runner.clone());
        let cache = CacheRef::new("op:buildcache", multi_arch());

        let err = images.build("op:1.0.0", &cache, true).await.unwrap_err();

        assert!(matches!(err, RiggerError::Build { code: Some(1), .. }));
        assert!(published.lock().unwrap().is_empty());
        assert!(!images.inspect("op:1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn publish_refuses_to_overwrite() {
        let (runner, _) = registry(&[]);
        let runner = Arc::new(runner);
        let images = builder(runner.clone());
        let cache = CacheRef::new("op:buildcache", multi_arch());

        let first = images.publish("op:1.0.0", &cache).await.unwrap();
        let second = images.publish("op:1.0.0", &cache).await.unwrap();

        assert_eq!(first, PushOutcome::Pushed("op:1.0.0".into()));
        assert_eq!(second, PushOutcome::AlreadyExists("op:1.0.0".into()));
        assert_eq!(runner.count_matching("buildx build"), 1);
    }

    #[tokio::test]
    async fn unreachable_registry_blocks_publish() {
        let runner = Arc::new(ScriptedRunner::new().on(|spec| {
            (spec.args.get(1).map(String::as_str) == Some("imagetools"))
                .then(|| CommandOutput::failure(1, "ERROR: unauthorized: authentication required"))
        }));
        let images = builder(runner.clone());
        let cache = CacheRef::new("op:buildcache", multi_arch());

        let err = images.publish("op:1.0.0", &cache).await.unwrap_err();

        assert!(matches!(err, RiggerError::CommandExecution { ref stderr, .. } if stderr.contains("unauthorized")));
        assert_eq!(runner.count_matching("buildx build"), 0);
    }

    #[tokio::test]
    async fn manifest_unknown_means_unpublished() {
        let runner = Arc::new(ScriptedRunner::new().on(|spec| {
            (spec.args.get(1).map(String::as_str) == Some("imagetools"))
                .then(|| CommandOutput::failure(1, "MANIFEST_UNKNOWN: manifest unknown"))
        }));
        assert!(!builder(runner).inspect("op:1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn empty_platforms_rejected() {
        let runner = Arc::new(ScriptedRunner::new());
        let cache = CacheRef::new("op:buildcache", vec![]);
        assert!(builder(runner.clone()).build("op:dev", &cache, false).await.is_err());
        assert!(runner.calls().is_empty());
    }
}
