//! Toolchains turn a work item into concrete stage commands.
//!
//! The pipeline owns sequencing, classification, output capture and the
//! fetch deadline. A toolchain only decides *what* to run for each stage.

use impact_core::{Stage, WorkItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::stage::StageCommand;

/// Inputs available when building a stage command.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub item: &'a WorkItem,
    /// The item's private workspace directory.
    pub workspace: &'a Path,
    /// Absolute path of the candidate patch.
    pub patch_file: &'a Path,
    /// Library whose source tree receives the patch.
    pub package_under_test: &'a str,
}

/// Builds the subprocess for each pipeline stage.
pub trait Toolchain: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Acquire the consumer's source into the workspace.
    fn fetch(&self, ctx: &StageContext<'_>) -> StageCommand;

    /// Run the consumer's tests; `stage` is `PrePatchTest` or `PostPatchTest`.
    fn test(&self, ctx: &StageContext<'_>, stage: Stage) -> StageCommand;

    /// Apply the patch to the library's source inside the workspace.
    fn apply_patch(&self, ctx: &StageContext<'_>) -> StageCommand;

    /// Dispatch on `stage`.
    fn command_for(&self, stage: Stage, ctx: &StageContext<'_>) -> StageCommand {
        match stage {
            Stage::Fetch => self.fetch(ctx),
            Stage::PrePatchTest | Stage::PostPatchTest => self.test(ctx, stage),
            Stage::PatchApply => self.apply_patch(ctx),
        }
    }
}

/// GOPATH-based Go toolchain.
///
/// Each workspace is its own `GOPATH`, so `go get -t` places the consumer
/// and all of its dependencies (the library included) under
/// `<workspace>/src`, where the patch is applied.
#[derive(Debug, Clone, Default)]
pub struct GoToolchain;

impl GoToolchain {
    fn go(&self, stage: Stage, ctx: &StageContext<'_>, args: &[&str]) -> StageCommand {
        let mut argv = vec!["go".to_string()];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        argv.push(ctx.item.identifier.clone());

        StageCommand::new(stage, argv)
            .with_env("GOPATH", ctx.workspace.to_string_lossy())
            .with_env("GO111MODULE", "off")
            .in_dir(ctx.workspace)
    }
}

impl Toolchain for GoToolchain {
    fn name(&self) -> &str {
        "go"
    }

    fn fetch(&self, ctx: &StageContext<'_>) -> StageCommand {
        self.go(Stage::Fetch, ctx, &["get", "-t"])
    }

    fn test(&self, ctx: &StageContext<'_>, stage: Stage) -> StageCommand {
        self.go(stage, ctx, &["test", "-v"])
    }

    fn apply_patch(&self, ctx: &StageContext<'_>) -> StageCommand {
        let target = ctx.workspace.join("src").join(ctx.package_under_test);
        StageCommand::new(
            Stage::PatchApply,
            vec![
                "patch".to_string(),
                "-p1".to_string(),
                "-d".to_string(),
                target.to_string_lossy().into_owned(),
                "-i".to_string(),
                ctx.patch_file.to_string_lossy().into_owned(),
            ],
        )
        .in_dir(ctx.workspace)
    }
}

/// An argv template with placeholder substitution.
///
/// Recognised placeholders: `{identifier}`, `{index}`, `{workspace}`,
/// `{patch}`, `{package}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandTemplate {
    pub fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|c| (*c).to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    fn render(&self, stage: Stage, ctx: &StageContext<'_>) -> StageCommand {
        let argv = self.command.iter().map(|arg| expand(arg, ctx)).collect();
        self.env
            .iter()
            .fold(StageCommand::new(stage, argv), |cmd, (k, v)| {
                cmd.with_env(k.clone(), expand(v, ctx))
            })
            .in_dir(ctx.workspace)
    }
}

fn expand(template: &str, ctx: &StageContext<'_>) -> String {
    template
        .replace("{identifier}", &ctx.item.identifier)
        .replace("{index}", &ctx.item.index.to_string())
        .replace("{workspace}", &ctx.workspace.to_string_lossy())
        .replace("{patch}", &ctx.patch_file.to_string_lossy())
        .replace("{package}", ctx.package_under_test)
}

/// Toolchain described by command templates, loadable from JSON.
///
/// ```json
/// {
///   "fetch": { "command": ["git", "clone", "https://{identifier}", "src"] },
///   "test":  { "command": ["make", "-C", "src", "test"] },
///   "patch": { "command": ["git", "-C", "src/{package}", "apply", "{patch}"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateToolchain {
    pub fetch: CommandTemplate,
    pub test: CommandTemplate,
    /// Post-patch test command; defaults to `test`.
    #[serde(default)]
    pub post_test: Option<CommandTemplate>,
    pub patch: CommandTemplate,
}

impl TemplateToolchain {
    pub fn new(fetch: CommandTemplate, test: CommandTemplate, patch: CommandTemplate) -> Self {
        Self {
            fetch,
            test,
            post_test: None,
            patch,
        }
    }

    pub fn with_post_test(mut self, post_test: CommandTemplate) -> Self {
        self.post_test = Some(post_test);
        self
    }

    /// Parse and validate a JSON toolchain description.
    pub fn from_json(json: &str) -> Result<Self> {
        let toolchain: TemplateToolchain = serde_json::from_str(json)?;
        toolchain.validate()?;
        Ok(toolchain)
    }

    /// Load a JSON toolchain description from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ToolchainFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let mut templates = vec![("fetch", &self.fetch), ("test", &self.test), ("patch", &self.patch)];
        if let Some(post) = &self.post_test {
            templates.push(("post_test", post));
        }
        for (name, template) in templates {
            if template.command.is_empty() {
                return Err(EngineError::InvalidToolchain(format!(
                    "{name} command is empty"
                )));
            }
        }
        Ok(())
    }
}

impl Toolchain for TemplateToolchain {
    fn name(&self) -> &str {
        "template"
    }

    fn fetch(&self, ctx: &StageContext<'_>) -> StageCommand {
        self.fetch.render(Stage::Fetch, ctx)
    }

    fn test(&self, ctx: &StageContext<'_>, stage: Stage) -> StageCommand {
        let template = match (stage, &self.post_test) {
            (Stage::PostPatchTest, Some(post)) => post,
            _ => &self.test,
        };
        template.render(stage, ctx)
    }

    fn apply_patch(&self, ctx: &StageContext<'_>) -> StageCommand {
        self.patch.render(Stage::PatchApply, ctx)
    }
}
