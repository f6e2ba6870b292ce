//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use serde::Serialize;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::BuildPlan;
use crate::cli::args::{Cli, Commands, ConfigCommands, Format};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, project_config_path, Settings};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::util::path::display_relative;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `buildlayout --help`".to_string(),
        ));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }
    if let Commands::Config {
        command: ConfigCommands::Template,
    } = command
    {
        output::info(&Settings::template());
        return Ok(());
    }

    let project_dir = resolve_project_dir(cli)?;
    let settings = load_settings(cli, &project_dir)?;
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Plan { format } => cmd_plan(&container, &project_dir, *format),
        Commands::Order => cmd_order(&container, &project_dir),
        Commands::Prepare => cmd_prepare(&container, &project_dir),
        Commands::Clean { dry_run } => cmd_clean(&container, &project_dir, *dry_run),
        Commands::Deps => cmd_deps(&container, &project_dir),
        Commands::Config { command } => cmd_config(&container, &project_dir, command),
        Commands::Completion { .. } => Ok(()),
    }
}

fn resolve_project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| CliError::Infra(InfraError::io("determine current directory", e))),
    }
}

fn load_settings(cli: &Cli, project_dir: &Path) -> CliResult<Settings> {
    let settings = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(CliError::InvalidArgs(format!(
                "config file not found: {}",
                path.display()
            )))
        }
        Some(path) => Settings::load_file(path)?,
        None => Settings::load(Some(project_dir))?,
    };
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn configure(container: &ServiceContainer, project_dir: &Path) -> CliResult<BuildPlan> {
    Ok(container.layout.configure(project_dir, &container.settings)?)
}

#[instrument(skip(container))]
fn cmd_plan(container: &ServiceContainer, project_dir: &Path, format: Format) -> CliResult<()> {
    let plan = configure(container, project_dir)?;
    match format {
        Format::Text => print_plan(&plan),
        Format::Toml => {
            let text = toml::to_string_pretty(&PlanView::from(&plan)).map_err(|e| {
                CliError::Infra(InfraError::io(
                    "serialize plan",
                    io::Error::new(io::ErrorKind::InvalidData, e),
                ))
            })?;
            output::info(&text);
        }
    }
    Ok(())
}

fn print_plan(plan: &BuildPlan) {
    let base = &plan.project_dir;
    let tree = &plan.tree;

    output::header(&format!("Build layout: {}", base.display()));
    let leaves = tree.children().iter().map(|child| {
        let deps = child.evaluation_dependencies();
        let mut label = format!(
            "{} → {}",
            child.name(),
            display_relative(child.declared_output_dir(), base)
        );
        if !deps.is_empty() {
            label.push_str(&format!(
                " (after {})",
                deps.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        label
    });
    let root_label = format!(
        "{} → {}",
        tree.root().name(),
        display_relative(tree.root().declared_output_dir(), base)
    );
    output::info(&Tree::new(root_label).with_leaves(leaves));

    let edges = tree.evaluation_edges();
    if !edges.is_empty() {
        output::header("Evaluation order");
        for e in &edges {
            output::edge(&e.dependent, &e.required);
        }
    }

    output::header("Configuration waves");
    for (i, wave) in tree.configuration_waves().iter().enumerate() {
        output::wave(i, wave);
    }

    if let Some(task) = plan.clean() {
        output::action(&task.name, &format!("deletes {}", task.target.display()));
    }
}

#[instrument(skip(container))]
fn cmd_order(container: &ServiceContainer, project_dir: &Path) -> CliResult<()> {
    let plan = configure(container, project_dir)?;
    output::header("Configuration waves");
    for (i, wave) in plan.tree.configuration_waves().iter().enumerate() {
        output::wave(i, wave);
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_prepare(container: &ServiceContainer, project_dir: &Path) -> CliResult<()> {
    let plan = configure(container, project_dir)?;
    let created = container.layout.prepare_output_dirs(&plan)?;
    output::success(&format!("prepared {} output directories", created.len()));
    for dir in created {
        output::success_detail(&display_relative(&dir, &plan.project_dir));
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_clean(container: &ServiceContainer, project_dir: &Path, dry_run: bool) -> CliResult<()> {
    let plan = configure(container, project_dir)?;
    let task = plan.clean().ok_or_else(|| {
        CliError::Usage(format!("clean task '{}' is not registered", plan.clean_task))
    })?;

    let report = container.clean.run(task, &plan.project_dir, dry_run)?;
    let summary = format!(
        "{} ({} files, {} dirs, {} bytes)",
        report.target.display(),
        report.usage.files,
        report.usage.dirs,
        report.usage.bytes
    );
    if report.dry_run {
        output::action("would remove", &summary);
    } else if report.removed {
        output::success(&format!("removed {summary}"));
    } else {
        output::warning(&format!("nothing to clean at {}", report.target.display()));
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_deps(container: &ServiceContainer, project_dir: &Path) -> CliResult<()> {
    let plan = configure(container, project_dir)?;
    let script = &plan.buildscript;

    output::header("Plugin repositories");
    for repo in &script.plugin_repositories {
        output::detail(repo);
    }
    output::header("Plugins");
    for plugin in &script.plugins {
        output::detail(plugin);
    }
    output::header("Module repositories");
    for repo in &script.repositories {
        output::detail(repo);
    }
    Ok(())
}

fn cmd_config(container: &ServiceContainer, project_dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&container.settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let mark = |p: &Path| if container.fs.exists(p) { "exists" } else { "missing" };
            match global_config_path() {
                Some(p) => output::action("global", &format!("{} ({})", p.display(), mark(p.as_path()))),
                None => output::warning("no global config directory on this platform"),
            }
            let local = project_config_path(project_dir);
            output::action("project", &format!("{} ({})", local.display(), mark(local.as_path())));
        }
    }
    Ok(())
}

/// Serializable plan for `plan --format toml`.
#[derive(Debug, Serialize)]
pub struct PlanView {
    pub project_dir: PathBuf,
    pub output_root: PathBuf,
    pub waves: Vec<Vec<String>>,
    pub clean: Option<CleanView>,
    pub modules: Vec<ModuleView>,
}

#[derive(Debug, Serialize)]
pub struct CleanView {
    pub name: String,
    pub target: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ModuleView {
    pub name: String,
    pub default_output_dir: PathBuf,
    pub declared_output_dir: PathBuf,
    pub evaluation_dependencies: Vec<String>,
}

impl From<&BuildPlan> for PlanView {
    fn from(plan: &BuildPlan) -> Self {
        Self {
            project_dir: plan.project_dir.clone(),
            output_root: plan.output_root.clone(),
            waves: plan.tree.configuration_waves(),
            clean: plan.clean().map(|t| CleanView {
                name: t.name.clone(),
                target: t.target.clone(),
            }),
            modules: plan
                .tree
                .nodes()
                .map(|n| ModuleView {
                    name: n.name().to_string(),
                    default_output_dir: n.default_output_dir().to_path_buf(),
                    declared_output_dir: n.declared_output_dir().to_path_buf(),
                    evaluation_dependencies: n.evaluation_dependencies().iter().cloned().collect(),
                })
                .collect(),
        }
    }
}
