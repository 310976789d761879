//! Command dispatch: wires settings, services and output together.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::CommandFactory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::services::TreeService;
use crate::cli::args::{Cli, Commands, ConfigCommands, KeyKind};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NodeKey, Tree, TreeNodeConvert};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::{InfraError, InfraResult};

/// Runs `$func::<K>(args..)` with `K` chosen by the `--key` flag.
macro_rules! with_key {
    ($kind:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $kind {
            KeyKind::Int => $func::<i64>($($arg),*),
            KeyKind::String => $func::<String>($($arg),*),
        }
    };
}

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    let project_dir = resolve_project_dir(cli)?;

    match command {
        Commands::Build { file, output } => {
            let service = create_service(&project_dir)?;
            with_key!(cli.key, cmd_build(&service, file, output.as_deref()))
        }
        Commands::Flatten { file, output } => {
            let service = create_service(&project_dir)?;
            with_key!(cli.key, cmd_flatten(&service, file, output.as_deref()))
        }
        Commands::Show { file, nested } => {
            let service = create_service(&project_dir)?;
            with_key!(cli.key, cmd_show(&service, file, *nested))
        }
        Commands::Check { file, nested } => {
            let service = create_service(&project_dir)?;
            with_key!(cli.key, cmd_check(&service, file, *nested))
        }
        Commands::Config { command } => cmd_config(command, &project_dir),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "catree", &mut io::stdout());
            Ok(())
        }
    }
}

fn resolve_project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) if !dir.is_dir() => Err(CliError::InvalidArgs(format!(
            "project directory does not exist: {}",
            dir.display()
        ))),
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("resolve current directory", e).into()),
    }
}

fn create_service(project_dir: &Path) -> CliResult<TreeService> {
    let settings = Settings::load(Some(project_dir))?;
    debug!("settings: {:?}", settings);
    Ok(TreeService::new(Arc::new(RealFileSystem), settings))
}

fn load_tree<K>(service: &TreeService, file: &Path, nested: bool) -> CliResult<Tree<K>>
where
    K: NodeKey + DeserializeOwned,
{
    let tree = if nested {
        service.load_nested(file)?
    } else {
        service.load_flat(file)?
    };
    Ok(tree)
}

#[instrument(skip(service))]
fn cmd_build<K>(service: &TreeService, file: &Path, target: Option<&Path>) -> CliResult<()>
where
    K: NodeKey + Serialize + DeserializeOwned,
{
    let tree = load_tree::<K>(service, file, false)?;
    let json = service.render_nested(&tree)?;
    emit(&json, target)?;
    Ok(())
}

#[instrument(skip(service))]
fn cmd_flatten<K>(service: &TreeService, file: &Path, target: Option<&Path>) -> CliResult<()>
where
    K: NodeKey + Serialize + DeserializeOwned,
{
    let tree = load_tree::<K>(service, file, true)?;
    let json = service.render_flat(&tree)?;
    emit(&json, target)?;
    Ok(())
}

#[instrument(skip(service))]
fn cmd_show<K>(service: &TreeService, file: &Path, nested: bool) -> CliResult<()>
where
    K: NodeKey + Serialize + DeserializeOwned,
{
    let tree = load_tree::<K>(service, file, nested)?;
    output::info(&tree.to_tree_string());
    Ok(())
}

#[instrument(skip(service))]
fn cmd_check<K>(service: &TreeService, file: &Path, nested: bool) -> CliResult<()>
where
    K: NodeKey + Serialize + DeserializeOwned,
{
    let tree = load_tree::<K>(service, file, nested)?;
    let summary = service.summary(&tree);
    output::success(&format!(
        "{}: {} nodes, depth {}",
        file.display(),
        summary.nodes,
        summary.depth
    ));
    output::header("Leaves");
    for leaf in summary.leaves {
        output::detail(&crate::domain::record::value_label(&leaf.into()));
    }
    Ok(())
}

fn cmd_config(command: &ConfigCommands, project_dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(project_dir))?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::action("global", "unavailable"),
            }
            output::action("local", &local_config_path(project_dir).display());
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("no config directory available on this system".into())
                })?
            } else {
                local_config_path(project_dir)
            };
            let fs = RealFileSystem;
            if fs.exists(&path) {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            write_file(&fs, &path, &Settings::template())?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}

fn emit(content: &str, target: Option<&Path>) -> InfraResult<()> {
    match target {
        Some(path) => {
            write_file(&RealFileSystem, path, content)?;
            output::action("Wrote", &path.display());
        }
        None => output::info(content),
    }
    Ok(())
}

fn write_file(fs: &dyn FileSystem, path: &Path, content: &str) -> InfraResult<()> {
    fs.ensure_parent(path)
        .and_then(|_| fs.write(path, content))
        .map_err(|e| InfraError::write(path, e))
}
