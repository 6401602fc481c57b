use std::{fs, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::{
    build::{BuildReport, Builder},
    config::Config,
    context::Context,
    plugins::{enabled_plugins, installed_plugins, PluginContext, PluginRegistry},
    sidebar::{SidebarConfig, SIDEBAR_FILE},
    theme::{ThemeColors, ThemeManager},
};

mod assets;
mod build;
mod changelog;
mod config;
mod context;
mod error;
mod frontmatter;
mod functions;
mod highlighter;
mod markdown;
mod minify;
mod page;
mod plugins;
mod scaffold;
mod server;
mod sidebar;
mod sitemap;
mod template;
mod theme;

#[derive(Parser, Debug)]
#[command(name = "readme")]
#[command(author, version, about = "Static documentation site generator", long_about = None)]
struct Args {
    /// Project directory
    #[arg(short = 'C', long = "project", default_value = ".", global = true)]
    project: PathBuf,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the site into dist/
    Build,
    /// Build, then serve dist/ with live plugins
    Start {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create a file; Markdown files are added to the sidebar
    CreateFile { name: String },
    /// Create a folder and a sidebar section for it
    CreateFolder { name: String },
    /// Create templates/<name> with a starter layout
    CreateTemplate { name: String },
    /// Generate a change log from GitHub commits
    Changelog {
        /// Write CHANGELOG.md instead of printing
        #[arg(long)]
        md: bool,
    },
    /// Install a plugin package into plugins/
    Install {
        plugin: String,
        #[arg(short, long)]
        force: bool,
    },
    /// List installed plugins
    Plugins,
    /// Manage themes
    Theme {
        #[command(subcommand)]
        command: ThemeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeCommand {
    /// List available themes
    List,
    /// Make a theme the active one
    Use { name: String },
    /// Create a theme from three colours (#rgb or #rrggbb)
    Create {
        name: String,
        primary: String,
        background: String,
        text: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_build(context: &Context) -> anyhow::Result<BuildReport> {
    let mut builder = Builder::new(context);
    let report = builder.run()?;

    if !report.failures.is_empty() {
        warn!("{} files could not be built", report.failures.len());
    }
    info!(
        "{} pages and {} assets written to {}",
        report.pages.len(),
        report.assets_copied,
        context.output_dir.display()
    );

    Ok(report)
}

async fn start(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    let names = enabled_plugins(&config.plugins, &config.project_dir);

    let context = Context::new(config);
    run_build(&context)?;

    let plugin_context = PluginContext {
        sidebar: SidebarConfig::load(&context.template_dir.join(SIDEBAR_FILE)),
    };
    let plugins = PluginRegistry::builtin().load(names.iter().map(String::as_str), &plugin_context);

    server::serve(context.output_dir.clone(), port, plugins).await
}

async fn write_changelog(config: &Config, write_file: bool) -> anyhow::Result<()> {
    let changes = changelog::fetch_changes(&config.github).await?;
    let markdown = changelog::render_changelog(&changes);

    if write_file {
        let path = config.project_dir.join(changelog::CHANGELOG_FILE);
        fs::write(&path, markdown).with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {}", path.display());
    } else {
        println!("{markdown}");
    }

    Ok(())
}

fn list_plugins(config: &Config) {
    let installed = installed_plugins(&config.project_dir);
    if installed.is_empty() {
        println!("no plugins installed");
    }

    for plugin in installed {
        match plugin.manifest {
            Ok(manifest) => println!(
                "{} {} - {} (provides {})",
                manifest.name, manifest.version, manifest.description, manifest.provides
            ),
            Err(e) => println!("{} (invalid: {:#})", plugin.dir_name, e),
        }
    }
}

fn theme_command(config: &Config, command: ThemeCommand) -> anyhow::Result<()> {
    let manager = ThemeManager::new(&config.project_dir);

    match command {
        ThemeCommand::List => {
            for theme in manager.discover()? {
                let active = config.theme.as_deref() == Some(theme.name.as_str());
                let marker = if active { "*" } else { " " };
                println!(
                    "{} {} {} - {}",
                    marker, theme.name, theme.version, theme.description
                );
            }
        }
        ThemeCommand::Use { name } => {
            let theme = manager.activate(&name)?;
            println!("now using theme {}", theme.name);
        }
        ThemeCommand::Create {
            name,
            primary,
            background,
            text,
        } => {
            let colors = ThemeColors::new(&primary, &background, &text)?;
            let theme = manager.create(&name, colors)?;
            println!("created theme {}", theme.name);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let project_dir = fs::canonicalize(&args.project)
        .with_context(|| format!("project directory {} not found", args.project.display()))?;
    let config = Config::load(project_dir)?;

    match args.command {
        Command::Build => {
            run_build(&Context::new(config))?;
        }
        Command::Start { port } => start(config, port).await?,
        Command::CreateFile { name } => {
            scaffold::create_file(&config.project_dir, &name)?;
        }
        Command::CreateFolder { name } => {
            scaffold::create_folder(&config.project_dir, &name)?;
        }
        Command::CreateTemplate { name } => {
            scaffold::create_template(&config.project_dir, &name)?;
        }
        Command::Changelog { md } => write_changelog(&config, md).await?,
        Command::Install { plugin, force } => {
            let installed = plugins::install::install(&config.project_dir, &plugin, force)?;
            println!("installed {} into {}", plugin, installed.path.display());
        }
        Command::Plugins => list_plugins(&config),
        Command::Theme { command } => theme_command(&config, command)?,
    }

    Ok(())
}
