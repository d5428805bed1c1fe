//! shoeviz - headless front end for the shoe viewer engine.
//!
//! - `resolve <model>` prints the configuration the viewer would use
//! - `paths <model>` probes every candidate asset location
//! - `render <model>` runs the full lifecycle and writes a PNG

use clap::{Parser, Subcommand};
use shoeviz::assets::{find_reachable_path, AssetTransport, Transport};
use shoeviz::color::{Colors, Rgb};
use shoeviz::config::{ConfigCache, ConfigClient, HttpConfigSource};
use shoeviz::design::load_design_from_file;
use shoeviz::render::{RenderSurface, SoftwareContext};
use shoeviz::settings::ViewerSettings;
use shoeviz::viewer::{ViewerController, ViewerServices, ViewerState};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine settings file (JSON)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Configuration service base URL (overrides settings and environment)
    #[arg(long, value_name = "URL")]
    config_url: Option<String>,

    /// Asset base URL or directory (overrides settings and environment)
    #[arg(long, value_name = "URL|DIR")]
    asset_base: Option<String>,

    /// Fall back to a generated configuration for unknown models
    #[arg(long)]
    generate_default: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved configuration for a model
    Resolve { model: String },
    /// Probe every candidate path of a model
    Paths { model: String },
    /// Load, recolor and render a model to a PNG file
    Render {
        model: String,
        #[arg(short, long, value_name = "FILE", default_value = "shoeviz.png")]
        out: PathBuf,
        /// Saved design to take colors from
        #[arg(long, value_name = "FILE")]
        design: Option<PathBuf>,
        #[arg(long, value_name = "HEX")]
        primary: Option<Rgb>,
        #[arg(long, value_name = "HEX")]
        secondary: Option<Rgb>,
        #[arg(long, value_name = "HEX")]
        accent: Option<Rgb>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
}

struct Runtime {
    settings: ViewerSettings,
    configs: Arc<ConfigClient<HttpConfigSource>>,
    transport: Arc<Transport>,
}

impl Runtime {
    fn new(cli: &Cli) -> Result<Self, String> {
        let mut settings =
            ViewerSettings::load(cli.settings.as_deref()).map_err(|err| err.to_string())?;
        if let Some(url) = &cli.config_url {
            settings.config_endpoint = Some(url.clone());
        }
        if let Some(base) = &cli.asset_base {
            settings.asset_base = base.clone();
        }
        if cli.generate_default {
            settings.generate_default_on_miss = true;
        }

        let source = HttpConfigSource::new(settings.config_endpoint.clone(), settings.probe_timeout())
            .map_err(|err| err.to_string())?;
        let configs = ConfigClient::new(source)
            .with_cache(Arc::new(ConfigCache::new(settings.cache_ttl())))
            .with_generated_default(settings.generate_default_on_miss);
        let transport = Transport::for_base(&settings.asset_base, settings.probe_timeout())
            .map_err(|err| err.to_string())?;
        Ok(Self {
            settings,
            configs: Arc::new(configs),
            transport: Arc::new(transport),
        })
    }
}

async fn resolve(runtime: &Runtime, model: &str) -> Result<(), String> {
    let resolved = runtime
        .configs
        .resolve_configuration(model)
        .await
        .map_err(|err| err.to_string())?;
    log::info!("Resolved '{}' from {:?}", model, resolved.origin);
    let json = serde_json::to_string_pretty(resolved.config.as_ref()).map_err(|err| err.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn paths(runtime: &Runtime, model: &str) -> Result<(), String> {
    let candidates = runtime
        .configs
        .resolve_candidate_paths(model)
        .await
        .map_err(|err| err.to_string())?;
    for candidate in &candidates {
        match runtime.transport.probe(candidate).await {
            Ok(()) => println!("  ok      {}", candidate),
            Err(err) => println!("  missing {} ({})", candidate, err),
        }
    }
    let found = find_reachable_path(runtime.transport.as_ref(), &candidates)
        .await
        .map_err(|err| err.to_string())?;
    println!("using {}", found);
    Ok(())
}

fn render_colors(
    design: Option<&Path>,
    primary: Option<Rgb>,
    secondary: Option<Rgb>,
    accent: Option<Rgb>,
) -> Result<Colors, String> {
    let mut colors = match design {
        Some(path) => {
            let design = load_design_from_file(path).map_err(|err| err.to_string())?;
            log::info!("Using colors of design '{}' ({})", design.name, design.model);
            design.colors
        }
        None => Colors::default(),
    };
    colors.primary = primary.unwrap_or(colors.primary);
    colors.secondary = secondary.unwrap_or(colors.secondary);
    colors.accent = accent.unwrap_or(colors.accent);
    Ok(colors)
}

async fn render(
    runtime: &Runtime,
    model: &str,
    out: &Path,
    colors: Colors,
    size: (u32, u32),
) -> Result<(), String> {
    let surface = RenderSurface::new(size.0, size.1);
    let services = ViewerServices {
        configs: runtime.configs.clone(),
        transport: runtime.transport.clone(),
    };
    let mut viewer = ViewerController::new(
        surface,
        SoftwareContext,
        services,
        runtime.settings.viewer_options(),
    )
    .map_err(|err| err.to_string())?;

    viewer.update_colors(colors).map_err(|err| err.to_string())?;
    viewer.mount(model);
    match viewer.run_until_settled().await {
        ViewerState::Loaded => {}
        ViewerState::Error(err) => return Err(err.to_string()),
        other => return Err(format!("viewer stopped in state {}", other)),
    }

    if let Some(report) = viewer.color_report() {
        for assignment in &report.assignments {
            println!(
                "  {:<24} {:<9} {}",
                assignment.part, assignment.role, assignment.color
            );
        }
        for warning in &report.warnings {
            println!("  warning: {}", warning);
        }
    }
    viewer.capture_png(out).map_err(|err| err.to_string())?;
    println!("wrote {}", out.display());
    viewer.dispose();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let runtime = match Runtime::new(&cli) {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::Resolve { model } => resolve(&runtime, model).await,
        Command::Paths { model } => paths(&runtime, model).await,
        Command::Render {
            model,
            out,
            design,
            primary,
            secondary,
            accent,
            width,
            height,
        } => match render_colors(design.as_deref(), *primary, *secondary, *accent) {
            Ok(colors) => {
                let size = (
                    width.unwrap_or(runtime.settings.surface_width),
                    height.unwrap_or(runtime.settings.surface_height),
                );
                render(&runtime, model, out, colors, size).await
            }
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
