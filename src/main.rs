use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, warn};
use volumetric_sdf::{config, registry::OperatorRegistry, renderer, scene};

#[derive(Debug, Default, Clone)]
struct Cli {
    config: Option<PathBuf>,
    operators: Vec<PathBuf>,
    output: Option<PathBuf>,
    validate: bool,
    map_only: bool,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --config"));
                };
                cli.config = Some(PathBuf::from(v));
                i += 2;
            }
            "--operators" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --operators"));
                };
                cli.operators.push(PathBuf::from(v));
                i += 2;
            }
            "--output" | "-o" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --output"));
                };
                cli.output = Some(PathBuf::from(v));
                i += 2;
            }
            "--validate" => {
                cli.validate = true;
                i += 1;
            }
            "--map-only" => {
                cli.map_only = true;
                i += 1;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --config <file>, --operators <manifest>, --output <file>, --validate, --map-only)"
                ));
            }
        }
    }
    if cli.map_only && cli.validate {
        bail!("--validate needs the full shader and cannot be combined with --map-only");
    }
    Ok(cli)
}

fn run(cli: Cli) -> Result<()> {
    let ray_march = match cli.config.as_deref() {
        Some(path) => config::load_config_from_path(path)?,
        None => config::RayMarchConfig::default(),
    };

    let mut registry = OperatorRegistry::builtin().context("built-in operator library is invalid")?;
    for path in &cli.operators {
        let defs = config::load_operator_manifest(path)?;
        registry
            .register_all(defs)
            .with_context(|| format!("rejected operator from {}", path.display()))?;
    }
    info!(operators = registry.len(), "operator registry ready");

    let graph = scene::default_scene(&registry)?;

    let text = if cli.map_only {
        renderer::compile_map(&graph).context("failed to compile scene graph")?
    } else {
        let program = renderer::build_shader_program(&registry, &graph, &ray_march)
            .context("failed to compile scene graph")?;

        if cli.validate {
            let mut failed = 0;
            for diag in renderer::validate_program(&program) {
                match &diag.error {
                    None => info!(stage = %diag.stage, "stage validated"),
                    Some(e) => {
                        failed += 1;
                        warn!(stage = %diag.stage, "stage failed validation:\n{e}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} shader stage(s) failed validation");
            }
        }
        program.fragment
    };

    match cli.output {
        Some(path) => {
            std::fs::write(&path, &text)
                .with_context(|| format!("failed to write shader to {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "wrote shader");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    run(cli)
}
