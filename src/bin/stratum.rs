use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "stratum", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effect program synthesized from a layer stack.
    Dsl(DslArgs),
    /// List effects from a manifest.
    Effects(EffectsArgs),
}

#[derive(Parser, Debug)]
struct DslArgs {
    /// Layer stack JSON (array of layers, bottom to top).
    #[arg(long)]
    layers: PathBuf,

    /// Effect manifest JSON.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Session config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also print the invocation list the step mapper walks.
    #[arg(long)]
    invocations: bool,
}

#[derive(Parser, Debug)]
struct EffectsArgs {
    /// Effect manifest JSON.
    #[arg(long)]
    manifest: PathBuf,

    /// Session config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which catalog to print.
    #[arg(long, value_enum, default_value_t = Catalog::All)]
    list: Catalog,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Catalog {
    All,
    Starter,
    Layer,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Dsl(args) => cmd_dsl(args),
        Command::Effects(args) => cmd_effects(args),
    }
}

fn read_text(path: &Path, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {what} '{}'", path.display()))
}

fn read_layers(path: &Path) -> anyhow::Result<Vec<stratum::Layer>> {
    let f = File::open(path).with_context(|| format!("open layers '{}'", path.display()))?;
    let layers: Vec<stratum::Layer> =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse layers JSON")?;
    Ok(layers)
}

fn read_manifest(path: Option<&Path>) -> anyhow::Result<stratum::EffectManifest> {
    match path {
        Some(p) => Ok(stratum::EffectManifest::from_json_str(&read_text(
            p, "manifest",
        )?)?),
        None => Ok(stratum::EffectManifest::default()),
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<stratum::SessionConfig> {
    match path {
        Some(p) => Ok(stratum::SessionConfig::from_json_str(&read_text(
            p, "config",
        )?)?),
        None => Ok(stratum::SessionConfig::default()),
    }
}

fn cmd_dsl(args: DslArgs) -> anyhow::Result<()> {
    let layers = read_layers(&args.layers)?;
    let stack = stratum::LayerStack::from_layers(layers)?;
    let manifest = read_manifest(args.manifest.as_deref())?;
    let config = read_config(args.config.as_deref())?;

    let query = stratum::ManifestQuery::new(&manifest, &config.generator_namespaces);
    let program = stratum::build_program(&stack.to_vec(), &query, &config.default_generator);
    print!("{}", program.text);

    if args.invocations {
        eprintln!("invocations:");
        for inv in &program.invocations {
            eprintln!("  {:<24} {:?}", inv.effect.to_string(), inv.role);
        }
    }
    Ok(())
}

fn cmd_effects(args: EffectsArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(Some(&args.manifest))?;
    let config = read_config(args.config.as_deref())?;
    let query = stratum::ManifestQuery::new(&manifest, &config.generator_namespaces);

    let listing = match args.list {
        Catalog::All => query.all_effects(),
        Catalog::Starter => query.starter_effects(),
        Catalog::Layer => query.layer_effects(),
    };
    for effect in listing {
        if effect.description.is_empty() {
            println!("{}", effect.id);
        } else {
            println!("{}\t{}", effect.id, effect.description);
        }
    }
    Ok(())
}
