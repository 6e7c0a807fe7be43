use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fragmix::{FragmentNode, PremulColor, emit_program, fold_constant, program_key};

#[derive(Parser, Debug)]
#[command(name = "fragmix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit WGSL fragment text for a blend graph.
    Emit(GraphArgs),
    /// Constant-fold a blend graph for a given input color.
    Fold(FoldArgs),
    /// Print a graph's optimization flags and program cache key.
    Inspect(GraphArgs),
}

#[derive(Parser, Debug)]
struct GraphArgs {
    /// Input graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FoldArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Premultiplied input color as r,g,b,a.
    #[arg(long, default_value = "1,1,1,1")]
    input: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Emit(args) => cmd_emit(args),
        Command::Fold(args) => cmd_fold(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn read_graph(path: &Path) -> anyhow::Result<Box<dyn FragmentNode>> {
    let f = File::open(path).with_context(|| format!("open graph '{}'", path.display()))?;
    let r = BufReader::new(f);
    let spec: fragmix::NodeSpec =
        serde_json::from_reader(r).with_context(|| "parse graph JSON")?;
    Ok(fragmix::graph::build(&spec)?)
}

fn parse_color(s: &str) -> anyhow::Result<PremulColor> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parse input color '{s}'"))?;
    let [r, g, b, a] = parts.as_slice() else {
        anyhow::bail!("input color must have exactly 4 channels, got {}", parts.len());
    };
    Ok(PremulColor::new(*r, *g, *b, *a))
}

fn cmd_emit(args: GraphArgs) -> anyhow::Result<()> {
    let root = read_graph(&args.in_path)?;
    print!("{}", emit_program(root.as_ref()));
    Ok(())
}

fn cmd_fold(args: FoldArgs) -> anyhow::Result<()> {
    let root = read_graph(&args.graph.in_path)?;
    let input = parse_color(&args.input)?;
    match fold_constant(root.as_ref(), input) {
        Some(out) => {
            println!("{:?}", out.to_array());
            Ok(())
        }
        None => anyhow::bail!("graph output is not a constant function of its input"),
    }
}

fn cmd_inspect(args: GraphArgs) -> anyhow::Result<()> {
    let root = read_graph(&args.in_path)?;
    let flags = root.flags();
    println!("preserves_opaque_input: {}", flags.preserves_opaque_input);
    println!(
        "constant_output_for_constant_input: {}",
        flags.constant_output_for_constant_input
    );
    let key = program_key(root.as_ref());
    let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
    println!("program_key: {hex}");
    Ok(())
}
