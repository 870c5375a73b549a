use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use pixie::preset::{EffectPreset, BUILT_INS};
use pixie::ViewerError;

/// Play a particle effect preset in a window.
#[derive(Parser, Debug)]
#[command(name = "pixie", version, about)]
struct Args {
    /// RON preset file to play
    preset: Option<PathBuf>,

    /// Play a built-in preset (sparks, fountain, fireworks)
    #[arg(short, long, conflicts_with = "preset")]
    built_in: Option<String>,

    /// Seed emitters for a repeatable run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the preset as RON and exit
    #[arg(long)]
    export: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), ViewerError> {
    let args = Args::parse();

    // RUST_LOG still wins over -v
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let preset = match (&args.preset, &args.built_in) {
        (Some(path), _) => EffectPreset::load(path)?,
        (None, Some(name)) => EffectPreset::built_in(name)?,
        (None, None) => EffectPreset::built_in(BUILT_INS[0])?,
    };

    if args.export {
        println!("{}", preset.to_ron_string()?);
        return Ok(());
    }

    let engine = preset.instantiate(args.seed)?;
    let title = if preset.name.is_empty() {
        "Pixie".to_string()
    } else {
        format!("Pixie - {}", preset.name)
    };
    pixie::viewer::run(engine, title)
}
