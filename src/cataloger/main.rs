// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("ar-effect-cataloger requires the 'std' feature");

use ar_camera_pipeline::{
    cli::{handle_error, warn_user},
    shared::{DEFAULT_ASSET_ROOT, EffectRoster, PipelineError},
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use serde_json::json;
use std::{error::Error as StdError, path::PathBuf};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Directory of effect asset files; defaults to the stock effect set.
    #[arg(long)]
    assets: Option<PathBuf>,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_cataloger(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_cataloger(options: &Options) -> Result<(), PipelineError> {
    if options.flags.debug || options.flags.verbose >= 1 {
        eprintln!("INFO: enumerating effect assets");
    }

    let roster = match &options.assets {
        Some(dir) => EffectRoster::discover(dir)?,
        None => EffectRoster::default(),
    };

    if roster.len() == 1 {
        warn_user(&options.flags, "no effect assets found");
    }

    for effect in roster.effects() {
        let path = effect.resolve_path(DEFAULT_ASSET_ROOT);
        match options.output {
            OutputFormat::Text => match &path {
                Some(path) => println!("{}: {}", effect.name(), path),
                None => println!("{}: (no effect)", effect.name()),
            },
            OutputFormat::Jsonl => {
                println!("{}", json!({ "name": effect.name(), "path": path }));
            },
        }
    }

    Ok(())
}
