use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use tracemake::cli::{Cli, OutputFormat};
use tracemake::config::Config;
use tracemake::deshell::{RecipeNormalizer, SystemShell};
use tracemake::json_output::JsonOutput;
use tracemake::makefile::import_make_database;
use tracemake::{ingest, Generator};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; warnings always reach stderr
fn init_tracing(debug: bool, xtrace: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else if xtrace {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(debug)
        .without_time()
        .init();
}

fn load_config(args: &Cli) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    args.apply_to(&mut config);
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args)?;

    init_tracing(args.debug, config.xtrace);

    let imported = match &args.make_vars {
        Some(path) => {
            let dump = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            import_make_database(&dump)
        }
        None => Vec::new(),
    };

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let gen_config = config.generator_config(&cwd.to_string_lossy(), imported)?;
    let base_dir = gen_config.base_dir.clone();

    let commands = if args.reads_stdin() {
        ingest::read_trace(io::stdin().lock(), &base_dir)?
    } else {
        let file = File::open(&args.trace)
            .with_context(|| format!("Failed to open trace {}", args.trace.display()))?;
        ingest::read_trace(BufReader::new(file), &base_dir)
            .with_context(|| format!("Failed to read trace {}", args.trace.display()))?
    };

    let normalizer = RecipeNormalizer::new(SystemShell::new(config.xtrace));
    let generator = Generator::new(gen_config, normalizer);

    let (text, failures) = match args.format {
        OutputFormat::Make => {
            let generation = generator.generate(&commands);
            (generation.makefile.render(), generation.failures)
        }
        OutputFormat::Json => {
            let (output, failures) = JsonOutput::from_commands(&generator, &commands);
            let mut json = output.to_json()?;
            json.push('\n');
            (json, failures)
        }
    };

    match &args.output {
        Some(path) => fs::write(path, &text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }

    for failure in &failures {
        tracing::error!("{}", failure);
    }
    if !failures.is_empty() {
        anyhow::bail!(
            "{} command(s) left out: recipe could not be normalized",
            failures.len()
        );
    }

    Ok(())
}
