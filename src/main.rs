//! gpkg-verifier CLI entry point
//!
//! Verifies GeoPackage files against the GeoPackage Encoding Standard.

use clap::Parser;
use gpkg_verifier::checks;
use gpkg_verifier::cli::args::{Cli, Command, ListArgs, OutputFormat, VerifyArgs};
use gpkg_verifier::cli::output::{get_formatter, TextFormatter};
use gpkg_verifier::cli::{exit_code_for, init_logging, EXIT_RUNTIME};
use gpkg_verifier::version::get_build_info;
use gpkg_verifier::{verify_files, Subsystem, VerifierConfig, VerifierError};

use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Command::Version => {
            println!("{}", get_build_info());
            ExitCode::SUCCESS
        }
        Command::List(args) => {
            print_requirement_list(&args);
            ExitCode::SUCCESS
        }
        Command::Verify(args) => match run_verify(&args) {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_RUNTIME)
            }
        },
    }
}

fn print_requirement_list(args: &ListArgs) {
    let subsystems: Vec<Subsystem> = if args.subsystems.is_empty() {
        Subsystem::FIXED.to_vec()
    } else {
        let mut selected = args.subsystems.clone();
        selected.sort();
        selected.dedup();
        selected
    };

    for (i, subsystem) in subsystems.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{} requirements:", subsystem.name().to_uppercase());
        for requirement in checks::requirements(subsystem) {
            println!(
                "  {:<16} {:<8} {}",
                requirement.reference,
                requirement.severity.to_string(),
                requirement.text
            );
        }
    }
}

fn run_verify(args: &VerifyArgs) -> Result<u8, VerifierError> {
    let config = VerifierConfig::from_args(args)?;
    debug!(?config, "resolved configuration");
    info!(files = args.files.len(), "starting verification");

    let mut runs = Vec::new();
    let mut runtime_error = false;

    for (file, result) in verify_files(&args.files, &config) {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => {
                eprintln!("Error: {}", e);
                debug!(file = %file.display(), "file skipped");
                runtime_error = true;
            }
        }
    }

    let formatter = get_formatter(config.format, config.color);
    let output = formatter.format(&runs);

    match config.output {
        Some(ref path) => std::fs::write(path, &output).map_err(|e| VerifierError::Io {
            context: format!("writing '{}'", path.display()),
            source: e,
        })?,
        None if !output.is_empty() => println!("{}", output),
        None => {}
    }

    if config.format == OutputFormat::Text {
        let summaries = TextFormatter::new(config.color);
        for run in &runs {
            for (subsystem, cause) in &run.failures {
                eprintln!("{}: {} could not be verified: {}", run.file_name(), subsystem, cause);
            }
            eprintln!("{}", summaries.summary(run));
        }
    }

    Ok(exit_code_for(&runs, config.fail_on, runtime_error))
}
