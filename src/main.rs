use std::fs::read_to_string;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};

use loxwalk::config::Config;
use loxwalk::prelude::load_prelude;
use loxwalk::reporter::{Reporter, WriteReporter};
use loxwalk::{Diagnostic, Lox, RunOutcome};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() -> Result<ExitCode> {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(usage) => {
            eprintln!("{}", usage);
            return Ok(ExitCode::from(64));
        }
    };

    let mut lox = Lox::new();
    if let Some(dir) = &config.prelude_dir {
        load_prelude(&mut lox, dir)?;
    }

    match &config.script {
        Some(path) => {
            let script = read_to_string(path)
                .with_context(|| format!("Unable to read script file {}", path.display()))?;
            let outcome = lox.run(&script);
            report(&outcome);
            if outcome.had_static_error {
                Ok(ExitCode::from(64))
            } else if outcome.had_runtime_error {
                Ok(ExitCode::from(70))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        None => {
            run_prompt(&mut lox)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_prompt(lox: &mut Lox) -> Result<()> {
    let mut stdin = io::stdin().lock();
    let mut line = String::new();
    loop {
        {
            let mut stdout = io::stdout().lock();
            stdout.write_all(b"> ")?;
            stdout.flush()?;
        }
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let outcome = lox.run_prompt_line(&line);
        report(&outcome);
        // Don't keep appending code until the next time
        line.clear();
    }
    Ok(())
}

fn report(outcome: &RunOutcome) {
    let mut reporter = WriteReporter::new(io::stderr().lock());
    for diagnostic in outcome.diagnostics.iter() {
        match diagnostic {
            Diagnostic::Static(error) => reporter.report(error),
            Diagnostic::Runtime(error) => eprintln!("{}", error),
        }
    }
}
