use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use shadow_clone::{
    app,
    check::run_check,
    cli::{Cli, Command, apply_overrides},
    config::ShadowCloneConfig,
};

fn load_config(cli: &Cli, command: &Command) -> Result<ShadowCloneConfig> {
    let mut config = ShadowCloneConfig::preset(cli.preset);
    if let Some(path) = &cli.config {
        config = ShadowCloneConfig::overlay_file(config, path)?;
    }
    apply_overrides(&mut config, &cli.overrides, command);
    Ok(config)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command();
    let config = load_config(&cli, &command)?;

    if let Command::Check = command {
        let passed = run_check(&config);
        return Ok(if passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    config.validate()?;
    match command {
        Command::Window => app::run_window(config)?,
        Command::Serve(_) => app::run_serve(config)?,
        Command::Check => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
