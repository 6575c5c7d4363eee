//! Replay a scenario file and print the resolved state as JSON.

use formwork_app::{AppResult, Scenario, run_scenario};
use std::process::ExitCode;

fn run(path: &str) -> AppResult<String> {
    let scenario = Scenario::load(path)?;
    let report = run_scenario(&scenario)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting Formwork");

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: formwork <scenario.json>");
        return ExitCode::FAILURE;
    };
    match run(&path) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
