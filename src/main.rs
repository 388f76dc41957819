//! Demo viewer: a falling cube and an optional loaded model

use std::process::ExitCode;

use miracle::prelude::*;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match EngineConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match Engine::new(config).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Engine error: {e}");
            ExitCode::FAILURE
        }
    }
}
