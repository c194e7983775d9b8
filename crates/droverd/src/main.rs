use std::process::ExitCode;

use drover_config::Config;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => error.exit(),
    };
    match droverd::run_daemon(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            // Without any subscriber the exit code is all that is left.
            droverd::report_failure(&config, &failure).ok();
            ExitCode::FAILURE
        }
    }
}
