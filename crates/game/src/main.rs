mod app;

use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    match app::build_app() {
        Ok(app) => app::run(app),
        Err(err) => {
            error!(error = %err, "run_config_invalid");
            ExitCode::FAILURE
        }
    }
}
