use std::process::ExitCode;

use autosync::ui::output;

fn main() -> ExitCode {
    match autosync::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
