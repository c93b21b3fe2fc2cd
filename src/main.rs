use std::process::ExitCode;

use confkit::ui::output;

fn main() -> ExitCode {
    match confkit::cli::run() {
        Ok(code) => code,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
