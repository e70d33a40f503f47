use std::process::ExitCode;

fn main() -> ExitCode {
    match pexp_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("pexp: {e}");
            ExitCode::FAILURE
        }
    }
}
