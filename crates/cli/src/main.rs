use std::process::ExitCode;

fn main() -> ExitCode {
    quoteflow_cli::run()
}
