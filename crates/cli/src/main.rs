use std::process::ExitCode;

fn main() -> ExitCode {
    splitflow_cli::run()
}
