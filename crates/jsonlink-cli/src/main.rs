use std::process::ExitCode;

fn main() -> ExitCode {
    jsonlink_cli::run()
}
