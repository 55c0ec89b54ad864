use std::process::ExitCode;

fn main() -> ExitCode {
    dermadesk_cli::run()
}
