use std::process::ExitCode;

fn main() -> ExitCode {
    slotbot_cli::run()
}
