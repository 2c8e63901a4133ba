use std::io::{self, BufRead, Write};

use slotbot_agent::ChatRuntime;
use slotbot_core::config::LoadOptions;

use crate::commands::{load_runtime, CommandResult, EXIT_RUNTIME_FAILURE};

const FAREWELL: &str = "Goodbye!";

pub fn run(options: LoadOptions, session: Option<&str>) -> CommandResult {
    let (_, runtime) = match load_runtime("chat", options) {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match run_session(&runtime, session, stdin.lock(), stdout.lock()) {
        Ok(turns) => CommandResult::success(
            "chat",
            format!(
                "chat session `{}` ended after {turns} turns",
                session.unwrap_or(runtime.default_session_id())
            ),
        ),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_RUNTIME_FAILURE),
    }
}

/// Reads one message per line until `bye` or end of input and returns how many turns ran.
///
/// Line endings are stripped; everything else on the line is passed to the runtime as typed.
pub fn run_session<R, W>(
    runtime: &ChatRuntime,
    session: Option<&str>,
    mut input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut turns = 0;
    let mut line = String::new();

    loop {
        write!(output, "you> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let text = line.strip_suffix('\n').unwrap_or(&line);
        let text = text.strip_suffix('\r').unwrap_or(text);
        if text.trim().eq_ignore_ascii_case("bye") {
            writeln!(output, "bot> {FAREWELL}")?;
            break;
        }

        match runtime.handle_message(session, text) {
            Ok(reply) => writeln!(output, "bot> {}", reply.response)?,
            Err(error) => writeln!(output, "error: {error}")?,
        }
        turns += 1;
    }

    Ok(turns)
}
