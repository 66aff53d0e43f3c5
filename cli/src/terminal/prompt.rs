use std::io::{self, BufRead, Write};

use anyhow::bail;

pub const ECHO_NOTICE: &str = "input will be visible";

/// Asks for one line on stderr and reads the answer from stdin.
pub fn ask(label: &str) -> anyhow::Result<String> {
    read_answer(&mut io::stdin().lock(), &mut io::stderr().lock(), label, false)
}

/// Like [`ask`], but tells the user first that the typed secret is echoed.
pub fn ask_secret(label: &str) -> anyhow::Result<String> {
    read_answer(&mut io::stdin().lock(), &mut io::stderr().lock(), label, true)
}

fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    secret: bool,
) -> anyhow::Result<String> {
    if secret {
        write!(output, "{label} ({ECHO_NOTICE}): ")?;
    } else {
        write!(output, "{label}: ")?;
    }
    output.flush()?;

    let mut line: String = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("stdin closed while waiting for {label}");
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
