//! Terminal implementations of the operator capability

use std::io::{self, BufRead, Write};

use crate::app::operator::{answer_is_yes, default_marker, Operator};

/// Operator answering on a terminal
///
/// Generic over its streams so that tests can drive it with in-memory
/// buffers; secrets use `rpassword` only when `hide_secrets` is set.
pub struct TerminalOperator<R, W> {
    reader: R,
    writer: W,
    hide_secrets: bool,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stdout> {
    /// Operator on the process's stdin/stdout
    pub fn stdio() -> Self {
        Self {
            reader: io::stdin().lock(),
            writer: io::stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            hide_secrets: false,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn read_answer(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.writer, "{}", prompt)?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn say(&mut self, message: &str) {
        let _ = writeln!(self.writer, "{}", message);
    }

    fn confirm(&mut self, prompt: &str, default_yes: bool) -> io::Result<bool> {
        let answer = self.read_answer(&format!("{} {} ", prompt, default_marker(default_yes)))?;
        Ok(answer_is_yes(&answer, default_yes))
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        self.read_answer(&format!("{} ", prompt))
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        if self.hide_secrets {
            self.writer.flush()?;
            return rpassword::prompt_password(prompt);
        }
        self.read_answer(prompt)
    }
}

/// Operator for `--yes`: prints messages and takes every default
///
/// There is no default for a secret, so asking for one fails instead of
/// blocking on input.
pub struct AcceptDefaults<W> {
    writer: W,
}

impl AcceptDefaults<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> AcceptDefaults<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Operator for AcceptDefaults<W> {
    fn say(&mut self, message: &str) {
        let _ = writeln!(self.writer, "{}", message);
    }

    fn confirm(&mut self, prompt: &str, default_yes: bool) -> io::Result<bool> {
        let answer = if default_yes { "y" } else { "n" };
        writeln!(self.writer, "{} {} {}", prompt, default_marker(default_yes), answer)?;
        Ok(default_yes)
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        writeln!(self.writer, "{}", prompt)?;
        Ok(String::new())
    }

    fn secret(&mut self, _prompt: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no access token available; set HF_TOKEN or run 'auth setup'",
        ))
    }
}
