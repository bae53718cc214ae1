// ABOUTME: Typed builder for remote shell command text.
// ABOUTME: Replaces inline string interpolation with quoted, testable commands.

use std::fmt;

/// Quote a string for a POSIX shell.
///
/// Wraps the value in single quotes; embedded single quotes are closed,
/// backslash-escaped, and reopened (`'` becomes `'\''`).
pub fn sh_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

fn needs_quoting(word: &str) -> bool {
    word.is_empty()
        || word
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || "_./+-:=@".contains(c)))
}

/// A single remote command: a program name plus quoted arguments.
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument. The argument is shell-quoted when rendered.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if needs_quoting(&self.program) {
            write!(f, "{}", sh_quote(&self.program))?;
        } else {
            write!(f, "{}", self.program)?;
        }
        for arg in &self.args {
            write!(f, " {}", sh_quote(arg))?;
        }
        Ok(())
    }
}

/// A sequence of commands chained with `&&`.
///
/// The final step may be detached: wrapped in `nohup`, output discarded,
/// backgrounded so it outlives the SSH session that started it.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<String>,
    detached_tail: Option<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, command: CommandLine) -> Self {
        self.steps.push(command.to_string());
        self
    }

    /// Append a step verbatim, without quoting.
    ///
    /// For caller-supplied setup text like `. ./.env` that is already shell
    /// syntax, not a program invocation.
    pub fn then_raw(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Finish the script with a detached launch of `command`.
    pub fn detach(mut self, command: CommandLine) -> Self {
        self.detached_tail = Some(format!("nohup {command} >/dev/null 2>&1 &"));
        self
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<&str> = self.steps.iter().map(String::as_str).collect();
        if let Some(tail) = &self.detached_tail {
            parts.push(tail);
        }
        parts.join(" && ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_plain_value() {
        assert_eq!(sh_quote("/srv/app/bin"), "'/srv/app/bin'");
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn quote_empty_value() {
        assert_eq!(sh_quote(""), "''");
    }

    #[test]
    fn command_line_quotes_args() {
        let cmd = CommandLine::new("chmod").arg("+x").arg("/srv/app/my release");
        assert_eq!(cmd.to_string(), "chmod '+x' '/srv/app/my release'");
    }

    #[test]
    fn command_line_neutralizes_injection() {
        let cmd = CommandLine::new("rm").arg("-f").arg("x'; reboot; '");
        assert_eq!(cmd.to_string(), r"rm '-f' 'x'\''; reboot; '\'''");
    }

    #[test]
    fn program_with_unsafe_chars_is_quoted() {
        let cmd = CommandLine::new("/opt/my tools/run").arg("now");
        assert_eq!(cmd.to_string(), "'/opt/my tools/run' 'now'");
    }

    #[test]
    fn script_chains_with_and() {
        let script = Script::new()
            .then(CommandLine::new("cd").arg("/srv/app"))
            .then(CommandLine::new("chmod").arg("+x").arg("/srv/app/rel"));
        assert_eq!(script.render(), "cd '/srv/app' && chmod '+x' '/srv/app/rel'");
    }

    #[test]
    fn script_raw_step_is_not_quoted() {
        let script = Script::new().then_raw(". ./.env");
        assert_eq!(script.render(), ". ./.env");
    }

    #[test]
    fn detached_tail_discards_output_and_backgrounds() {
        let script = Script::new()
            .then(CommandLine::new("cd").arg("/srv/app"))
            .detach(CommandLine::new("/srv/app/rel"));
        assert_eq!(
            script.render(),
            "cd '/srv/app' && nohup /srv/app/rel >/dev/null 2>&1 &"
        );
    }
}
