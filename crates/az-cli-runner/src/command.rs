//! Argument-vector builder for `az` invocations.

use std::fmt;

/// Value of the `-o/--output` flag appended to every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Tsv,
    None,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Tsv => "tsv",
            OutputFormat::None => "none",
        }
    }
}

/// A single `az` invocation.
///
/// Arguments are kept as a vector and handed to the process directly, so
/// values never pass through a shell. [`AzCommand::command_line`] renders a
/// copy-pasteable form with every token quoted.
///
/// ```
/// use az_cli_runner::{AzCommand, OutputFormat};
///
/// let cmd = AzCommand::new(["keyvault", "secret", "show"])
///     .arg("--vault-name", "team-kv")
///     .arg("--name", "db-password")
///     .opt_arg("--version", None::<String>)
///     .output(OutputFormat::Json);
///
/// assert_eq!(
///     cmd.command_line(),
///     "az 'keyvault' 'secret' 'show' '--vault-name' 'team-kv' '--name' 'db-password' '-o' 'json'"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzCommand {
    args: Vec<String>,
    sensitive: Vec<usize>,
    output: OutputFormat,
}

impl AzCommand {
    pub fn new<I, S>(subcommand: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: subcommand.into_iter().map(Into::into).collect(),
            sensitive: Vec::new(),
            output: OutputFormat::default(),
        }
    }

    /// `flag value`
    pub fn arg(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(flag.into());
        self.args.push(value.into());
        self
    }

    /// Like [`AzCommand::arg`] but skipped when `value` is `None` or blank.
    pub fn opt_arg<V: Into<String>>(self, flag: impl Into<String>, value: Option<V>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.trim().is_empty() => self.arg(flag, value),
            _ => self,
        }
    }

    /// `flag value`, with the value masked in logs.
    pub fn sensitive_arg(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(flag.into());
        self.sensitive.push(self.args.len());
        self.args.push(value.into());
        self
    }

    /// Bare switch such as `--use-device-code`.
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.args.push(flag.into());
        self
    }

    /// Flag followed by several values, e.g. `--ops encrypt decrypt`.
    pub fn args_list<I, S>(mut self, flag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.args.push(flag.into());
            self.args.extend(values);
        }
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.output = format;
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output
    }

    /// Full argument vector passed to the executable (without `az` itself).
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push("-o".to_string());
        argv.push(self.output.as_str().to_string());
        argv
    }

    /// True when the argument vector starts with `prefix`.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        let argv = self.argv();
        prefix.len() <= argv.len() && prefix.iter().zip(argv.iter()).all(|(p, a)| p == a)
    }

    /// Value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// `az ...` with every token shell-quoted.
    pub fn command_line(&self) -> String {
        render(&self.argv(), |_| false)
    }

    /// Like [`AzCommand::command_line`] with sensitive values replaced by `***`.
    pub fn redacted_line(&self) -> String {
        render(&self.argv(), |i| self.sensitive.contains(&i))
    }
}

impl fmt::Display for AzCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted_line())
    }
}

fn render(argv: &[String], masked: impl Fn(usize) -> bool) -> String {
    let mut line = String::from("az");
    for (i, arg) in argv.iter().enumerate() {
        line.push(' ');
        if masked(i) {
            line.push_str("'***'");
        } else {
            line.push_str(&shell_quote(arg));
        }
    }
    line
}

/// Wrap `value` in single quotes, escaping embedded quotes as `'\''`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
