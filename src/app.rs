use std::io::{self, Write};

use tracing::error;

use crate::{
    DisplayBackend, Error, Form, ModeRegistry,
    cli::{self, CommandLine, Intent, Termination},
};

/// How a dispatched command ended.
#[derive(Debug)]
pub enum Outcome {
    /// Output was written.
    Shown,
    /// The new mode is active.
    Applied,
    /// The platform refused the new mode.
    Rejected,
    /// The requested mode could not be resolved.
    Failed(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Shown | Outcome::Applied)
    }
}

/// Writes the version banner unless it was suppressed.
pub fn write_banner<W: Write>(program: &str, suppress_banner: bool, out: &mut W) -> io::Result<()> {
    if !suppress_banner {
        write!(out, "{}", cli::banner(program))?;
    }
    Ok(())
}

/// Writes what a help request or a usage error shows: banner, then usage.
pub fn write_termination<W: Write>(termination: &Termination, out: &mut W) -> io::Result<()> {
    write_banner(&termination.program, termination.suppress_banner, out)?;
    write!(out, "{}", cli::usage(&termination.program))
}

/// Writes the banner once, then runs the parsed intent.
pub fn run<B, W>(registry: &mut ModeRegistry<B>, command_line: &CommandLine, out: &mut W) -> io::Result<Outcome>
where
    B: DisplayBackend,
    W: Write,
{
    write_banner(&command_line.program, command_line.suppress_banner, out)?;
    execute(registry, command_line.intent, out)
}

/// Runs `intent` against `registry`, writing any listing to `out`.
///
/// # Errors
/// Only I/O errors from `out` are returned.
pub fn execute<B, W>(registry: &mut ModeRegistry<B>, intent: Intent, out: &mut W) -> io::Result<Outcome>
where
    B: DisplayBackend,
    W: Write,
{
    match intent {
        Intent::ShowCurrent => {
            writeln!(out, "{}", registry.render_current(Form::Long))?;
            Ok(Outcome::Shown)
        }
        Intent::ListAll => {
            for line in registry.list_all(Form::Long) {
                writeln!(out, "{line}")?;
            }
            Ok(Outcome::Shown)
        }
        Intent::SetMode(resolution) => Ok(match registry.set_mode(resolution) {
            Ok(true) => Outcome::Applied,
            Ok(false) => {
                error!(%resolution, "the display mode could not be changed");
                Outcome::Rejected
            }
            Err(e) => {
                error!(error = %e, "the display mode could not be changed");
                Outcome::Failed(e)
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Resolution,
        test_utils::{FakeBackend, mode},
    };

    fn registry(reject_apply: bool) -> ModeRegistry<FakeBackend> {
        let mut backend = FakeBackend::new(
            mode(800, 600, 32, 60),
            vec![mode(640, 480, 32, 60), mode(800, 600, 32, 60)],
        );
        backend.reject_apply = reject_apply;
        ModeRegistry::new(backend).unwrap()
    }

    fn output(args: &[&str]) -> (String, bool) {
        let mut out = Vec::new();
        let success = match cli::parse(std::iter::once("screenres").chain(args.iter().copied())) {
            Ok(command_line) => run(&mut registry(false), &command_line, &mut out)
                .unwrap()
                .is_success(),
            Err(termination) => {
                write_termination(&termination, &mut out).unwrap();
                termination.exit_code() == std::process::ExitCode::SUCCESS
            }
        };

        (String::from_utf8(out).unwrap(), success)
    }

    #[test]
    fn help_after_v_has_no_banner() {
        let (out, success) = output(&["/V", "/H"]);

        assert!(success);
        assert_eq!(out, cli::usage("screenres"));
    }

    #[test]
    fn help_before_v_shows_banner_and_usage() {
        let (out, success) = output(&["/H", "/V"]);

        assert!(success);
        assert_eq!(out, format!("{}{}", cli::banner("screenres"), cli::usage("screenres")));
    }

    #[test]
    fn usage_error_shows_banner_and_usage() {
        let (out, success) = output(&["/Q"]);

        assert!(!success);
        assert_eq!(out, format!("{}{}", cli::banner("screenres"), cli::usage("screenres")));
    }

    #[test]
    fn banner_is_printed_once_before_the_mode() {
        let (out, success) = output(&["/S"]);

        assert!(success);
        assert_eq!(out, "screenres\nVersion 1.0\n\n800x600, 32 bits @ 60 Hz.\n");
        assert_eq!(out.matches("Version 1.0").count(), 1);
    }

    #[test]
    fn suppressed_banner_leaves_only_the_mode() {
        let (out, success) = output(&["/S", "/V"]);

        assert!(success);
        assert_eq!(out, "800x600, 32 bits @ 60 Hz.\n");
    }

    #[test]
    fn show_current_prints_one_long_line() {
        let mut out = Vec::new();

        let outcome = execute(&mut registry(false), Intent::ShowCurrent, &mut out).unwrap();

        assert!(outcome.is_success());
        assert_eq!(String::from_utf8(out).unwrap(), "800x600, 32 bits @ 60 Hz.\n");
    }

    #[test]
    fn set_mode_writes_nothing() {
        let mut registry = registry(false);
        let mut out = Vec::new();

        let outcome = execute(&mut registry, Intent::SetMode(Resolution::new(640, 480)), &mut out).unwrap();

        assert!(matches!(outcome, Outcome::Applied));
        assert!(out.is_empty());
        assert_eq!(registry.render_current(Form::Short), "640x480");
    }

    #[test]
    fn unknown_mode_fails() {
        let mut out = Vec::new();

        let outcome = execute(&mut registry(false), Intent::SetMode(Resolution::new(1, 1)), &mut out).unwrap();

        assert!(matches!(outcome, Outcome::Failed(Error::NotFound(_))));
        assert!(!outcome.is_success());
        assert!(out.is_empty());
    }

    #[test]
    fn rejected_mode_fails() {
        let mut out = Vec::new();

        let outcome = execute(&mut registry(true), Intent::SetMode(Resolution::new(640, 480)), &mut out).unwrap();

        assert!(matches!(outcome, Outcome::Rejected));
        assert!(!outcome.is_success());
    }
}
