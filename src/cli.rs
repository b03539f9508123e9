//! Command-line interpretation.
//!
//! The grammar is DOS style: every argument is a flag introduced by `/` or `-`,
//! followed by a case-insensitive letter.
//!
//! ```text
//! screenres { /X:px /Y:px | /S | /L | /? | /H } [/V]
//! ```
//!
//! Arguments are processed left to right. A later `/X` or `/Y` overwrites an
//! earlier one, and the intent is whatever intent flag came last; mixing
//! `/S`, `/L` and `/X` is not an error.

use std::process::ExitCode;

use tracing::debug;

use crate::{Resolution, leading_number};

pub const VERSION: &str = "Version 1.0";

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// `/S`
    ShowCurrent,
    /// `/L`
    ListAll,
    /// `/X:nnn /Y:nnn`
    SetMode(Resolution),
}

/// A successfully parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// `argv[0]` without its directory.
    pub program: String,
    pub intent: Intent,
    /// Set by `/V`.
    pub suppress_banner: bool,
}

/// Why a command line could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("argument `{0}` is too short")]
    TooShort(String),
    #[error("argument `{0}` does not start with `/` or `-`")]
    NotAFlag(String),
    #[error("unknown flag `{0}`")]
    UnknownFlag(String),
    #[error("expected `:` or `=` after the axis in `{0}`")]
    BadSeparator(String),
    #[error("`{0}` does not end in a number")]
    BadNumber(String),
    #[error("one of /X /Y, /S or /L is required")]
    MissingIntent,
    #[error("both /X and /Y are required and must not be 0")]
    MissingDimension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationKind {
    /// `/H` or `/?` was given.
    Help,
    Usage(UsageError),
}

/// Parsing stopped and the program should print usage and exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub program: String,
    /// Whether `/V` had been seen before parsing stopped.
    pub suppress_banner: bool,
    pub kind: TerminationKind,
}

impl Termination {
    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            TerminationKind::Help => ExitCode::SUCCESS,
            TerminationKind::Usage(_) => ExitCode::FAILURE,
        }
    }
}

/// Strips the directory part from an invocation path, accepting both `/` and `\`.
pub fn program_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// The two-line version banner followed by an empty line.
pub fn banner(program: &str) -> String {
    format!("{program}\n{VERSION}\n\n")
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: \n\
         {program}  {{ /X:px /Y:px | /S  | /L | /? | /H }} [/V]\n\
         \n\
         \x20 /X:nnn      Width in pixels.\n\
         \x20 /Y:nnn      Height in pixels.\n\
         \x20 /S          Show current display settings.\n\
         \x20 /L          List all display modes.\n\
         \x20 /V          Does NOT display version information.\n\
         \x20 /H or /?    Displays usage information.\n\
         \n\
         Ex: '{program}  /x:640 /y:480' Changes resolution to 640 x 480\n\
         \n"
    )
}

/// Parses `/X:nnn` or `/Y=nnn` and returns `nnn`. Trailing text after the
/// digits is ignored.
fn parse_dimension(arg: &str) -> Result<u32, UsageError> {
    if arg.len() < 4 {
        return Err(UsageError::TooShort(arg.to_owned()));
    }
    if !matches!(arg.as_bytes()[2], b':' | b'=') {
        return Err(UsageError::BadSeparator(arg.to_owned()));
    }

    leading_number(&arg[3..]).ok_or_else(|| UsageError::BadNumber(arg.to_owned()))
}

fn usage_termination(program: &str, suppress_banner: bool, e: UsageError) -> Termination {
    debug!(error = %e, "invalid command line");
    Termination {
        program: program.to_owned(),
        suppress_banner,
        kind: TerminationKind::Usage(e),
    }
}

/// Interprets the process arguments. The first item is the invocation path.
pub fn parse<I, S>(args: I) -> Result<CommandLine, Termination>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    let program = args
        .next()
        .map(|arg0| program_name(arg0.as_ref()).to_owned())
        .unwrap_or_default();

    let mut intent = None;
    let mut width = 0;
    let mut height = 0;
    let mut suppress_banner = false;

    for arg in args {
        let arg = arg.as_ref();
        let usage_error = |e| usage_termination(&program, suppress_banner, e);

        let mut chars = arg.chars();
        let (Some(prefix), Some(letter)) = (chars.next(), chars.next()) else {
            return Err(usage_error(UsageError::TooShort(arg.to_owned())));
        };
        if prefix != '/' && prefix != '-' {
            return Err(usage_error(UsageError::NotAFlag(arg.to_owned())));
        }

        match letter.to_ascii_uppercase() {
            'X' => {
                width = parse_dimension(arg).map_err(usage_error)?;
                intent = Some(Intent::SetMode(Resolution::new(width, height)));
            }
            'Y' => {
                height = parse_dimension(arg).map_err(usage_error)?;
                intent = Some(Intent::SetMode(Resolution::new(width, height)));
            }
            'S' => intent = Some(Intent::ShowCurrent),
            'L' => intent = Some(Intent::ListAll),
            'V' => suppress_banner = true,
            'H' | '?' => {
                return Err(Termination {
                    program,
                    suppress_banner,
                    kind: TerminationKind::Help,
                });
            }
            _ => return Err(usage_error(UsageError::UnknownFlag(arg.to_owned()))),
        }
    }

    let error = |e| usage_termination(&program, suppress_banner, e);

    // 0 counts as not given.
    let intent = match intent {
        None => return Err(error(UsageError::MissingIntent)),
        Some(Intent::SetMode(r)) if r.width == 0 || r.height == 0 => {
            return Err(error(UsageError::MissingDimension));
        }
        Some(intent) => intent,
    };

    Ok(CommandLine {
        program,
        intent,
        suppress_banner,
    })
}
