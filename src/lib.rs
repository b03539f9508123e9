use std::{fmt, str::FromStr};

pub mod app;
pub mod cli;
pub mod registry;
#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(test)]
pub(crate) mod test_utils;

pub use registry::ModeRegistry;

#[cfg(target_os = "windows")]
pub use self::windows::{WindowsBackend as PlatformBackend, WindowsError as PlatformError};
#[cfg(target_os = "linux")]
pub use self::x11::{X11Backend as PlatformBackend, X11Error as PlatformError};

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
compile_error!("screenres has display backends for Windows (GDI) and Linux (X11 RandR) only.");

/// The error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The currently active display mode could not be queried.
    #[error("Failed to query the current display mode.")]
    Enumeration(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// A resolution string was not of the form `WIDTHxHEIGHT`.
    #[error("Invalid string for resolution: '{0}'")]
    InvalidArgument(String),
    /// No enumerated display mode has the requested width and height.
    #[error("No resolution found with '{0}'")]
    NotFound(String),
}

/// Opaque, platform-specific flags of a display mode.
///
/// The registry never builds these itself. They are copied from the mode
/// reported by the backend and handed back unchanged when that mode is applied.
///
/// # Platform-specific
/// - **Windows**: the `dmDisplayFlags` field of [`DEVMODEW`][DEVMODEW].
/// - **Linux**: the RandR mode id in the upper half and the RandR mode flags in the lower half.
///
/// [DEVMODEW]: https://learn.microsoft.com/en-us/windows/win32/api/wingdi/ns-wingdi-devmodew
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeFlags(u64);

impl ModeFlags {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How much of a [`DisplayMode`] to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `1920x1080`
    Short,
    /// `1920x1080, 32 bits @ 60 Hz.`
    Long,
}

/// One display configuration reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMode {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color depth in bits per pixel.
    pub color_depth: u32,
    /// Refresh rate in Hz.
    pub refresh_rate: u32,
    /// Flags that must be passed back when applying this mode.
    pub flags: ModeFlags,
}

impl DisplayMode {
    pub fn render(&self, form: Form) -> String {
        match form {
            Form::Short => format!("{}x{}", self.width, self.height),
            Form::Long => format!(
                "{}x{}, {} bits @ {} Hz.",
                self.width, self.height, self.color_depth, self.refresh_rate
            ),
        }
    }
}

/// A width and height pair, written as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parses `640x480`. The string is split at the first `x`, and each half
    /// is read with [`leading_number`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidArgument(s.to_owned());
        let (width, height) = s.split_once('x').ok_or_else(invalid)?;

        Ok(Self {
            width: leading_number(width).ok_or_else(invalid)?,
            height: leading_number(height).ok_or_else(invalid)?,
        })
    }
}

/// Reads the unsigned decimal number at the start of `s`.
///
/// Leading whitespace and a `+` sign are skipped and anything after the
/// digits is ignored, so `" 1024px"` reads as `1024`. Returns `None` if there
/// are no digits or the value does not fit in a `u32`.
pub fn leading_number(s: &str) -> Option<u32> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

    s[..end].parse().ok()
}

/// The operating system's display configuration, as seen by a [`ModeRegistry`].
///
/// Implementations talk to the platform; tests substitute a scripted fake.
pub trait DisplayBackend {
    /// The error type of the platform calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the mode that is active right now.
    ///
    /// # Errors
    /// Returns [`Self::Error`] if the platform cannot report the active mode.
    fn current_mode(&mut self) -> Result<DisplayMode, Self::Error>;

    /// Returns the `index`-th supported mode, or `None` once there are no more.
    fn mode(&mut self, index: u32) -> Option<DisplayMode>;

    /// Makes `mode` the active display mode.
    ///
    /// # Errors
    /// Returns [`Self::Error`] if the platform refuses the change.
    fn apply(&mut self, mode: &DisplayMode) -> Result<(), Self::Error>;

    /// Asks the platform to mirror all connected displays.
    fn clone_displays(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: u32, height: u32, color_depth: u32, refresh_rate: u32) -> DisplayMode {
        DisplayMode {
            width,
            height,
            color_depth,
            refresh_rate,
            flags: ModeFlags::default(),
        }
    }

    #[test]
    fn renders_short_and_long_forms() {
        let mode = mode(1920, 1080, 32, 60);

        assert_eq!(mode.render(Form::Short), "1920x1080");
        assert_eq!(mode.render(Form::Long), "1920x1080, 32 bits @ 60 Hz.");
    }

    #[test]
    fn parses_resolution() {
        assert_eq!("640x480".parse::<Resolution>().unwrap(), Resolution::new(640, 480));
        assert_eq!(Resolution::new(1024, 768).to_string(), "1024x768");
        assert_eq!(" 800x 600".parse::<Resolution>().unwrap(), Resolution::new(800, 600));
        assert_eq!("640x480x1".parse::<Resolution>().unwrap(), Resolution::new(640, 480));
        assert_eq!("1024x768px".parse::<Resolution>().unwrap(), Resolution::new(1024, 768));
    }

    #[test]
    fn leading_number_stops_at_the_first_non_digit() {
        assert_eq!(leading_number("1024px"), Some(1024));
        assert_eq!(leading_number("  +640"), Some(640));
        assert_eq!(leading_number("768"), Some(768));
        assert_eq!(leading_number("px1024"), None);
        assert_eq!(leading_number("-640"), None);
        assert_eq!(leading_number(""), None);
        assert_eq!(leading_number("99999999999"), None);
    }

    #[test]
    fn rejects_malformed_resolution() {
        for input in ["640480", "x480", "640x", "axb", "-640x480", "640x-480", ""] {
            assert!(
                matches!(input.parse::<Resolution>(), Err(Error::InvalidArgument(ref s)) if s == input),
                "{input:?} should be rejected"
            );
        }
    }
}
