use windows::{
    Win32::{
        Devices::Display::*,
        Foundation::*,
        Graphics::Gdi::*,
    },
    core::PCWSTR,
};

use crate::{DisplayBackend, DisplayMode, ModeFlags};

/// The error type for Windows-specific operations.
#[derive(Debug, thiserror::Error)]
pub enum WindowsError {
    /// A Win32 call failed.
    ///
    /// See [`windows::core::Error`][windows::core::Error].
    ///
    /// [windows::core::Error]: https://docs.rs/windows/latest/windows/core/struct.Error.html
    #[error(transparent)]
    Api(#[from] windows::core::Error),
    /// `ChangeDisplaySettingsW` returned something other than `DISP_CHANGE_SUCCESSFUL`.
    #[error("`ChangeDisplaySettingsW` returned {0}.")]
    ChangeRejected(i32),
}

const APPLY_FIELDS: DEVMODE_FIELD_FLAGS = DEVMODE_FIELD_FLAGS(
    DM_BITSPERPEL.0 | DM_PELSWIDTH.0 | DM_PELSHEIGHT.0 | DM_DISPLAYFLAGS.0 | DM_DISPLAYFREQUENCY.0,
);

fn empty_devmode() -> DEVMODEW {
    DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as _,
        ..Default::default()
    }
}

/// Calls `EnumDisplaySettingsW` for the primary display device.
fn enum_display_settings(mode_num: ENUM_DISPLAY_SETTINGS_MODE) -> Result<DEVMODEW, WindowsError> {
    let mut devmode = empty_devmode();
    unsafe { EnumDisplaySettingsW(PCWSTR::null(), mode_num, &mut devmode).ok()? };

    Ok(devmode)
}

impl From<&DEVMODEW> for DisplayMode {
    fn from(devmode: &DEVMODEW) -> Self {
        // SAFETY: `EnumDisplaySettingsW` fills `dmDisplayFlags` for display devices.
        let display_flags = unsafe { devmode.Anonymous2.dmDisplayFlags };

        Self {
            width: devmode.dmPelsWidth,
            height: devmode.dmPelsHeight,
            color_depth: devmode.dmBitsPerPel,
            refresh_rate: devmode.dmDisplayFrequency,
            flags: ModeFlags::from_raw(display_flags as u64),
        }
    }
}

impl From<&DisplayMode> for DEVMODEW {
    fn from(mode: &DisplayMode) -> Self {
        let mut devmode = empty_devmode();
        devmode.dmDriverExtra = 0;
        devmode.dmFields = APPLY_FIELDS;
        devmode.dmPelsWidth = mode.width;
        devmode.dmPelsHeight = mode.height;
        devmode.dmBitsPerPel = mode.color_depth;
        devmode.dmDisplayFrequency = mode.refresh_rate;
        devmode.Anonymous2.dmDisplayFlags = mode.flags.raw() as u32;

        devmode
    }
}

/// The display modes of the primary display device, as reported by GDI.
#[derive(Debug, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Result<Self, WindowsError> {
        Ok(Self)
    }
}

impl DisplayBackend for WindowsBackend {
    type Error = WindowsError;

    fn current_mode(&mut self) -> Result<DisplayMode, WindowsError> {
        let devmode = enum_display_settings(ENUM_CURRENT_SETTINGS)?;
        Ok((&devmode).into())
    }

    fn mode(&mut self, index: u32) -> Option<DisplayMode> {
        // `EnumDisplaySettingsW` fails once `index` is past the last mode.
        let devmode = enum_display_settings(ENUM_DISPLAY_SETTINGS_MODE(index)).ok()?;
        let mode = DisplayMode::from(&devmode);
        tracing::trace!(
            index,
            width = mode.width,
            height = mode.height,
            bits = mode.color_depth,
            hz = mode.refresh_rate,
            flags = mode.flags.raw(),
            "EnumDisplaySettingsW"
        );

        Some(mode)
    }

    fn apply(&mut self, mode: &DisplayMode) -> Result<(), WindowsError> {
        let devmode = DEVMODEW::from(mode);
        let result = unsafe { ChangeDisplaySettingsW(Some(&raw const devmode), CDS_TYPE(0)) };

        if result != DISP_CHANGE_SUCCESSFUL {
            return Err(WindowsError::ChangeRejected(result.0));
        }

        Ok(())
    }

    fn clone_displays(&mut self) -> Result<(), WindowsError> {
        let status = unsafe { SetDisplayConfig(None, None, SDC_TOPOLOGY_CLONE | SDC_APPLY) };
        WIN32_ERROR(status as u32).ok()?;

        Ok(())
    }
}
