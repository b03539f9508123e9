use smallvec::SmallVec;
use tracing::trace;
use x11rb::{
    CURRENT_TIME, NONE,
    connection::Connection,
    errors::{ConnectError, ConnectionError, ReplyError},
    protocol::{
        randr::{self, ConnectionExt as _, ModeFlag, ModeInfo, SetConfig},
        xproto::{ConnectionExt as _, Window},
    },
    rust_connection::RustConnection,
};

use crate::{DisplayBackend, DisplayMode, ModeFlags};

/// The error type for X11-specific operations.
#[derive(Debug, thiserror::Error)]
pub enum X11Error {
    #[error("Failed to connect to the X server.")]
    Connect(#[from] ConnectError),
    #[error("The connection to the X server failed.")]
    Connection(#[from] ConnectionError),
    #[error("The X server returned an error.")]
    Reply(#[from] ReplyError),
    #[error("No connected output is driving a CRTC.")]
    NoActiveOutput,
    #[error("RandR mode {0} is not known to the X server.")]
    UnknownMode(randr::Mode),
    #[error("`RRSetCrtcConfig` returned {0:?}.")]
    Rejected(SetConfig),
}

/// Packs the RandR mode id and its flags into [`ModeFlags`].
fn pack_flags(info: &ModeInfo) -> ModeFlags {
    ModeFlags::from_raw(u64::from(info.id) << 32 | u64::from(u32::from(info.mode_flags)))
}

fn mode_id(flags: ModeFlags) -> randr::Mode {
    (flags.raw() >> 32) as randr::Mode
}

/// Vertical refresh rate in Hz, rounded.
fn refresh_rate(info: &ModeInfo) -> u32 {
    let flags = u32::from(info.mode_flags);
    let mut vtotal = f64::from(info.vtotal);
    if flags & u32::from(ModeFlag::DOUBLE_SCAN) != 0 {
        vtotal *= 2.0;
    }
    if flags & u32::from(ModeFlag::INTERLACE) != 0 {
        vtotal /= 2.0;
    }

    let dots_per_frame = f64::from(info.htotal) * vtotal;
    if dots_per_frame == 0.0 {
        return 0;
    }

    (f64::from(info.dot_clock) / dots_per_frame).round() as u32
}

/// The screen size needed to fit `needed`, or `None` if `current` already fits it.
fn grown_screen_size(current: (u16, u16), needed: (u16, u16)) -> Option<(u16, u16)> {
    if needed.0 > current.0 || needed.1 > current.1 {
        Some((needed.0.max(current.0), needed.1.max(current.1)))
    } else {
        None
    }
}

/// The display modes of the primary RandR output.
///
/// If no output is marked primary, the first connected output that drives a
/// CRTC is used.
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    depth: u8,
    /// Physical size of the screen as reported at connection time, for DPI.
    screen_px: (u16, u16),
    screen_mm: (u16, u16),
    output: randr::Output,
    crtc: randr::Crtc,
    config_timestamp: x11rb::protocol::xproto::Timestamp,
    modes: Vec<ModeInfo>,
    output_modes: Vec<randr::Mode>,
}

impl X11Backend {
    /// Connects to the X server named by `$DISPLAY`.
    ///
    /// # Errors
    /// Returns [`X11Error`] if the connection fails or no output is active.
    pub fn new() -> Result<Self, X11Error> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let depth = screen.root_depth;
        let screen_px = (screen.width_in_pixels, screen.height_in_pixels);
        let screen_mm = (screen.width_in_millimeters, screen.height_in_millimeters);

        let _version = conn.randr_query_version(1, 3)?.reply()?;
        let resources = conn.randr_get_screen_resources_current(root)?.reply()?;
        let primary = conn.randr_get_output_primary(root)?.reply()?.output;

        let mut candidates: SmallVec<[randr::Output; 4]> = SmallVec::new();
        if primary != NONE {
            candidates.push(primary);
        }
        candidates.extend(resources.outputs.iter().copied().filter(|&o| o != primary));

        let mut active = None;
        for output in candidates {
            let info = conn
                .randr_get_output_info(output, resources.config_timestamp)?
                .reply()?;
            if info.connection == randr::Connection::CONNECTED && info.crtc != NONE {
                trace!(output, name = %String::from_utf8_lossy(&info.name), "using output");
                active = Some((output, info));
                break;
            }
        }
        let (output, info) = active.ok_or(X11Error::NoActiveOutput)?;

        Ok(Self {
            conn,
            root,
            depth,
            screen_px,
            screen_mm,
            output,
            crtc: info.crtc,
            config_timestamp: resources.config_timestamp,
            modes: resources.modes,
            output_modes: info.modes,
        })
    }

    fn mode_info(&self, id: randr::Mode) -> Option<&ModeInfo> {
        self.modes.iter().find(|m| m.id == id)
    }

    fn display_mode(&self, info: &ModeInfo) -> DisplayMode {
        DisplayMode {
            width: info.width.into(),
            height: info.height.into(),
            color_depth: self.depth.into(),
            refresh_rate: refresh_rate(info),
            flags: pack_flags(info),
        }
    }

    /// Millimetres for `px` pixels along the axis `(px_total, mm_total)`.
    fn millimetres(px: u16, (px_total, mm_total): (u16, u16)) -> u32 {
        if px_total == 0 {
            return 0;
        }
        (u32::from(px) * u32::from(mm_total)) / u32::from(px_total)
    }

    fn set_screen_size(&self, width: u16, height: u16) -> Result<(), X11Error> {
        let mm_width = Self::millimetres(width, (self.screen_px.0, self.screen_mm.0));
        let mm_height = Self::millimetres(height, (self.screen_px.1, self.screen_mm.1));
        trace!(width, height, mm_width, mm_height, "RRSetScreenSize");

        self.conn
            .randr_set_screen_size(self.root, width, height, mm_width, mm_height)?
            .check()?;
        Ok(())
    }

    fn active_crtc_count(&self) -> Result<usize, X11Error> {
        let resources = self.conn.randr_get_screen_resources_current(self.root)?.reply()?;
        let mut count = 0;
        for crtc in resources.crtcs {
            let info = self
                .conn
                .randr_get_crtc_info(crtc, resources.config_timestamp)?
                .reply()?;
            if info.mode != NONE {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl DisplayBackend for X11Backend {
    type Error = X11Error;

    fn current_mode(&mut self) -> Result<DisplayMode, X11Error> {
        let crtc = self
            .conn
            .randr_get_crtc_info(self.crtc, self.config_timestamp)?
            .reply()?;
        let info = self
            .mode_info(crtc.mode)
            .ok_or(X11Error::UnknownMode(crtc.mode))?;

        Ok(self.display_mode(info))
    }

    fn mode(&mut self, index: u32) -> Option<DisplayMode> {
        let id = *self.output_modes.get(index as usize)?;
        let info = self.mode_info(id)?;
        let mode = self.display_mode(info);
        trace!(index, id, dot_clock = info.dot_clock, hz = mode.refresh_rate, "output mode");

        Some(mode)
    }

    fn apply(&mut self, mode: &DisplayMode) -> Result<(), X11Error> {
        let id = mode_id(mode.flags);
        let info = self.mode_info(id).ok_or(X11Error::UnknownMode(id))?;
        let crtc = self
            .conn
            .randr_get_crtc_info(self.crtc, self.config_timestamp)?
            .reply()?;
        let screen = self.conn.get_geometry(self.root)?.reply()?;

        let needed_width = (crtc.x.max(0) as u16).saturating_add(info.width);
        let needed_height = (crtc.y.max(0) as u16).saturating_add(info.height);
        let grown = grown_screen_size((screen.width, screen.height), (needed_width, needed_height));
        if let Some((width, height)) = grown {
            self.set_screen_size(width, height)?;
        }

        let result = self
            .conn
            .randr_set_crtc_config(
                self.crtc,
                CURRENT_TIME,
                self.config_timestamp,
                crtc.x,
                crtc.y,
                id,
                crtc.rotation,
                &crtc.outputs,
            )
            .map_err(X11Error::from)
            .and_then(|cookie| Ok(cookie.reply()?))
            .and_then(|reply| {
                if reply.status == SetConfig::SUCCESS {
                    Ok(())
                } else {
                    Err(X11Error::Rejected(reply.status))
                }
            });

        if let Err(e) = result {
            // The CRTC kept its old mode, so the screen goes back to its old size.
            if grown.is_some()
                && let Err(restore) = self.set_screen_size(screen.width, screen.height)
            {
                trace!(error = %restore, "could not restore the screen size");
            }
            return Err(e);
        }

        // A lone output should not leave unused screen area behind.
        if (needed_width < screen.width || needed_height < screen.height)
            && self.active_crtc_count()? == 1
            && let Err(e) = self.set_screen_size(needed_width, needed_height)
        {
            trace!(error = %e, "could not shrink the screen");
        }

        Ok(())
    }

    fn clone_displays(&mut self) -> Result<(), X11Error> {
        let resources = self.conn.randr_get_screen_resources_current(self.root)?.reply()?;
        let primary = self
            .conn
            .randr_get_crtc_info(self.crtc, resources.config_timestamp)?
            .reply()?;
        let (width, height) = (primary.width, primary.height);

        let mut failures: SmallVec<[SetConfig; 4]> = SmallVec::new();
        for output in resources.outputs.iter().copied().filter(|&o| o != self.output) {
            let info = self
                .conn
                .randr_get_output_info(output, resources.config_timestamp)?
                .reply()?;
            if info.connection != randr::Connection::CONNECTED {
                continue;
            }

            let Some(mode) = info.modes.iter().copied().find(|&id| {
                resources
                    .modes
                    .iter()
                    .any(|m| m.id == id && m.width == width && m.height == height)
            }) else {
                trace!(output, width, height, "output has no matching mode");
                continue;
            };

            let crtc = if info.crtc != NONE {
                Some(info.crtc)
            } else {
                let mut free = None;
                for &candidate in &info.crtcs {
                    let crtc_info = self
                        .conn
                        .randr_get_crtc_info(candidate, resources.config_timestamp)?
                        .reply()?;
                    if crtc_info.outputs.is_empty() {
                        free = Some(candidate);
                        break;
                    }
                }
                free
            };
            let Some(crtc) = crtc else {
                trace!(output, "no free CRTC for output");
                continue;
            };

            let reply = self
                .conn
                .randr_set_crtc_config(
                    crtc,
                    CURRENT_TIME,
                    resources.config_timestamp,
                    primary.x,
                    primary.y,
                    mode,
                    primary.rotation,
                    &[output],
                )?
                .reply()?;
            if reply.status != SetConfig::SUCCESS {
                failures.push(reply.status);
            }
        }

        match failures.first() {
            Some(&status) => Err(X11Error::Rejected(status)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_info(width: u16, height: u16, dot_clock: u32, htotal: u16, vtotal: u16) -> ModeInfo {
        ModeInfo {
            id: 0x4a,
            width,
            height,
            dot_clock,
            hsync_start: 0,
            hsync_end: 0,
            htotal,
            hskew: 0,
            vsync_start: 0,
            vsync_end: 0,
            vtotal,
            name_len: 0,
            mode_flags: ModeFlag::from(0u32),
        }
    }

    #[test]
    fn refresh_rate_rounds_to_nearest_hz() {
        // 1920x1080 CEA timing.
        assert_eq!(refresh_rate(&mode_info(1920, 1080, 148_500_000, 2200, 1125)), 60);
        // 59.94 Hz variant.
        assert_eq!(refresh_rate(&mode_info(1920, 1080, 148_351_648, 2200, 1125)), 60);
        assert_eq!(refresh_rate(&mode_info(640, 480, 25_175_000, 800, 525)), 60);
    }

    #[test]
    fn refresh_rate_of_degenerate_mode_is_zero() {
        assert_eq!(refresh_rate(&mode_info(640, 480, 25_175_000, 0, 525)), 0);
    }

    #[test]
    fn interlaced_modes_count_fields() {
        let mut info = mode_info(1920, 1080, 74_250_000, 2200, 1125);
        info.mode_flags = ModeFlag::INTERLACE;

        assert_eq!(refresh_rate(&info), 60);
    }

    #[test]
    fn screen_grows_only_when_the_mode_does_not_fit() {
        assert_eq!(grown_screen_size((1024, 768), (1280, 1024)), Some((1280, 1024)));
        assert_eq!(grown_screen_size((1920, 768), (1280, 1024)), Some((1920, 1024)));
        assert_eq!(grown_screen_size((1024, 768), (1024, 768)), None);
        assert_eq!(grown_screen_size((1024, 768), (800, 600)), None);
    }

    #[test]
    fn flags_round_trip_the_mode_id() {
        let info = mode_info(800, 600, 40_000_000, 1056, 628);

        assert_eq!(mode_id(pack_flags(&info)), 0x4a);
    }
}
