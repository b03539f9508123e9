use crate::{DisplayBackend, DisplayMode, ModeFlags};

pub(crate) fn mode(width: u32, height: u32, color_depth: u32, refresh_rate: u32) -> DisplayMode {
    DisplayMode {
        width,
        height,
        color_depth,
        refresh_rate,
        flags: ModeFlags::default(),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fake backend failure")]
pub(crate) struct FakeError;

/// A backend that reports a fixed list of modes and records every request.
pub(crate) struct FakeBackend {
    pub current: DisplayMode,
    pub modes: Vec<DisplayMode>,
    pub fail_current: bool,
    pub reject_apply: bool,
    pub fail_clone: bool,
    pub applied: Vec<DisplayMode>,
    pub clone_requests: usize,
}

impl FakeBackend {
    pub fn new(current: DisplayMode, modes: Vec<DisplayMode>) -> Self {
        Self {
            current,
            modes,
            fail_current: false,
            reject_apply: false,
            fail_clone: false,
            applied: Vec::new(),
            clone_requests: 0,
        }
    }
}

impl DisplayBackend for FakeBackend {
    type Error = FakeError;

    fn current_mode(&mut self) -> Result<DisplayMode, FakeError> {
        if self.fail_current {
            return Err(FakeError);
        }
        Ok(self.current.clone())
    }

    fn mode(&mut self, index: u32) -> Option<DisplayMode> {
        self.modes.get(index as usize).cloned()
    }

    fn apply(&mut self, mode: &DisplayMode) -> Result<(), FakeError> {
        if self.reject_apply {
            return Err(FakeError);
        }
        self.applied.push(mode.clone());
        self.current = mode.clone();
        Ok(())
    }

    fn clone_displays(&mut self) -> Result<(), FakeError> {
        self.clone_requests += 1;
        if self.fail_clone {
            return Err(FakeError);
        }
        Ok(())
    }
}
