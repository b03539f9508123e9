use tracing::{debug, info, warn};

use crate::{DisplayBackend, DisplayMode, Error, Form, Resolution};

/// A snapshot of the display modes the operating system supports.
///
/// The snapshot is taken once, in [`ModeRegistry::new`]. Afterwards only the
/// current mode changes, and only when [`ModeRegistry::set_resolution`] succeeds.
pub struct ModeRegistry<B: DisplayBackend> {
    backend: B,
    initial: DisplayMode,
    current: DisplayMode,
    modes: Vec<DisplayMode>,
}

impl<B: DisplayBackend> ModeRegistry<B> {
    /// Queries the active mode and enumerates every supported mode.
    ///
    /// # Errors
    /// Returns [`Error::Enumeration`] if the active mode cannot be queried.
    pub fn new(mut backend: B) -> Result<Self, Error> {
        let initial = backend
            .current_mode()
            .map_err(|e| Error::Enumeration(Box::new(e)))?;

        let mut modes = Vec::new();
        let mut index = 0;
        while let Some(mode) = backend.mode(index) {
            modes.push(mode);
            index += 1;
        }

        debug!(
            count = modes.len(),
            initial = %initial.render(Form::Long),
            "enumerated display modes"
        );

        Ok(Self {
            backend,
            current: initial.clone(),
            initial,
            modes,
        })
    }

    /// The mode that was active when the registry was created.
    pub fn initial_mode(&self) -> &DisplayMode {
        &self.initial
    }

    /// The last successfully applied mode, or the initial one.
    pub fn current_mode(&self) -> &DisplayMode {
        &self.current
    }

    /// Every enumerated mode, in the order the platform reported them.
    pub fn modes(&self) -> &[DisplayMode] {
        &self.modes
    }

    pub fn render_initial(&self, form: Form) -> String {
        self.initial.render(form)
    }

    pub fn render_current(&self, form: Form) -> String {
        self.current.render(form)
    }

    /// Renders every mode in enumeration order, dropping strings already seen.
    ///
    /// With [`Form::Short`] this collapses the list to distinct resolutions.
    pub fn list_all(&self, form: Form) -> Vec<String> {
        let mut rendered: Vec<String> = Vec::new();

        for mode in &self.modes {
            let line = mode.render(form);
            if !rendered.contains(&line) {
                rendered.push(line);
            }
        }

        rendered
    }

    /// Finds the mode with the given dimensions and the highest color depth,
    /// preferring the highest refresh rate among equal depths.
    ///
    /// On a full tie the earliest enumerated mode wins.
    pub fn find_best(&self, width: u32, height: u32) -> Option<&DisplayMode> {
        self.modes
            .iter()
            .filter(|mode| mode.width == width && mode.height == height)
            .reduce(|best, mode| {
                if (mode.color_depth, mode.refresh_rate) > (best.color_depth, best.refresh_rate) {
                    mode
                } else {
                    best
                }
            })
    }

    /// Applies the best mode matching `target`, which has the form `WIDTHxHEIGHT`.
    ///
    /// Returns `Ok(false)` if the platform rejected the change. The current mode
    /// is left untouched in that case.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if `target` cannot be parsed.
    /// - [`Error::NotFound`] if no enumerated mode has those dimensions.
    pub fn set_resolution(&mut self, target: &str) -> Result<bool, Error> {
        let resolution = target.parse()?;
        self.set_mode(resolution)
    }

    /// Same as [`ModeRegistry::set_resolution`] with an already parsed target.
    pub fn set_mode(&mut self, resolution: Resolution) -> Result<bool, Error> {
        let Some(mode) = self.find_best(resolution.width, resolution.height).cloned() else {
            return Err(Error::NotFound(resolution.to_string()));
        };

        debug!(mode = %mode.render(Form::Long), flags = mode.flags.raw(), "selected display mode");

        match self.backend.apply(&mode) {
            Ok(()) => {
                info!(mode = %mode.render(Form::Long), "display mode applied");
                self.current = mode;
                Ok(true)
            }
            Err(e) => {
                warn!(mode = %mode.render(Form::Long), error = %e, "display mode was rejected");
                Ok(false)
            }
        }
    }

    /// Asks the platform to mirror all displays. The outcome is not checked.
    pub fn clone_displays(&mut self) {
        if let Err(e) = self.backend.clone_displays() {
            debug!(error = %e, "clone displays request failed");
        }
    }
}
