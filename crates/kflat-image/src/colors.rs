//! ANSI styling for image dumps, keyed by what is being printed.

/// Escape sequences for each dump role; empty strings when colour is off.
#[derive(Clone, Copy, Debug)]
pub struct Colors {
    /// Root names.
    pub root: &'static str,
    /// Offsets a pointer resolves to.
    pub target: &'static str,
    /// Tag bits carried by a pointer slot.
    pub tag: &'static str,
    /// Node extents and null targets.
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Default for Colors {
    fn default() -> Self {
        Self::OFF
    }
}

impl Colors {
    pub const ON: Self = Self {
        root: "\x1b[34m",
        target: "\x1b[32m",
        tag: "\x1b[33m",
        muted: "\x1b[2m",
        reset: "\x1b[0m",
    };

    pub const OFF: Self = Self {
        root: "",
        target: "",
        tag: "",
        muted: "",
        reset: "",
    };

    pub fn new(enabled: bool) -> Self {
        if enabled { Self::ON } else { Self::OFF }
    }

    pub fn is_enabled(&self) -> bool {
        !self.reset.is_empty()
    }
}
