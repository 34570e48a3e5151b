use std::io;

/// Whether a formatter should emit ANSI colors.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum ColorSetting {
    /// Color when the target is a terminal.
    #[default]
    Automatic,
    Always,
    Never,
}

impl From<bool> for ColorSetting {
    fn from(value: bool) -> Self {
        match value {
            true => Self::Always,
            false => Self::Never,
        }
    }
}

pub(crate) mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

pub trait SupportsColor {
    fn supports_color(&self) -> bool;
}

impl<T: io::IsTerminal> SupportsColor for T {
    fn supports_color(&self) -> bool {
        self.is_terminal()
    }
}
