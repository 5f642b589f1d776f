use serde::{Deserialize, Serialize};

/// Settings the core reads from the whitelist store on every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub enabled: bool,
    pub hard_hide: bool,
    pub show_all_temporary: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_hide: false,
            show_all_temporary: false,
        }
    }
}

/// The one display mode that is authoritative for a given set of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Filtering disabled entirely.
    Off,
    /// Temporary "show everything" override.
    ShowAll,
    HardHide,
    Collapse,
}

impl FilterSettings {
    /// `enabled=false` beats everything, then `show_all_temporary`, then `hard_hide`.
    pub fn mode(&self) -> DisplayMode {
        if !self.enabled {
            DisplayMode::Off
        } else if self.show_all_temporary {
            DisplayMode::ShowAll
        } else if self.hard_hide {
            DisplayMode::HardHide
        } else {
            DisplayMode::Collapse
        }
    }

    /// True when no message may be suppressed under these settings.
    pub fn shows_everything(&self) -> bool {
        matches!(self.mode(), DisplayMode::Off | DisplayMode::ShowAll)
    }
}
