// File: feedguard-core/src/filter/policy.rs

use feedguard_common::models::{DisplayMode, FilterAction, FilterSettings};

/// Map one message's facts to a display action.
///
/// Priority order:
///  1. an explicit per-message "visible" toggle always shows,
///  2. show-all or disabled settings show,
///  3. whitelisted authors show,
///  4. hard-hide removes,
///  5. everything else collapses.
pub fn decide(is_whitelisted: bool, settings: &FilterSettings, toggle_override: Option<bool>) -> FilterAction {
    if toggle_override == Some(true) {
        return FilterAction::Show;
    }
    match settings.mode() {
        DisplayMode::Off | DisplayMode::ShowAll => FilterAction::Show,
        _ if is_whitelisted => FilterAction::Show,
        DisplayMode::HardHide => FilterAction::Remove,
        DisplayMode::Collapse => FilterAction::Collapse,
    }
}

/// Whether a shown message should carry the "whitelisted" indicator.
pub fn whitelisted_badge(is_whitelisted: bool, settings: &FilterSettings) -> bool {
    is_whitelisted && !settings.shows_everything()
}
