//! Reply keyboard construction for confirmation prompts.

use crate::localization::{t_lang, LocalizationManager};
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};

/// Which confirmation is being asked; the two flows carry distinct button
/// captions so a stale keyboard cannot answer the wrong question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    /// "Discard the in-progress application and start over?"
    RestartExisting,
    /// "Cancel the current application entirely?"
    GlobalCancel,
}

/// Localized yes/no captions for a confirmation prompt
pub fn confirm_labels(
    localization: &LocalizationManager,
    kind: ConfirmKind,
    lang: &str,
) -> (String, String) {
    match kind {
        ConfirmKind::RestartExisting => (
            t_lang(localization, "confirm-cancel-yes", lang),
            t_lang(localization, "confirm-cancel-no", lang),
        ),
        ConfirmKind::GlobalCancel => (
            t_lang(localization, "confirm-action-yes", lang),
            t_lang(localization, "confirm-action-no", lang),
        ),
    }
}

/// One-time yes/no keyboard for a confirmation prompt
pub fn confirm_keyboard(
    localization: &LocalizationManager,
    kind: ConfirmKind,
    lang: &str,
) -> KeyboardMarkup {
    let (yes, no) = confirm_labels(localization, kind, lang);
    KeyboardMarkup::new([[KeyboardButton::new(yes)], [KeyboardButton::new(no)]])
        .resize_keyboard()
        .one_time_keyboard()
}

/// Clear any reply keyboard left over from a previous prompt
pub fn remove_keyboard() -> KeyboardRemove {
    KeyboardRemove::new()
}
