//! User-facing texts raised by the coordinator.

use crate::identifiers::TabId;

pub(crate) const NO_TAB_ID: &str = "No tab id found. Reopen the popup and try again.";

pub(crate) const TAB_NOT_AVAILABLE: &str =
    "The selected tab is no longer available. Reopen the popup and try again.";

pub(crate) const PAGE_UNREACHABLE: &str =
    "Unable to communicate with the page. Reload the page and try again.";

pub(crate) const REFERENCE_NOT_CAPTURED: &str =
    "Unable to capture the screenshot. Try selecting the area again.";

pub(crate) const CAPTURE_RETRY_FAILED: &str =
    "Unable to capture the screenshot. Reload the page and try again.";

pub(crate) const ORIGINAL_CAPTURE_FAILED: &str =
    "Unable to capture the original screenshot. Try selecting the area again.";

pub(crate) const REFERENCE_MISSING: &str =
    "Reference screenshot missing. Attempting to capture it again.";

pub(crate) const COMMUNICATION_PROBLEM: &str =
    "Communication problem with the page. Monitoring will continue on the next cycle.";

pub(crate) fn tab_lost(tab_id: TabId) -> String {
    format!("The monitored tab ({tab_id}) is no longer available.")
}

pub(crate) fn change_detected(tab_id: TabId) -> String {
    format!("Change detected on the monitored page! (Tab {tab_id})")
}
