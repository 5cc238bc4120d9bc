//! User-facing texts

pub const CHOOSE_POINT: &str = "Choose your point:";
pub const UNKNOWN_POINT: &str = "Unknown point. Choose one from the list:";
pub const ENTER_PASSWORD_AGAIN: &str = "Send the password as a text message:";
pub const WRONG_PASSWORD: &str = "Wrong password, try again:";
pub const PRESS_START: &str = "Press /start to begin a shift.";
pub const NO_ACTIVE_SHIFT: &str = "No shift is active. Press /start to begin.";
pub const ALREADY_ON_SHIFT: &str = "You are already on shift. Send /end first to change the point.";
pub const NOTHING_PENDING: &str = "No reports are due right now. You will get a reminder when one is.";
pub const CHOOSE_FROM_LIST: &str = "Choose a report from the list first.";
pub const STALE_REMINDER: &str = "This report is no longer pending.";
pub const FINISH_CURRENT_FIRST: &str = "Finish the current report first.";
pub const NO_OPEN_REPORT: &str = "No report is open.";
pub const EMPTY_REPORT: &str = "You have not added anything to the report yet!";
pub const SUBMISSION_FAILED: &str =
    "Could not send the report. Your content is kept, press \"Finish report\" to try again.";
pub const MEDIA_INCOMPLETE: &str =
    "The report text was sent, but some photos or videos could not be delivered.";
pub const SHIFT_ENDED: &str = "Shift ended. Press /start to begin a new one.";
pub const SHIFT_EXPIRED: &str = "Your shift has expired. Press /start to begin a new one.";
pub const BACKLOG_CAP: &str =
    "Your shift was ended because too many reports were left unanswered. Press /start to begin again.";
pub const RESTART_NOTICE: &str = "The bot was updated. Press /start to log in again.";

pub fn enter_password(point: &str) -> String {
    format!("Enter the password for {}:", point)
}

pub fn shift_started(point: &str) -> String {
    format!(
        "Password accepted! You are on shift at {} and will receive report reminders.",
        point
    )
}

/// Direct prompt for a single pending reminder; the next content message opens it
pub fn single_reminder(name: &str) -> String {
    format!(
        "Time for the report: {}. Send photos, videos or text, then press \"Finish report\".",
        name
    )
}

pub fn pending_list(count: usize) -> String {
    format!("You have {} pending reports. Choose one:", count)
}

pub fn report_opened(name: &str) -> String {
    format!(
        "You started the report: {}. Send photos, videos or text, then press \"Finish report\".",
        name
    )
}

pub fn content_added(name: &str) -> String {
    format!(
        "Added to the report \"{}\". When you are done, press \"Finish report\".",
        name
    )
}

pub fn report_submitted(name: &str) -> String {
    format!("Report \"{}\" sent ✅", name)
}
