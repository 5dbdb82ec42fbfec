pub mod controller;
pub mod kind;
pub mod scripts;

pub use controller::{
    filter_queue_items, is_automation_hint_error, open_in_browser, Action, ActionResult, Controller, Osascript,
    QueueItem, ScriptRunner, StatusResult,
};
pub use kind::{default_app_for_browser, parse_browser, Browser, BrowserKind};
