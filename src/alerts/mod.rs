mod scanner;
mod toggle;

pub use scanner::{ReminderScanner, ScannerSettings};
pub use toggle::AlertService;
