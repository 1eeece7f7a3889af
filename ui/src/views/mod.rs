mod report;
pub use report::{Report, REPORT_ROOT_ID};
