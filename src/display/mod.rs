pub mod report;
pub mod summary;

pub use report::ReportWriter;
pub use summary::Summary;
