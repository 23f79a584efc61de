//! Accuracy tracking against historical polls.

pub mod framework;
pub mod report;
pub mod storage;

pub use framework::{
    calculate_validation_accuracy, ValidationError, ValidationFramework, DEFAULT_MAX_TARGETS,
    DEFAULT_MIN_SAMPLE_SIZE, DEFAULT_VALIDATION_CONCURRENCY,
};
pub use report::{
    build_accuracy_report, print_accuracy_report, print_validation_results, AccuracyReport,
};
pub use storage::{
    AccuracyRecord, ErrorAnalysis, ValidationDatabase, ValidationResult, ValidationTarget,
};
