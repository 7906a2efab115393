pub mod evaluate;
pub mod evaluate_all;
pub mod history;
pub mod report;
pub mod status;
