pub mod course;
pub mod run_store;
