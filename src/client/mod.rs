pub mod effects;
pub mod offline_queue;
pub mod report_form;
pub mod store;
