pub mod edit_log;
