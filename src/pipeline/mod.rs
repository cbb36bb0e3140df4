pub mod background;
pub mod history;
pub mod input;
pub mod processing;
