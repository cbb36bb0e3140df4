pub mod esg;
pub mod mask;
pub mod spectrum;
