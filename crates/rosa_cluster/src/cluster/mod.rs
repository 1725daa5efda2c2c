pub mod builder;
pub mod desired;
pub mod patch;
pub mod types;
pub mod validation;
