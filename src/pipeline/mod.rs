pub mod effects;
pub mod export;
pub mod persistence;
pub mod project;
