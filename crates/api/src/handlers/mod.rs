pub mod context;
pub mod presets;
pub mod review;
pub mod rules;
pub mod sheets;
