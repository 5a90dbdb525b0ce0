pub mod tick;
pub mod smoothing;
pub mod volatility;
pub mod composer;
pub mod engine;
pub mod ticker;
