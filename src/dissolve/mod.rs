pub mod consolidate;
pub mod dissolver;
pub mod key;
pub mod normalize;
pub mod pipeline;
pub mod validation;
