// Pipeline processing: field normalization, mode rules, and quality scoring

pub mod mode_filter;
pub mod normalize;
pub mod quality_gate;
