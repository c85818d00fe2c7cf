//! The deterministic matching core: weight schemes, deal-breaker gates, gap
//! banding, weighted aggregation, and the per-pair pipeline.

pub mod experience;
pub mod gates;
pub mod location;
pub mod pipeline;
pub mod scoring;
pub mod weights;
pub mod work_auth;
