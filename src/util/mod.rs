//! Shared utility modules used across ivfserve components.

pub mod simd;
