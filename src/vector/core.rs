//! Core data structures for vector search.
//!
//! This module contains the owned vector representation and the distance
//! metrics shared by the store, the index structures and the service.

pub mod distance;
pub mod vector;
