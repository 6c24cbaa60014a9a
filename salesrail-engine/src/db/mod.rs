//! Entity-scoped database queries

pub mod affiliates;
pub mod appointments;
pub mod closers;
pub mod conversions;
pub mod sessions;
