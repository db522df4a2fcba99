//! Configuration surface for opening documents.

pub mod builder;

pub use builder::{DocumentBuilder, OpenOptions};
