//! Collaborator implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `file`: JSON file that remembers the last settled position

pub mod file;
pub mod mock;

pub use file::*;
pub use mock::*;
