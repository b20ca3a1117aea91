//! Shared configuration structures and loading logic.

pub mod scenario;
