//! Platform contexts for Deckhand.
//!
//! This crate provides:
//! - Kubernetes platform built from a platform description

pub mod kubernetes;

pub use kubernetes::KubernetesPlatform;
