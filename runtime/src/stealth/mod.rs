//! Request identity and pacing.
//!
//! Rotates Googlebot-style user agents and adds randomized delays between
//! a worker's consecutive fetches.

pub mod behavior;
pub mod fingerprint;
