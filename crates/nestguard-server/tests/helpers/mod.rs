//! Test helpers para nestguard-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod doubles;

pub use client::{TestClient, TestResponse};
pub use doubles::*;
