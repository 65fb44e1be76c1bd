//! # SCOPEWIRE CORE LIBRARY
//!
//! **HIERARCHICAL DEPENDENCY REGISTRY AND REQUEST DISPATCH CORE**
//!
//! **ARCHITECTURE**: A tree of typed-value scopes, a pooled per-request
//! context and an ordered handler chain with explicit continuation
//! **GUARANTEE**: Every request scope is disposed and every context recycled,
//! whether the chain completes, fails or panics
//! **COMPATIBILITY**: Routing and transport are external; they hand a
//! [`request::Request`] to an [`kernel::Endpoint`] and write back its
//! [`response::Response`]

pub mod api;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod kernel;
pub mod memory;
pub mod registry;
pub mod request;
pub mod response;
