// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # agentmesh-std
//!
//! `std`-only storage backend for `agentmesh-core`.
//!
//! This crate provides [`FileStorage`], a JSON file-backed implementation of
//! the [`Storage`] trait suitable for CLI tools, single-node agents, and
//! server-side deployments that do not need a full database.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use agentmesh_std::FileStorage;
//! use agentmesh_core::{engine::AgentMeshEngine, config::Config};
//!
//! let storage = FileStorage::open("/var/lib/agentmesh/state.json")
//!     .expect("failed to open storage file");
//!
//! let engine = AgentMeshEngine::new(Config::default(), storage);
//! ```

pub mod storage;

pub use storage::file::FileStorage;
