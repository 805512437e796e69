//! tasktree - Hierarchical Task Library
//!
//! This library provides the core of the tasktree CLI: a persistent task
//! store mirrored into an in-memory parent/child hierarchy, with undo of
//! recent mutations and a FIFO queue of scheduled tasks.
//!
//! # Core Concepts
//!
//! - **Hierarchy**: identity-keyed tree rebuilt from the store, orphans excluded
//! - **Undo**: one global LIFO history of create, update, delete and complete
//! - **Schedule**: FIFO holding area of task snapshots
//! - **Notifications**: every change is announced through a [`notify::Notifier`]
//!
//! # Module Organization
//!
//! - `model`: `Task`, `TaskId` and status markers
//! - `hierarchy`: the in-memory tree and its rebuild
//! - `undo`: undo actions, outcomes and the stack
//! - `schedule`: the scheduled-task queue
//! - `store`: the persistence contract plus memory and JSON stores
//! - `notify`: events, notifiers and the audit log
//! - `coordinator`: the service tying store, mirror, undo and queue together
//! - `config`: configuration loading from `.tasktree.toml`
//! - `error`: error types and result aliases
//! - `lock`: file locking and atomic writes
//! - `output`: human and JSON rendering for the CLI
//! - `cli`: command-line interface using clap

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hierarchy;
pub mod lock;
pub mod model;
pub mod notify;
pub mod output;
pub mod schedule;
pub mod store;
pub mod undo;

pub use coordinator::{CoordinatorSettings, TaskCoordinator};
pub use error::{Error, Result};
pub use model::{Task, TaskId};
