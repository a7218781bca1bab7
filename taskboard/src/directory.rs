//! Lookups into the surrounding platform
//!
//! Projects and users are owned elsewhere; the board engine only needs to
//! know whether an id refers to something that exists.

use crate::error::{BoardError, Result};
use crate::types::{ProjectId, UserId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

/// Existence checks for projects and users
#[async_trait]
pub trait Directory: Send + Sync {
    /// Check whether a project exists
    async fn project_exists(&self, id: &ProjectId) -> Result<bool>;

    /// Check whether a user exists
    async fn user_exists(&self, id: &UserId) -> Result<bool>;
}

/// A directory backed by fixed in-memory sets
#[derive(Debug, Default)]
pub struct StaticDirectory {
    projects: RwLock<HashSet<ProjectId>>,
    users: RwLock<HashSet<UserId>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project
    pub fn with_project(self, id: impl Into<ProjectId>) -> Self {
        self.add_project(id);
        self
    }

    /// Add a user
    pub fn with_user(self, id: impl Into<UserId>) -> Self {
        self.add_user(id);
        self
    }

    pub fn add_project(&self, id: impl Into<ProjectId>) {
        if let Ok(mut projects) = self.projects.write() {
            projects.insert(id.into());
        }
    }

    pub fn add_user(&self, id: impl Into<UserId>) {
        if let Ok(mut users) = self.users.write() {
            users.insert(id.into());
        }
    }
}

fn poisoned() -> BoardError {
    BoardError::storage("directory lock poisoned")
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn project_exists(&self, id: &ProjectId) -> Result<bool> {
        Ok(self.projects.read().map_err(|_| poisoned())?.contains(id))
    }

    async fn user_exists(&self, id: &UserId) -> Result<bool> {
        Ok(self.users.read().map_err(|_| poisoned())?.contains(id))
    }
}
