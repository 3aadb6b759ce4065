//! The injected note/vault collaborator (spec §6).
//!
//! The core never touches a file system directly; Reference nodes (§4.9) drive a
//! `Vault` implementation supplied by the host application (e.g. an Obsidian
//! plugin's vault API). [`crate::mock::MockVault`] backs mock-mode runs and tests.

use crate::error::CannoliResult;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait Vault: Send + Sync {
    /// Reads a note's body, optionally scoped to a heading/block `subpath`.
    /// Returns `Ok(None)` if the note does not exist.
    async fn read_note(&self, name: &str, subpath: Option<&str>) -> CannoliResult<Option<String>>;

    /// Edits (replaces) or appends to a note's body. Returns `Ok(None)` if the note
    /// does not exist (a soft-warning condition the caller turns into a vertex
    /// warning, not an error).
    async fn edit_note(&self, name: &str, content: &str, append: bool) -> CannoliResult<Option<()>>;

    /// Creates a note at an optional folder path. Name collisions are resolved by
    /// `" n"` suffixing and the final (possibly renamed) note name is returned.
    async fn create_note_at_path(
        &self,
        name: &str,
        path: Option<&str>,
        content: Option<&str>,
    ) -> CannoliResult<Option<String>>;

    async fn get_path(&self, name: &str) -> CannoliResult<Option<String>>;

    async fn get_property(
        &self,
        name: &str,
        prop: &str,
        yaml_format: bool,
    ) -> CannoliResult<Option<String>>;

    async fn set_property(&self, name: &str, prop: &str, value: &str) -> CannoliResult<()>;

    async fn list_properties(&self, name: &str) -> CannoliResult<HashMap<String, String>>;

    async fn move_note(&self, name: &str, new_path: &str) -> CannoliResult<()>;

    async fn create_folder(&self, path: &str) -> CannoliResult<()>;
}
