use rusqlite::{params, OptionalExtension};

use super::models::{Environment, EnvironmentId, ProjectId};
use super::{constraint_code, map_unique, now, parse_time_column, validate_name, Store};
use crate::errors::{CofferError, Result};

const ENV_COLUMNS: &str = "id, project_id, name, parent_id, created_at";

fn row_to_environment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Environment> {
    Ok(Environment {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        parent_id: row.get(3)?,
        created_at: parse_time_column(row, 4)?,
    })
}

impl Store {
    /// Create an environment, optionally inheriting from `parent`.
    ///
    /// The parent must belong to the same project.
    pub fn create_environment(
        &self,
        project_id: &ProjectId,
        name: &str,
        parent: Option<&EnvironmentId>,
    ) -> Result<Environment> {
        validate_name("environment", name)?;
        self.get_project(project_id)?;

        if let Some(parent_id) = parent {
            let parent_env = self.get_environment(parent_id)?;
            if &parent_env.project_id != project_id {
                return Err(CofferError::NotFound(format!(
                    "parent environment '{}' in this project",
                    parent_env.name
                )));
            }
        }

        let id = EnvironmentId::generate();
        self.conn()
            .execute(
                "INSERT INTO environments (id, project_id, name, parent_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, project_id, name, parent, now()],
            )
            .map_err(|e| map_unique(e, || format!("environment '{name}'")))?;

        tracing::info!(
            env_id = %id,
            project_id = %project_id,
            name,
            parent = parent.map(EnvironmentId::as_str),
            "environment created"
        );
        self.get_environment(&id)
    }

    pub fn get_environment(&self, id: &EnvironmentId) -> Result<Environment> {
        self.find_environment(id)?
            .ok_or_else(|| CofferError::NotFound(format!("environment {id}")))
    }

    /// Like `get_environment`, but a missing row is `None`.
    pub fn find_environment(&self, id: &EnvironmentId) -> Result<Option<Environment>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {ENV_COLUMNS} FROM environments WHERE id = ?1"),
                [id],
                row_to_environment,
            )
            .optional()?)
    }

    pub fn get_environment_by_name(&self, project_id: &ProjectId, name: &str) -> Result<Environment> {
        self.conn()
            .query_row(
                &format!("SELECT {ENV_COLUMNS} FROM environments WHERE project_id = ?1 AND name = ?2"),
                params![project_id, name],
                row_to_environment,
            )
            .optional()?
            .ok_or_else(|| CofferError::NotFound(format!("environment '{name}'")))
    }

    /// All environments of a project, ordered by name.
    pub fn list_environments(&self, project_id: &ProjectId) -> Result<Vec<Environment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ENV_COLUMNS} FROM environments WHERE project_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map([project_id], row_to_environment)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Direct children of an environment, ordered by name.
    pub fn children(&self, id: &EnvironmentId) -> Result<Vec<Environment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ENV_COLUMNS} FROM environments WHERE parent_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map([id], row_to_environment)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete an environment and its secrets and history.
    ///
    /// Refuses while the environment still has children; the
    /// `ON DELETE RESTRICT` parent link backs this check up.
    pub fn delete_environment(&self, id: &EnvironmentId) -> Result<()> {
        let env = self.get_environment(id)?;

        let children = self.children(id)?;
        if !children.is_empty() {
            return Err(has_children(&env.name, &children));
        }

        self.conn()
            .execute("DELETE FROM environments WHERE id = ?1", [id])
            .map_err(|e| match constraint_code(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => CofferError::HasChildren {
                    name: env.name.clone(),
                    children: "unknown".into(),
                },
                _ => CofferError::Database(e),
            })?;

        tracing::info!(env_id = %id, name = %env.name, "environment deleted");
        Ok(())
    }
}

fn has_children(name: &str, children: &[Environment]) -> CofferError {
    CofferError::HasChildren {
        name: name.to_string(),
        children: children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}
