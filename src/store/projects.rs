use rusqlite::{params, OptionalExtension};

use super::models::{Project, ProjectId};
use super::{map_unique, now, parse_time_column, validate_name, Store};
use crate::errors::{CofferError, Result};

const PROJECT_COLUMNS: &str = "id, name, description, created_at";

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_time_column(row, 3)?,
    })
}

impl Store {
    /// Create a project.  Names are unique across the vault.
    pub fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        validate_name("project", name)?;

        let id = ProjectId::generate();
        let created = now();
        self.conn()
            .execute(
                "INSERT INTO projects (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, description, created],
            )
            .map_err(|e| map_unique(e, || format!("project '{name}'")))?;

        tracing::info!(project_id = %id, name, "project created");
        self.get_project(&id)
    }

    pub fn get_project(&self, id: &ProjectId) -> Result<Project> {
        self.conn()
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| CofferError::NotFound(format!("project {id}")))
    }

    pub fn get_project_by_name(&self, name: &str) -> Result<Project> {
        self.conn()
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?1"),
                [name],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| CofferError::NotFound(format!("project '{name}'")))
    }

    /// All projects, ordered by name.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name"))?;
        let rows = stmt.query_map([], row_to_project)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a project with all its environments, secrets, and history.
    ///
    /// Parent links inside the project are cleared first so the
    /// parent-link `RESTRICT` never fires during the cascade.
    pub fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(CofferError::NotFound(format!("project {id}")));
        }

        // Detach the forest first; every environment goes away regardless.
        tx.execute(
            "UPDATE environments SET parent_id = NULL WHERE project_id = ?1",
            [id],
        )?;
        tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        tx.commit()?;

        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_fetch_project() {
        let store = Store::open_in_memory().unwrap();
        let p = store.create_project("myapp", Some("main app")).unwrap();

        assert_eq!(store.get_project(&p.id).unwrap(), p);
        assert_eq!(store.get_project_by_name("myapp").unwrap().id, p.id);
        assert_eq!(p.description.as_deref(), Some("main app"));
    }

    #[test]
    fn duplicate_project_name_conflicts() {
        let store = Store::open_in_memory().unwrap();
        store.create_project("myapp", None).unwrap();
        let err = store.create_project("myapp", None).unwrap_err();
        assert!(matches!(err, CofferError::AlreadyExists(_)));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let store = Store::open_in_memory().unwrap();
        store.create_project("zeta", None).unwrap();
        store.create_project("alpha", None).unwrap();
        let names: Vec<_> = store
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn missing_project_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.get_project_by_name("nope"),
            Err(CofferError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_project(&ProjectId::generate()),
            Err(CofferError::NotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_through_environments_and_secrets() {
        let store = Store::open_in_memory().unwrap();
        let p = store.create_project("myapp", None).unwrap();
        let base = store.create_environment(&p.id, "base", None).unwrap();
        let dev = store
            .create_environment(&p.id, "dev", Some(&base.id))
            .unwrap();
        store
            .create_secret(&dev.id, "API_KEY", b"ct", b"nonce-bytes!")
            .unwrap();

        store.delete_project(&p.id).unwrap();

        let count = |table: &str| -> i64 {
            store
                .conn()
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count("environments"), 0);
        assert_eq!(count("secrets"), 0);
        assert_eq!(count("secret_history"), 0);
    }
}
