//! Environment inheritance.
//!
//! An environment sees its own secrets plus those of every ancestor.
//! For any key the nearest definer wins: a child's override is never
//! shadowed by an ancestor, however recently the ancestor was edited.

use std::collections::{BTreeMap, HashSet};

use crate::errors::{CofferError, Result};
use crate::store::{Environment, EnvironmentId, MergedSecret, Store};

/// Maximum number of ancestors followed before giving up.
pub const MAX_INHERITANCE_DEPTH: usize = 10;

/// Inheritance queries built on the store's primitive lookups.
pub struct InheritanceResolver<'a> {
    store: &'a Store,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Ancestors of `env`, nearest parent first.
    ///
    /// Fails with `CircularInheritance` if an environment reappears and
    /// with `InheritanceTooDeep` if the chain is still going after
    /// `MAX_INHERITANCE_DEPTH` ancestors.
    pub fn ancestors(&self, env: &EnvironmentId) -> Result<Vec<Environment>> {
        let start = self.store.get_environment(env)?;
        self.ancestors_of(&start)
    }

    fn ancestors_of(&self, start: &Environment) -> Result<Vec<Environment>> {
        let mut chain: Vec<Environment> = Vec::new();
        let mut visited: HashSet<EnvironmentId> = HashSet::from([start.id.clone()]);
        let mut current = start.clone();

        while let Some(parent_id) = current.parent_id.clone() {
            if visited.contains(&parent_id) {
                return Err(CofferError::CircularInheritance(current.name));
            }
            if chain.len() == MAX_INHERITANCE_DEPTH {
                return Err(CofferError::InheritanceTooDeep {
                    env: start.name.clone(),
                    max: MAX_INHERITANCE_DEPTH,
                });
            }

            // A dangling parent link ends the chain.
            let Some(parent) = self.store.find_environment(&parent_id)? else {
                tracing::warn!(env = %current.name, parent_id = %parent_id, "dangling parent link");
                break;
            };

            visited.insert(parent_id);
            chain.push(parent.clone());
            current = parent;
        }

        Ok(chain)
    }

    /// Direct children of `env`, ordered by name.
    pub fn children(&self, env: &EnvironmentId) -> Result<Vec<Environment>> {
        self.store.children(env)
    }

    /// The authoritative row for `key` as seen from `env`.
    pub fn resolve_secret(&self, env: &EnvironmentId, key: &str) -> Result<MergedSecret> {
        let start = self.store.get_environment(env)?;

        if let Some(secret) = self.store.find_secret(&start.id, key)? {
            return Ok(MergedSecret {
                secret,
                source_env_id: start.id.clone(),
                source_env_name: start.name,
                inherited: false,
            });
        }

        for ancestor in self.ancestors_of(&start)? {
            if let Some(secret) = self.store.find_secret(&ancestor.id, key)? {
                tracing::debug!(key, env = %start.name, source = %ancestor.name, "resolved inherited secret");
                return Ok(MergedSecret {
                    secret,
                    source_env_id: ancestor.id,
                    source_env_name: ancestor.name,
                    inherited: true,
                });
            }
        }

        Err(CofferError::NotFound(format!("secret '{key}'")))
    }

    /// Every key visible from `env`, ordered by key.
    ///
    /// The chain is folded from the most distant ancestor toward `env`
    /// so nearer definitions overwrite farther ones.
    pub fn resolve_all(&self, env: &EnvironmentId) -> Result<Vec<MergedSecret>> {
        let start = self.store.get_environment(env)?;
        let mut chain = vec![start.clone()];
        chain.extend(self.ancestors_of(&start)?);

        let mut merged: BTreeMap<String, MergedSecret> = BTreeMap::new();
        for definer in chain.iter().rev() {
            for secret in self.store.list_secrets(&definer.id)? {
                merged.insert(
                    secret.key.clone(),
                    MergedSecret {
                        secret,
                        source_env_id: definer.id.clone(),
                        source_env_name: definer.name.clone(),
                        inherited: definer.id != start.id,
                    },
                );
            }
        }

        Ok(merged.into_values().collect())
    }
}
