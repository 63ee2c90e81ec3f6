//! Actor catalog loader.
//!
//! Loads actor templates (players, enemies, projectiles, bosses) from RON.

use std::path::Path;

use crate::catalog::{ActorCatalog, ActorTemplate};
use crate::loaders::{LoadResult, read_file};

/// Loader for the actor catalog from RON files.
pub struct ActorLoader;

impl ActorLoader {
    /// Load an actor catalog from a RON file.
    ///
    /// RON format: `Vec<(String, ActorTemplate)>`
    ///
    /// ```ron
    /// [
    ///     ("grunt", (kind: Enemy, health: 50.0, speed: 3.0, damage: 4.0, bounty: 5)),
    /// ]
    /// ```
    pub fn load(path: &Path) -> LoadResult<ActorCatalog> {
        let content = read_file(path)?;
        Self::parse(&content).map_err(|e| anyhow::anyhow!("{} ({})", e, path.display()))
    }

    /// Parse an actor catalog from RON text.
    pub fn parse(content: &str) -> LoadResult<ActorCatalog> {
        let raw_data: Vec<(String, ActorTemplate)> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse actor catalog RON: {}", e))?;

        let mut catalog = ActorCatalog::new();
        for (name, template) in raw_data {
            catalog
                .insert(name, template)
                .map_err(|e| anyhow::anyhow!("Failed to build actor catalog: {}", e))?;
        }

        tracing::debug!(target: "combat::content", templates = catalog.len(), "loaded actor catalog");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use combat_core::ActorKind;

    use super::*;

    const CATALOG: &str = r#"[
        ("grunt", (kind: Enemy, health: 50.0, speed: 3.0, damage: 4.0, bounty: 5, tags: ["melee"])),
        ("hero", (kind: Player, health: 300.0)),
    ]"#;

    #[test]
    fn parses_templates_with_defaults() {
        let catalog = ActorLoader::parse(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let grunt = catalog.get("grunt").unwrap();
        assert_eq!(grunt.kind, ActorKind::Enemy);
        assert_eq!(grunt.tags, vec!["melee".to_string()]);

        let hero = catalog.get("hero").unwrap();
        assert_eq!(hero.speed, 0.0);
        assert_eq!(hero.bounty, 0);
    }

    #[test]
    fn duplicate_names_fail_the_load() {
        let err = ActorLoader::parse(
            r#"[("a", (kind: Enemy, health: 1.0)), ("a", (kind: Boss, health: 2.0))]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate actor template 'a'"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = ActorLoader::load(file.path()).unwrap();
        assert!(catalog.get("grunt").is_some());
    }
}
