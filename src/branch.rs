/// Resolución de la rama git de un directorio.
use std::path::Path;
use std::time::Duration;

use crate::command::BoundedCommand;
use crate::error::LookupError;

/// Capacidad de obtener la rama actual de un directorio versionado.
pub trait BranchResolver: Send + Sync {
    /// Devuelve el nombre de la rama, ya recortado.
    fn resolve_branch(&self, dir: &Path) -> Result<String, LookupError>;
}

/// Resolvedor basado en `git rev-parse --abbrev-ref HEAD`.
#[derive(Debug, Clone)]
pub struct GitBranchResolver {
    /// Límite de tiempo de cada consulta
    pub timeout: Duration,
}

impl BranchResolver for GitBranchResolver {
    fn resolve_branch(&self, dir: &Path) -> Result<String, LookupError> {
        let command = BoundedCommand::new("git", self.timeout)
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir);
        let output = command.run()?.into_success(command.program())?;
        parse_branch(&output.stdout).ok_or(LookupError::NotFound)
    }
}

/// Recorta la salida de git; vacía significa "sin rama".
pub fn parse_branch(output: &str) -> Option<String> {
    let branch = output.trim();
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch() {
        assert_eq!(parse_branch("main\n").as_deref(), Some("main"));
        assert_eq!(parse_branch("  feature/login \r\n").as_deref(), Some("feature/login"));
        assert_eq!(parse_branch(""), None);
        assert_eq!(parse_branch("\n"), None);
    }

    /// Un directorio fuera de cualquier repo no tiene rama
    #[test]
    fn test_non_repository_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = GitBranchResolver {
            timeout: Duration::from_secs(3),
        };
        assert!(resolver.resolve_branch(dir.path()).is_err());
    }

    /// Un directorio inexistente tampoco
    #[test]
    fn test_missing_directory_is_unresolved() {
        let resolver = GitBranchResolver {
            timeout: Duration::from_secs(3),
        };
        let missing = Path::new("/portwatch/no/existe");
        assert!(resolver.resolve_branch(missing).is_err());
    }
}
