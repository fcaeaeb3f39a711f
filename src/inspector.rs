/// Resolución del directorio de trabajo de un proceso.
use std::path::PathBuf;
use std::time::Duration;

use crate::command::BoundedCommand;
use crate::error::LookupError;

/// Capacidad de resolver el directorio de trabajo de un PID.
pub trait CwdResolver: Send + Sync {
    /// Devuelve la ruta absoluta del cwd del proceso.
    fn resolve_cwd(&self, pid: u32) -> Result<PathBuf, LookupError>;
}

/// Devuelve el resolvedor nativo de la plataforma actual.
pub fn native_inspector(timeout: Duration) -> Box<dyn CwdResolver> {
    if cfg!(target_os = "windows") {
        Box::new(UnsupportedCwd)
    } else {
        Box::new(LsofCwdResolver { timeout })
    }
}

/// Resolvedor basado en `lsof -p PID -a -d cwd -Fn`.
#[derive(Debug, Clone)]
pub struct LsofCwdResolver {
    /// Límite de tiempo de cada consulta
    pub timeout: Duration,
}

impl CwdResolver for LsofCwdResolver {
    fn resolve_cwd(&self, pid: u32) -> Result<PathBuf, LookupError> {
        let command = BoundedCommand::new("lsof", self.timeout).args([
            "-p".to_string(),
            pid.to_string(),
            "-a".to_string(),
            "-d".to_string(),
            "cwd".to_string(),
            "-Fn".to_string(),
        ]);
        let output = command.run()?.into_success(command.program())?;
        parse_lsof_cwd(&output.stdout).ok_or(LookupError::NotFound)
    }
}

/// Plataformas sin forma nativa de leer el cwd de otro proceso.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedCwd;

impl CwdResolver for UnsupportedCwd {
    fn resolve_cwd(&self, _pid: u32) -> Result<PathBuf, LookupError> {
        Err(LookupError::Unsupported)
    }
}

/// Extrae la primera ruta absoluta de la salida `-Fn` de lsof.
///
/// Formato esperado (un campo por línea, prefijado por su tipo):
/// ```text
/// p501
/// fcwd
/// n/home/dev/app
/// ```
pub fn parse_lsof_cwd(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix('n'))
        .find(|path| path.starts_with('/'))
        .map(PathBuf::from)
}
