/// Modelo de datos de un escaneo: una fila por puerto.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Nombres de procesos que se consideran herramientas de desarrollo
/// (runtimes, bases de datos y servidores web habituales en local).
const DEV_PROCESSES: &[&str] = &[
    "node", "python", "python3", "ruby", "java", "deno", "bun", "php", "perl", "go", "cargo",
    "dotnet", "uvicorn", "gunicorn", "puma", "nginx", "httpd", "apache2", "postgres", "mysql",
    "mysqld", "redis-server", "redis", "mongod", "mongos", "docker-proxy",
];

/// Estado de un puerto en el momento del escaneo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Hay un socket TCP en LISTEN sobre el puerto
    Active,
    /// Nadie escucha en el puerto
    Free,
}

/// Agrupación orientativa para la interfaz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Dev,
    System,
}

/// Una fila del resultado de un escaneo.
///
/// Se construye de nuevo en cada escaneo y no tiene identidad entre
/// escaneos. Invariantes: los campos opcionales están vacíos si el
/// puerto está libre, y `branch` implica `cwd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Número del puerto
    pub port: u16,
    /// Activo o libre
    pub state: PortState,
    /// PID del proceso que escucha
    pub pid: Option<u32>,
    /// Nombre del proceso que escucha
    pub process: Option<String>,
    /// Directorio de trabajo del proceso
    pub cwd: Option<PathBuf>,
    /// Rama git del directorio de trabajo
    pub branch: Option<String>,
    /// Categoría para agrupar en la interfaz
    pub category: Category,
}

impl PortRecord {
    /// Crea un registro libre para `port`.
    pub fn free(port: u16) -> Self {
        Self {
            port,
            state: PortState::Free,
            pid: None,
            process: None,
            cwd: None,
            branch: None,
            category: Category::Dev,
        }
    }

    /// Crea un registro activo con el PID y nombre de proceso dados.
    pub fn active(port: u16, pid: u32, process: Option<String>) -> Self {
        let category = categorize_port(port, process.as_deref());
        Self {
            port,
            state: PortState::Active,
            pid: Some(pid),
            process,
            cwd: None,
            branch: None,
            category,
        }
    }

    /// Indica si el puerto está en escucha.
    pub fn is_active(&self) -> bool {
        self.state == PortState::Active
    }
}

impl std::fmt::Display for PortRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.state, self.pid) {
            (PortState::Active, Some(pid)) => {
                let process = self.process.as_deref().unwrap_or("desconocido");
                write!(f, "Puerto {}: {} (PID: {})", self.port, process, pid)?;
                if let Some(branch) = &self.branch {
                    write!(f, " [{}]", branch)?;
                }
                Ok(())
            }
            _ => write!(f, "Puerto {}: libre", self.port),
        }
    }
}

/// Clasifica un puerto según el proceso que lo ocupa.
///
/// Un nombre de herramienta de desarrollo conocida da `Dev`; cualquier
/// otra cosa, incluidos los puertos efímeros (>= 49152) y los de
/// servicios del sistema, da `System`. En Windows se ignora el sufijo
/// `.exe` del nombre de imagen.
///
/// # Arguments
/// * `port` - Número del puerto (no altera el resultado hoy)
/// * `process_name` - Nombre del proceso, si se conoce
pub fn categorize_port(port: u16, process_name: Option<&str>) -> Category {
    let name = process_name.unwrap_or_default().to_lowercase();
    let name = name.strip_suffix(".exe").unwrap_or(&name);

    if DEV_PROCESSES.contains(&name) {
        return Category::Dev;
    }

    log::trace!("Puerto {} ({}) clasificado como sistema", port, name);
    Category::System
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifica que las herramientas de desarrollo se clasifican como dev
    #[test]
    fn test_dev_process_names() {
        assert_eq!(categorize_port(3000, Some("node")), Category::Dev);
        assert_eq!(categorize_port(5432, Some("Postgres")), Category::Dev);
        assert_eq!(categorize_port(60000, Some("python3")), Category::Dev);
        assert_eq!(categorize_port(3000, Some("node.exe")), Category::Dev);
    }

    /// Verifica el resto de casos caen en system
    #[test]
    fn test_everything_else_is_system() {
        assert_eq!(categorize_port(53, Some("systemd-resolved")), Category::System);
        assert_eq!(categorize_port(3000, None), Category::System);
        assert_eq!(categorize_port(50000, Some("rapportd")), Category::System);
        assert_eq!(categorize_port(8080, Some("")), Category::System);
    }

    /// Verifica los nombres de campos y los null en JSON
    #[test]
    fn test_free_record_json() {
        let json = serde_json::to_value(PortRecord::free(4000)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "port": 4000,
                "state": "free",
                "pid": null,
                "process": null,
                "cwd": null,
                "branch": null,
                "category": "dev",
            })
        );
    }

    /// Verifica que un registro activo se categoriza al crearse
    #[test]
    fn test_active_record() {
        let record = PortRecord::active(3000, 501, Some("node".into()));
        assert!(record.is_active());
        assert_eq!(record.pid, Some(501));
        assert_eq!(record.category, Category::Dev);
        assert_eq!(record.to_string(), "Puerto 3000: node (PID: 501)");
    }
}
