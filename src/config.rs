/// Configuración explícita de PortWatch.
///
/// Capas, de menor a mayor prioridad: valores por defecto, archivo
/// JSON `.portmonitor` y argumentos de línea de comandos. El valor
/// resultante se pasa explícitamente al escáner, al terminador y al
/// tray; no hay estado global.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Nombre del archivo de configuración buscado en el directorio actual
pub const CONFIG_FILE_NAME: &str = ".portmonitor";

/// Puertos vigilados por defecto
pub const DEFAULT_PORTS: &[u16] = &[3000, 4000, 5000, 5173, 8000, 8080];

/// Intervalo de refresco por defecto del dashboard
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(3000);

/// Límites de tiempo de cada consulta externa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Consulta de la tabla de sockets
    pub socket_query: Duration,
    /// Resolución de cwd (y de nombre de proceso en Windows)
    pub cwd: Duration,
    /// Resolución de rama git
    pub branch: Duration,
    /// Cada fase de la terminación
    pub signal: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            socket_query: Duration::from_secs(5),
            cwd: Duration::from_secs(3),
            branch: Duration::from_secs(3),
            signal: Duration::from_secs(3),
        }
    }
}

/// Configuración completa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Lista de puertos vigilados
    pub ports: Vec<u16>,
    /// Intervalo de refresco del dashboard
    pub refresh: Duration,
    /// Etiquetas legibles por puerto
    pub names: BTreeMap<u16, String>,
    /// Límites de tiempo de las consultas
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            refresh: DEFAULT_REFRESH,
            names: BTreeMap::new(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Contenido del archivo `.portmonitor`; todas las claves son opcionales
/// y las desconocidas se ignoran.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub ports: Option<Vec<u16>>,
    /// Milisegundos
    pub refresh: Option<u64>,
    pub names: Option<BTreeMap<u16, String>>,
}

/// Ajustes que llegan desde la línea de comandos.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Puertos posicionales
    pub positional_ports: Vec<u16>,
    /// Puertos de `--watch`
    pub watch: Vec<u16>,
    /// Milisegundos de `--refresh`
    pub refresh: Option<u64>,
}

impl Config {
    /// Aplica el archivo sobre la configuración actual.
    pub fn merge_file(&mut self, file: ConfigFile) {
        if let Some(ports) = file.ports {
            // Una lista vacía (o solo con ceros) conserva la anterior
            let ports = sanitize_ports(ports);
            if !ports.is_empty() {
                self.ports = ports;
            }
        }
        if let Some(refresh) = file.refresh {
            self.refresh = Duration::from_millis(refresh);
        }
        if let Some(names) = file.names {
            self.names.extend(names);
        }
    }

    /// Aplica los argumentos de línea de comandos.
    ///
    /// Prioridad de puertos: posicionales > `--watch` > archivo > defecto.
    pub fn merge_overrides(&mut self, overrides: Overrides) {
        if let Some(refresh) = overrides.refresh {
            self.refresh = Duration::from_millis(refresh);
        }

        let watch = sanitize_ports(overrides.watch);
        if !watch.is_empty() {
            self.ports = watch;
        }
        let positional = sanitize_ports(overrides.positional_ports);
        if !positional.is_empty() {
            self.ports = positional;
        }
    }

    /// Etiqueta configurada para un puerto, si existe.
    pub fn label(&self, port: u16) -> Option<&str> {
        self.names.get(&port).map(String::as_str)
    }
}

/// Lee y parsea un archivo de configuración.
///
/// # Returns
/// `Ok(None)` si el archivo no existe, `Ok(Some(..))` si se leyó,
/// `Err(ConfigError)` si no se pudo leer o está malformado.
pub fn read_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Ruta del archivo por defecto en el directorio de trabajo.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Construye la configuración final a partir de las tres capas.
///
/// Un archivo ilegible o malformado se registra y se ignora: la
/// aplicación arranca igual con los valores por defecto.
pub fn load(path: &Path, overrides: Overrides) -> Config {
    let mut config = Config::default();

    match read_config_file(path) {
        Ok(Some(file)) => {
            log::info!("Configuración cargada desde {}", path.display());
            config.merge_file(file);
        }
        Ok(None) => log::debug!("Sin archivo {}, usando valores por defecto", path.display()),
        Err(err) => log::warn!("{err}; se ignora el archivo"),
    }

    config.merge_overrides(overrides);
    config
}

/// Descarta el puerto 0, que no es un puerto vigilable.
fn sanitize_ports(ports: Vec<u16>) -> Vec<u16> {
    ports.into_iter().filter(|&port| port > 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ports, vec![3000, 4000, 5000, 5173, 8000, 8080]);
        assert_eq!(config.refresh, Duration::from_millis(3000));
        assert_eq!(config.timeouts.socket_query, Duration::from_secs(5));
        assert_eq!(config.timeouts.cwd, Duration::from_secs(3));
    }

    /// Verifica que el archivo se aplica y las claves heredadas se ignoran
    #[test]
    fn test_file_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "ports": [3000, 0, 5432], "port": 9999, "refresh": 1500, "open": true, "names": {{ "3000": "web" }} }}"#
        )
        .unwrap();

        let config = load(file.path(), Overrides::default());
        assert_eq!(config.ports, vec![3000, 5432]);
        assert_eq!(config.refresh, Duration::from_millis(1500));
        assert_eq!(config.label(3000), Some("web"));
        assert_eq!(config.label(5432), None);
    }

    /// Verifica que "ports": [] o [0] no vacían la lista vigilada
    #[test]
    fn test_file_empty_ports_keep_defaults() {
        for ports in ["[]", "[0]", "[0, 0]"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, r#"{{ "ports": {ports}, "refresh": 1000 }}"#).unwrap();

            let config = load(file.path(), Overrides::default());
            assert_eq!(config.ports, DEFAULT_PORTS.to_vec(), "ports = {ports}");
            assert_eq!(config.refresh, Duration::from_millis(1000));
        }
    }

    /// Verifica que un archivo inexistente no es un error
    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(read_config_file(&path).unwrap().is_none());
        assert_eq!(load(&path, Overrides::default()), Config::default());
    }

    /// Verifica que un archivo malformado se reporta y se ignora al cargar
    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(matches!(
            read_config_file(file.path()),
            Err(ConfigError::Malformed { .. })
        ));
        assert_eq!(load(file.path(), Overrides::default()), Config::default());
    }

    /// Verifica la prioridad posicionales > --watch > archivo
    #[test]
    fn test_port_priority() {
        let mut config = Config::default();
        config.merge_file(ConfigFile {
            ports: Some(vec![1111]),
            ..Default::default()
        });
        assert_eq!(config.ports, vec![1111]);

        let mut with_watch = config.clone();
        with_watch.merge_overrides(Overrides {
            watch: vec![2222, 3333],
            refresh: Some(500),
            ..Default::default()
        });
        assert_eq!(with_watch.ports, vec![2222, 3333]);
        assert_eq!(with_watch.refresh, Duration::from_millis(500));

        let mut with_both = config.clone();
        with_both.merge_overrides(Overrides {
            positional_ports: vec![4444],
            watch: vec![2222],
            refresh: None,
        });
        assert_eq!(with_both.ports, vec![4444]);
    }
}
