/// Taxonomía de errores de PortWatch.
///
/// Solo `TerminateError` llega al usuario: los fallos de escaneo y de
/// enriquecimiento se registran en el log y se degradan localmente.
use std::path::PathBuf;
use std::time::Duration;

/// Fallo al ejecutar un comando externo acotado en tiempo.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("comando no encontrado: {0}")]
    NotFound(String),

    #[error("no se pudo lanzar {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} superó el límite de {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} terminó con estado {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// La consulta de sockets en escucha no está disponible (`ScanUnavailable`).
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("consulta de sockets no disponible: {0}")]
    Command(#[from] CommandError),

    #[error("consulta de sockets no soportada en esta plataforma")]
    Unsupported,
}

/// Motivo por el que un dato de enriquecimiento quedó sin resolver
/// (`EnrichmentUnresolved`).
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("la salida no contiene el dato buscado")]
    NotFound,

    #[error("consulta no soportada en esta plataforma")]
    Unsupported,
}

/// Resultado fallido de una terminación de proceso.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminateError {
    #[error("Invalid PID")]
    InvalidPid,

    #[error("{0}")]
    Failed(String),
}

/// Error al cargar el archivo de configuración.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no se pudo leer {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuración malformada en {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
