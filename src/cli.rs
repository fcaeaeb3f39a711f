//! Interfaz de línea de comandos.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(name = "portwatch")]
#[command(about = "Qué hay en tus puertos de desarrollo, y cómo liberarlos")]
#[command(version)]
pub struct Cli {
    /// Archivo de configuración JSON (por defecto ./.portmonitor)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Imprime el JSON indentado
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Lista vigilada sin subcomando (`portwatch 3000 8000`)
    #[command(flatten)]
    pub watch: WatchArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Instantánea JSON de los puertos vigilados
    Scan(WatchArgs),

    /// Instantánea JSON de todos los puertos en escucha
    All,

    /// Termina un proceso (SIGTERM y, si falla, SIGKILL)
    Kill {
        /// PID del proceso
        #[arg(value_name = "PID")]
        pid: String,
    },

    /// Dashboard en la bandeja del sistema
    Tray(WatchArgs),
}

/// Argumentos que eligen la lista de puertos vigilados.
#[derive(Debug, Default, Clone, Args)]
pub struct WatchArgs {
    /// Puertos a vigilar (separados por espacios)
    #[arg(value_name = "PORTS")]
    pub ports: Vec<u16>,

    /// Puertos a vigilar (separados por comas)
    #[arg(short, long, value_delimiter = ',', value_name = "PORTS")]
    pub watch: Vec<u16>,

    /// Intervalo de refresco del dashboard en milisegundos
    #[arg(short, long, value_name = "MS")]
    pub refresh: Option<u64>,
}

impl WatchArgs {
    /// Completa los campos vacíos con los de `outer` (los argumentos
    /// dados antes del subcomando).
    pub fn or(self, outer: WatchArgs) -> WatchArgs {
        WatchArgs {
            ports: if self.ports.is_empty() { outer.ports } else { self.ports },
            watch: if self.watch.is_empty() { outer.watch } else { self.watch },
            refresh: self.refresh.or(outer.refresh),
        }
    }
}

impl From<WatchArgs> for Overrides {
    fn from(args: WatchArgs) -> Self {
        Overrides {
            positional_ports: args.ports,
            watch: args.watch,
            refresh: args.refresh,
        }
    }
}

/// Serializa `value` a JSON, compacto o indentado.
pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_with_positional_and_watch() {
        let cli = Cli::parse_from(["portwatch", "scan", "3000", "8000", "-w", "5432,6379"]);
        match cli.command {
            Some(Commands::Scan(args)) => {
                assert_eq!(args.ports, vec![3000, 8000]);
                assert_eq!(args.watch, vec![5432, 6379]);
            }
            other => panic!("comando inesperado: {other:?}"),
        }
    }

    /// Puertos posicionales sin subcomando
    #[test]
    fn test_top_level_positional_ports() {
        let cli = Cli::try_parse_from(["portwatch", "3000", "8000"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.watch.ports, vec![3000, 8000]);
    }

    /// --watch sin subcomando
    #[test]
    fn test_top_level_watch_flag() {
        let cli = Cli::try_parse_from(["portwatch", "-w", "3000,8000", "-r", "500"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.watch.watch, vec![3000, 8000]);
        assert_eq!(cli.watch.refresh, Some(500));
    }

    /// Los argumentos del subcomando tienen prioridad sobre los de fuera
    #[test]
    fn test_watch_args_or() {
        let inner = WatchArgs {
            ports: vec![4000],
            ..Default::default()
        };
        let outer = WatchArgs {
            ports: vec![3000],
            watch: vec![5432],
            refresh: Some(250),
        };
        let merged = inner.or(outer);
        assert_eq!(merged.ports, vec![4000]);
        assert_eq!(merged.watch, vec![5432]);
        assert_eq!(merged.refresh, Some(250));
    }

    #[test]
    fn test_kill_keeps_raw_pid() {
        let cli = Cli::parse_from(["portwatch", "--pretty", "kill", "abc"]);
        assert!(cli.pretty);
        assert!(matches!(cli.command, Some(Commands::Kill { pid }) if pid == "abc"));
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::parse_from(["portwatch"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["portwatch", "scan", "70000"]).is_err());
    }

    #[test]
    fn test_render_json() {
        assert_eq!(render_json(&vec![1, 2], false).unwrap(), "[1,2]");
        assert!(render_json(&vec![1, 2], true).unwrap().contains('\n'));
    }
}
