//! # PortWatch 🔭
//!
//! Muestra qué procesos escuchan en tus puertos de desarrollo, desde qué
//! directorio y en qué rama git, y permite liberar un puerto terminando
//! el proceso.
//!
//! ## Uso
//! - `portwatch scan 3000 8000`: JSON con el estado de los puertos vigilados
//! - `portwatch all`: JSON con todos los puertos en escucha
//! - `portwatch kill 1234`: termina el proceso (SIGTERM, luego SIGKILL)
//! - `portwatch tray`: dashboard en la bandeja del sistema (Linux)
//!
//! Sin subcomando se abre el tray en Linux y se imprime `scan` en el resto;
//! `portwatch 3000 8000` o `portwatch -w 3000,8000` eligen sus puertos.

use clap::Parser;
use serde::Serialize;

use portwatch::cli::{render_json, Cli, Commands, WatchArgs};
use portwatch::config::{self, Config};
use portwatch::{KillReport, Scanner, Terminator};

/// Desvincula el proceso de la terminal que lo inició.
///
/// Llama a `setsid()` para crear una nueva sesión de proceso sin
/// terminal de control. Esto evita que el proceso reciba la señal
/// SIGHUP cuando la terminal padre se cierra, permitiendo que
/// `portwatch tray &` funcione igual que `nohup portwatch tray &`.
#[cfg(target_os = "linux")]
fn daemonize() {
    // setsid() falla si el proceso ya es líder de sesión; en ese caso
    // ya está correctamente desenganchado
    if let Err(err) = nix::unistd::setsid() {
        log::debug!("setsid() no aplicable en este contexto: {err}");
    }
}

/// Imprime un valor como JSON en stdout.
fn print_json<T: Serialize>(value: &T, pretty: bool) -> bool {
    match render_json(value, pretty) {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(err) => {
            log::error!("No se pudo serializar la respuesta: {err}");
            false
        }
    }
}

/// Carga la configuración con las tres capas.
fn load_config(cli: &Cli, watch: WatchArgs) -> Config {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    config::load(&path, watch.into())
}

#[cfg(target_os = "linux")]
fn run_tray(config: Config) -> bool {
    log::info!("Vigilando puertos: {:?}", config.ports);
    log::info!("Intervalo de refresco: {:?}", config.refresh);
    daemonize();
    portwatch::tray::run_tray(config);
    true
}

#[cfg(not(target_os = "linux"))]
fn run_tray(_config: Config) -> bool {
    log::error!("El dashboard de bandeja solo está disponible en Linux");
    false
}

/// Punto de entrada principal de PortWatch.
fn main() {
    // Inicializar logging (nivel INFO por defecto, configurable con RUST_LOG).
    // Va a stderr, así que no se mezcla con el JSON de stdout.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let mut cli = Cli::parse();
    log::debug!("PortWatch v{} iniciando...", env!("CARGO_PKG_VERSION"));

    // Los argumentos dados sin subcomando alimentan al comando por defecto
    let outer = std::mem::take(&mut cli.watch);
    let command = cli.command.take().unwrap_or_else(|| {
        if cfg!(target_os = "linux") {
            Commands::Tray(WatchArgs::default())
        } else {
            Commands::Scan(WatchArgs::default())
        }
    });

    let ok = match command {
        Commands::Scan(watch) => {
            let config = load_config(&cli, watch.or(outer));
            let scanner = Scanner::native(&config.timeouts);
            print_json(&scanner.scan_watch(&config.ports), cli.pretty)
        }
        Commands::All => {
            let config = load_config(&cli, WatchArgs::default());
            let scanner = Scanner::native(&config.timeouts);
            print_json(&scanner.scan_all(), cli.pretty)
        }
        Commands::Kill { pid } => {
            let config = load_config(&cli, WatchArgs::default());
            let terminator = Terminator::native(config.timeouts.signal);
            let report = KillReport::from(terminator.terminate(&pid));
            print_json(&report, cli.pretty) && report.success
        }
        Commands::Tray(watch) => {
            let config = load_config(&cli, watch.or(outer));
            run_tray(config)
        }
    };

    if !ok {
        std::process::exit(1);
    }
}
