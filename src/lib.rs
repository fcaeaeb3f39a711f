//! # PortWatch 🔭
//!
//! Motor de descubrimiento de puertos: qué proceso escucha en cada
//! puerto TCP local, desde qué directorio y en qué rama git, y cómo
//! liberar el puerto terminando ese proceso.
//!
//! ## Módulos
//! - [`scanner`]: cruza la tabla de sockets con la lista vigilada
//! - [`sockets`], [`inspector`], [`branch`]: consultas al sistema
//! - [`terminator`]: terminación en dos fases (cooperativa y forzada)
//! - [`config`], [`cli`]: configuración explícita y línea de comandos
//! - `tray`: dashboard en la bandeja del sistema (solo Linux)

pub mod branch;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod inspector;
pub mod record;
pub mod scanner;
pub mod sockets;
pub mod terminator;

#[cfg(target_os = "linux")]
pub mod tray;

pub use record::{Category, PortRecord, PortState};
pub use scanner::Scanner;
pub use terminator::{KillReport, Terminator};
