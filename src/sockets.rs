/// Módulo de consulta de sockets TCP en escucha.
///
/// Expone una única capacidad, `ListenerSource`, con un adaptador por
/// plataforma: `lsof` en sistemas POSIX y `netstat -ano` en Windows.
/// El motor de escaneo nunca pregunta por la plataforma; solo llama
/// a la capacidad.
use std::time::Duration;

use crate::command::{BoundedCommand, CommandOutput};
use crate::error::{LookupError, ScanError};

/// Una entrada LISTEN de la tabla de sockets del sistema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    /// Puerto local
    pub port: u16,
    /// PID del proceso dueño del socket
    pub pid: u32,
    /// Nombre del proceso, si la herramienta lo reporta
    pub process: Option<String>,
}

/// Capacidad de enumerar los sockets en escucha del sistema.
pub trait ListenerSource: Send + Sync {
    /// Devuelve las entradas LISTEN en el orden en que las reporta el sistema.
    fn listeners(&self) -> Result<Vec<Listener>, ScanError>;

    /// Resuelve el nombre de un proceso cuando `listeners` no lo trae.
    fn process_name(&self, _pid: u32) -> Result<String, LookupError> {
        Err(LookupError::Unsupported)
    }
}

/// Devuelve el adaptador nativo de la plataforma actual.
pub fn native_source(timeout: Duration, name_timeout: Duration) -> Box<dyn ListenerSource> {
    if cfg!(target_os = "windows") {
        Box::new(NetstatSource {
            timeout,
            name_timeout,
        })
    } else {
        Box::new(LsofSource { timeout })
    }
}

// ─────────────────────────────────────────────────────────────
// POSIX: lsof
// ─────────────────────────────────────────────────────────────

/// Adaptador basado en `lsof -iTCP -sTCP:LISTEN -P -n`.
#[derive(Debug, Clone)]
pub struct LsofSource {
    /// Límite de tiempo de la consulta
    pub timeout: Duration,
}

impl ListenerSource for LsofSource {
    fn listeners(&self) -> Result<Vec<Listener>, ScanError> {
        let command = BoundedCommand::new("lsof", self.timeout)
            .args(["-iTCP", "-sTCP:LISTEN", "-P", "-n"]);
        interpret_lsof(command.run()?)
    }
}

/// Interpreta el resultado de `lsof` según su salida y su estado.
///
/// lsof sale con 1 tanto si no hay sockets como si algún descriptor no
/// pudo leerse, así que el estado por sí solo no decide:
/// - sin stdout ni stderr: tabla vacía
/// - sin stdout y con stderr: fallo de la consulta
/// - con stdout: se parsea, sea cual sea el estado
pub fn interpret_lsof(output: CommandOutput) -> Result<Vec<Listener>, ScanError> {
    if output.stdout.trim().is_empty() {
        if !output.stderr.trim().is_empty() {
            output.into_success("lsof")?;
        }
        return Ok(Vec::new());
    }

    Ok(parse_lsof_output(&output.stdout))
}

/// Parsea la salida tabular de `lsof`.
///
/// Formato esperado (la primera línea es la cabecera):
/// ```text
/// COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
/// node      501 dev    23u  IPv6 0x1234      0t0  TCP *:3000 (LISTEN)
/// ```
///
/// # Arguments
/// * `output` - Salida cruda de lsof
///
/// # Returns
/// Las entradas parseables, en el orden de la salida.
pub fn parse_lsof_output(output: &str) -> Vec<Listener> {
    output
        .lines()
        .skip(1)
        .filter_map(parse_lsof_line)
        .collect()
}

/// Parsea una línea de datos de `lsof`.
fn parse_lsof_line(line: &str) -> Option<Listener> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }

    let process = parts[0].to_string();
    let pid = parts[1].parse::<u32>().ok()?;
    let port = extract_trailing_port(parts[8])?;

    Some(Listener {
        port,
        pid,
        process: Some(process),
    })
}

/// Extrae el puerto del final de una dirección `HOST:PUERTO`.
///
/// Maneja IPv4 (`127.0.0.1:8080`), IPv6 (`[::1]:8080`) y comodines
/// (`*:8080`). Rechaza `*` y el puerto 0.
fn extract_trailing_port(address: &str) -> Option<u16> {
    let (_, port_str) = address.rsplit_once(':')?;
    if port_str.is_empty() || !port_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match port_str.parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────
// Windows: netstat + tasklist
// ─────────────────────────────────────────────────────────────

/// Adaptador basado en `netstat -ano`, con nombres vía `tasklist`.
#[derive(Debug, Clone)]
pub struct NetstatSource {
    /// Límite de tiempo de la consulta de sockets
    pub timeout: Duration,
    /// Límite de tiempo de cada consulta de nombre
    pub name_timeout: Duration,
}

impl ListenerSource for NetstatSource {
    fn listeners(&self) -> Result<Vec<Listener>, ScanError> {
        let command = BoundedCommand::new("netstat", self.timeout).arg("-ano");
        let output = command.run()?.into_success(command.program())?;
        Ok(parse_netstat_output(&output.stdout))
    }

    fn process_name(&self, pid: u32) -> Result<String, LookupError> {
        let command = BoundedCommand::new("tasklist", self.name_timeout).args([
            "/FI".to_string(),
            format!("PID eq {}", pid),
            "/FO".to_string(),
            "CSV".to_string(),
            "/NH".to_string(),
        ]);
        let output = command.run()?.into_success(command.program())?;
        parse_tasklist_name(&output.stdout).ok_or(LookupError::NotFound)
    }
}

/// Parsea la salida de `netstat -ano`, quedándose con las líneas LISTENING.
///
/// Formato esperado:
/// ```text
///   TCP    0.0.0.0:3000    0.0.0.0:0    LISTENING    501
/// ```
pub fn parse_netstat_output(output: &str) -> Vec<Listener> {
    output
        .lines()
        .filter(|line| line.contains("LISTENING"))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            let port = extract_trailing_port(parts[1])?;
            let pid = parts[4].parse::<u32>().ok()?;
            Some(Listener {
                port,
                pid,
                process: None,
            })
        })
        .collect()
}

/// Extrae el nombre de imagen del primer campo CSV de `tasklist`.
///
/// Devuelve `None` si la salida no tiene campos entre comillas
/// (p. ej. "INFO: No tasks are running...").
pub fn parse_tasklist_name(output: &str) -> Option<String> {
    let start = output.find('"')? + 1;
    let len = output[start..].find('"')?;
    let name = &output[start..start + len];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
