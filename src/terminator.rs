/// Módulo de terminación de procesos.
///
/// Política de dos fases: primero una señal cooperativa y, si falla
/// por cualquier motivo, una señal forzosa. Sin esperas entre fases
/// ni más reintentos.
use serde::Serialize;
use std::time::Duration;

use crate::error::TerminateError;

/// Severidad de la señal de terminación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Petición de salida que el proceso puede atender (SIGTERM)
    Cooperative,
    /// Terminación incondicional (SIGKILL)
    Forceful,
}

/// Capacidad de enviar una señal de terminación a un PID.
pub trait Signaller: Send + Sync {
    /// Envía la señal; el error lleva el texto del sistema operativo.
    fn send(&self, pid: u32, severity: Severity) -> Result<(), String>;
}

/// Cómo terminó el proceso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Atendió la señal cooperativa
    Graceful,
    /// Hizo falta la señal forzosa
    Forced,
}

/// Veredicto serializable de una terminación: `{success, forced?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Termination, TerminateError>> for KillReport {
    fn from(result: Result<Termination, TerminateError>) -> Self {
        match result {
            Ok(termination) => KillReport {
                success: true,
                forced: Some(termination == Termination::Forced),
                error: None,
            },
            Err(err) => KillReport {
                success: false,
                forced: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Terminador de procesos.
pub struct Terminator {
    signaller: Box<dyn Signaller>,
}

impl std::fmt::Debug for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminator").finish_non_exhaustive()
    }
}

impl Terminator {
    /// Crea un terminador con una capacidad de señales arbitraria.
    pub fn new(signaller: Box<dyn Signaller>) -> Self {
        Self { signaller }
    }

    /// Crea un terminador con las señales nativas de la plataforma.
    pub fn native(timeout: Duration) -> Self {
        Self::new(native_signaller(timeout))
    }

    /// Termina el proceso `pid`.
    ///
    /// El PID debe ser una cadena de dígitos decimales; si no, se
    /// devuelve `InvalidPid` sin tocar ningún proceso. También se
    /// rechazan `"0"` (señalaría al propio grupo de procesos) y los
    /// valores mayores que `i32::MAX` (no caben en `pid_t`).
    ///
    /// # Arguments
    /// * `pid` - PID tal como llega del usuario
    ///
    /// # Returns
    /// `Ok(Termination)` indicando si hizo falta forzar,
    /// `Err(TerminateError)` con el motivo en caso contrario.
    pub fn terminate(&self, pid: &str) -> Result<Termination, TerminateError> {
        let pid = parse_pid(pid)?;
        log::info!("Intentando terminar proceso con PID: {}", pid);

        let graceful = match self.signaller.send(pid, Severity::Cooperative) {
            Ok(()) => {
                log::info!("Proceso {} terminado con señal cooperativa", pid);
                return Ok(Termination::Graceful);
            }
            Err(err) => err,
        };

        log::warn!("Señal cooperativa a {} falló ({}), forzando...", pid, graceful);
        match self.signaller.send(pid, Severity::Forceful) {
            Ok(()) => {
                log::info!("Proceso {} terminado de forma forzada", pid);
                Ok(Termination::Forced)
            }
            Err(err) => {
                log::error!("No se pudo terminar el proceso {}: {}", pid, err);
                Err(TerminateError::Failed(err))
            }
        }
    }
}

/// Valida un PID: solo dígitos, distinto de 0 y dentro del rango de `pid_t`.
///
/// El 0 se rechaza porque `kill(0, ..)` señala a todo el grupo de
/// procesos propio.
pub fn parse_pid(raw: &str) -> Result<u32, TerminateError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TerminateError::InvalidPid);
    }
    match raw.parse::<u32>() {
        Ok(pid) if pid > 0 && pid <= i32::MAX as u32 => Ok(pid),
        _ => Err(TerminateError::InvalidPid),
    }
}

/// Devuelve la capacidad de señales nativa de la plataforma actual.
///
/// En POSIX `kill(2)` no bloquea, así que el límite no aplica.
#[cfg(unix)]
pub fn native_signaller(_timeout: Duration) -> Box<dyn Signaller> {
    Box::new(PosixSignaller)
}

/// Devuelve la capacidad de señales nativa de la plataforma actual.
#[cfg(windows)]
pub fn native_signaller(timeout: Duration) -> Box<dyn Signaller> {
    Box::new(TaskkillSignaller { timeout })
}

/// Señales POSIX vía `kill(2)`; la llamada no bloquea.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct PosixSignaller;

#[cfg(unix)]
impl Signaller for PosixSignaller {
    fn send(&self, pid: u32, severity: Severity) -> Result<(), String> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| format!("PID fuera de rango: {}", pid))?;
        let signal = match severity {
            Severity::Cooperative => Signal::SIGTERM,
            Severity::Forceful => Signal::SIGKILL,
        };
        kill(Pid::from_raw(raw), signal).map_err(|errno| format!("kill {}: {}", pid, errno))
    }
}

/// Señales de Windows vía `taskkill` (con `/F` para forzar).
#[cfg(windows)]
#[derive(Debug, Clone)]
pub struct TaskkillSignaller {
    pub timeout: Duration,
}

#[cfg(windows)]
impl Signaller for TaskkillSignaller {
    fn send(&self, pid: u32, severity: Severity) -> Result<(), String> {
        use crate::command::BoundedCommand;

        let mut command = BoundedCommand::new("taskkill", self.timeout)
            .args(["/PID".to_string(), pid.to_string()]);
        if severity == Severity::Forceful {
            command = command.arg("/F");
        }
        command
            .run()
            .and_then(|output| output.into_success("taskkill"))
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Registra las señales enviadas y responde según lo configurado
    struct FakeSignaller {
        cooperative: Result<(), String>,
        forceful: Result<(), String>,
        sent: Arc<Mutex<Vec<(u32, Severity)>>>,
    }

    impl Signaller for FakeSignaller {
        fn send(&self, pid: u32, severity: Severity) -> Result<(), String> {
            self.sent.lock().unwrap().push((pid, severity));
            match severity {
                Severity::Cooperative => self.cooperative.clone(),
                Severity::Forceful => self.forceful.clone(),
            }
        }
    }

    fn terminator(
        cooperative: Result<(), String>,
        forceful: Result<(), String>,
    ) -> (Terminator, Arc<Mutex<Vec<(u32, Severity)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let signaller = FakeSignaller {
            cooperative,
            forceful,
            sent: Arc::clone(&sent),
        };
        (Terminator::new(Box::new(signaller)), sent)
    }

    /// Verifica la validación de PIDs
    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("501"), Ok(501));
        for raw in ["abc", "", "-5", "+5", " 42", "4 2", "0", "99999999999", "2147483648"] {
            assert_eq!(parse_pid(raw), Err(TerminateError::InvalidPid), "{raw:?}");
        }
    }

    /// Un PID inválido no envía ninguna señal
    #[test]
    fn test_invalid_pid_touches_nothing() {
        let (terminator, sent) = terminator(Ok(()), Ok(()));
        let result = terminator.terminate("abc");

        assert_eq!(result, Err(TerminateError::InvalidPid));
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(
            serde_json::to_value(KillReport::from(result)).unwrap(),
            serde_json::json!({"success": false, "error": "Invalid PID"})
        );
    }

    /// "0" y los PIDs fuera de pid_t se rechazan antes de señalar
    #[test]
    fn test_out_of_range_pid_touches_nothing() {
        let (terminator, sent) = terminator(Ok(()), Ok(()));
        for raw in ["0", "2147483648", "4294967295"] {
            assert_eq!(terminator.terminate(raw), Err(TerminateError::InvalidPid), "{raw:?}");
        }
        assert!(sent.lock().unwrap().is_empty());
    }

    /// La señal cooperativa basta
    #[test]
    fn test_graceful_termination() {
        let (terminator, sent) = terminator(Ok(()), Ok(()));
        let result = terminator.terminate("501");

        assert_eq!(result, Ok(Termination::Graceful));
        assert_eq!(*sent.lock().unwrap(), vec![(501, Severity::Cooperative)]);
        assert_eq!(
            serde_json::to_value(KillReport::from(result)).unwrap(),
            serde_json::json!({"success": true, "forced": false})
        );
    }

    /// Falla la cooperativa, la forzosa funciona
    #[test]
    fn test_escalates_to_forced() {
        let (terminator, sent) = terminator(Err("timeout".into()), Ok(()));
        let result = terminator.terminate("501");

        assert_eq!(result, Ok(Termination::Forced));
        assert_eq!(
            *sent.lock().unwrap(),
            vec![(501, Severity::Cooperative), (501, Severity::Forceful)]
        );
        assert_eq!(
            serde_json::to_value(KillReport::from(result)).unwrap(),
            serde_json::json!({"success": true, "forced": true})
        );
    }

    /// Ambas fallan: el error del sistema llega al usuario
    #[test]
    fn test_both_phases_fail() {
        let (terminator, sent) = terminator(
            Err("kill 501: EPERM: Operation not permitted".into()),
            Err("kill 501: ESRCH: No such process".into()),
        );
        let report = KillReport::from(terminator.terminate("501"));

        assert_eq!(sent.lock().unwrap().len(), 2);
        assert!(!report.success);
        assert_eq!(report.forced, None);
        assert_eq!(report.error.as_deref(), Some("kill 501: ESRCH: No such process"));
    }

    /// Un PID que no existe falla en ambas fases con el signaller real
    #[cfg(unix)]
    #[test]
    fn test_posix_signaller_missing_process() {
        let terminator = Terminator::native(Duration::from_secs(3));
        // Máximo de pid_t: nunca asignado en la práctica
        let result = terminator.terminate("2147483647");
        match result {
            Err(TerminateError::Failed(message)) => assert!(!message.is_empty()),
            other => panic!("resultado inesperado: {other:?}"),
        }
    }
}
