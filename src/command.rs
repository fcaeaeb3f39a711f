/// Módulo de ejecución de comandos externos con límite de tiempo.
///
/// Todos los comandos se construyen como vector de argumentos (nunca
/// como cadena interpolada), de modo que un PID o una ruta no pueden
/// inyectar nada en la shell.
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CommandError;

/// Intervalo de sondeo mientras se espera a que el hijo termine
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Salida capturada de un comando que terminó dentro de su límite.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Estado de salida del proceso
    pub status: ExitStatus,
    /// Salida estándar (UTF-8 con pérdida)
    pub stdout: String,
    /// Salida de error (UTF-8 con pérdida)
    pub stderr: String,
}

impl CommandOutput {
    /// Convierte un estado de salida distinto de cero en `CommandError::Failed`.
    pub fn into_success(self, program: &str) -> Result<Self, CommandError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                program: program.to_string(),
                code: self.status.code(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Comando externo acotado en tiempo.
#[derive(Debug, Clone)]
pub struct BoundedCommand {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    timeout: Duration,
}

impl BoundedCommand {
    /// Crea un comando para `program` con el límite indicado.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            timeout,
        }
    }

    /// Agrega un argumento.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Agrega varios argumentos.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Directorio de trabajo del proceso hijo.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Nombre del programa, para mensajes de error.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ejecuta el comando y espera como máximo `timeout`.
    ///
    /// Si el límite se supera, el hijo se mata y se devuelve
    /// `CommandError::Timeout`. Un estado de salida distinto de cero
    /// NO es un error aquí; usar `CommandOutput::into_success` si lo es.
    ///
    /// # Returns
    /// `Ok(CommandOutput)` si el proceso terminó a tiempo,
    /// `Err(CommandError)` si no se pudo lanzar o se agotó el tiempo.
    pub fn run(&self) -> Result<CommandOutput, CommandError> {
        log::trace!("Ejecutando {} {:?} (límite {:?})", self.program, self.args, self.timeout);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotFound(self.program.clone())
            } else {
                CommandError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            }
        })?;

        // Los pipes se vacían en hilos propios para que un hijo con mucha
        // salida no se bloquee escribiendo mientras esperamos su fin
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout);

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        match status {
            Some(status) => Ok(CommandOutput {
                status,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
            None => {
                log::debug!("{} superó el límite de {:?}", self.program, self.timeout);
                Err(CommandError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Lee un pipe completo en segundo plano.
fn spawn_reader<R>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Espera al hijo hasta el límite; si se agota, lo mata y devuelve `None`.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => break,
            Err(err) => {
                log::debug!("try_wait falló: {err}");
                break;
            }
        }
    }

    // kill() cierra los pipes del hijo y libera a los hilos lectores
    let _ = child.kill();
    let _ = child.wait();
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Verifica que se captura la salida estándar
    #[test]
    fn test_run_captures_stdout() {
        let output = BoundedCommand::new("echo", Duration::from_secs(3))
            .arg("hola")
            .run()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hola");
    }

    /// Verifica que un programa inexistente da NotFound
    #[test]
    fn test_missing_program() {
        let result = BoundedCommand::new("portwatch-no-existe-xyz", Duration::from_secs(1)).run();
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }

    /// Verifica que el límite de tiempo mata al hijo
    #[test]
    fn test_timeout_kills_child() {
        let started = Instant::now();
        let result = BoundedCommand::new("sleep", Duration::from_millis(200))
            .arg("5")
            .run();
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    /// Verifica que un estado distinto de cero se convierte en Failed
    #[test]
    fn test_into_success_reports_failure() {
        let output = BoundedCommand::new("false", Duration::from_secs(3))
            .run()
            .unwrap();
        let err = output.into_success("false").unwrap_err();
        assert!(matches!(err, CommandError::Failed { .. }));
    }

    /// Verifica que se respeta el directorio de trabajo
    #[test]
    fn test_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = BoundedCommand::new("pwd", Duration::from_secs(3))
            .current_dir(dir.path())
            .run()
            .unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
