/// Motor de escaneo de puertos.
///
/// Cruza una única consulta de la tabla de sockets con la lista de
/// puertos vigilados (o descubre todos los puertos en escucha) y
/// enriquece cada puerto activo con su cwd y su rama git.
///
/// Coste: una consulta de sockets por escaneo, más las consultas de
/// enriquecimiento de los puertos que resulten activos. Los fallos de
/// enriquecimiento dejan el campo vacío y nunca abortan el escaneo.
use std::collections::HashMap;

use crate::branch::{BranchResolver, GitBranchResolver};
use crate::config::Timeouts;
use crate::inspector::{self, CwdResolver};
use crate::record::PortRecord;
use crate::sockets::{self, Listener, ListenerSource};

/// Escáner con sus tres capacidades externas.
pub struct Scanner {
    sockets: Box<dyn ListenerSource>,
    inspector: Box<dyn CwdResolver>,
    branches: Box<dyn BranchResolver>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").finish_non_exhaustive()
    }
}

impl Scanner {
    /// Crea un escáner con capacidades arbitrarias.
    pub fn new(
        sockets: Box<dyn ListenerSource>,
        inspector: Box<dyn CwdResolver>,
        branches: Box<dyn BranchResolver>,
    ) -> Self {
        Self {
            sockets,
            inspector,
            branches,
        }
    }

    /// Crea un escáner con los adaptadores nativos de la plataforma.
    pub fn native(timeouts: &Timeouts) -> Self {
        Self::new(
            sockets::native_source(timeouts.socket_query, timeouts.cwd),
            inspector::native_inspector(timeouts.cwd),
            Box::new(GitBranchResolver {
                timeout: timeouts.branch,
            }),
        )
    }

    /// Escanea la lista de puertos vigilados.
    ///
    /// Devuelve exactamente un registro por puerto pedido, en el mismo
    /// orden. Si un puerto aparece varias veces en la tabla de sockets
    /// (p. ej. IPv4 e IPv6), gana la primera entrada. Los puertos
    /// repetidos en la entrada producen filas repetidas con el mismo
    /// contenido.
    ///
    /// # Arguments
    /// * `ports` - Puertos a vigilar, en el orden deseado
    ///
    /// # Returns
    /// Vector con un `PortRecord` por puerto pedido.
    pub fn scan_watch(&self, ports: &[u16]) -> Vec<PortRecord> {
        let index = self.listener_index();
        let mut enriched: HashMap<u16, PortRecord> = HashMap::new();

        let records: Vec<PortRecord> = ports
            .iter()
            .map(|&port| {
                if let Some(record) = enriched.get(&port) {
                    return record.clone();
                }
                let record = match index.get(&port) {
                    Some(listener) => self.promote(listener),
                    None => PortRecord::free(port),
                };
                enriched.insert(port, record.clone());
                record
            })
            .collect();

        let active = records.iter().filter(|r| r.is_active()).count();
        log::debug!("Escaneo vigilado: {} de {} puertos activos", active, records.len());
        records
    }

    /// Descubre todos los puertos en escucha.
    ///
    /// Un registro activo por puerto (la primera entrada gana),
    /// ordenado de forma ascendente por número de puerto.
    pub fn scan_all(&self) -> Vec<PortRecord> {
        let mut listeners: Vec<Listener> = self.listener_index().into_values().collect();
        listeners.sort_by_key(|listener| listener.port);

        let records: Vec<PortRecord> = listeners
            .iter()
            .map(|listener| self.promote(listener))
            .collect();

        log::debug!("Descubrimiento: {} puertos en escucha", records.len());
        records
    }

    /// Ejecuta la única consulta de sockets y la indexa por puerto.
    ///
    /// Si la consulta falla, el índice queda vacío (todo libre).
    fn listener_index(&self) -> HashMap<u16, Listener> {
        let listeners = match self.sockets.listeners() {
            Ok(listeners) => listeners,
            Err(err) => {
                log::warn!("{err}; todos los puertos se reportan libres");
                return HashMap::new();
            }
        };

        let mut index: HashMap<u16, Listener> = HashMap::with_capacity(listeners.len());
        for listener in listeners {
            index.entry(listener.port).or_insert(listener);
        }
        index
    }

    /// Convierte una entrada LISTEN en un registro activo enriquecido.
    fn promote(&self, listener: &Listener) -> PortRecord {
        let process = listener.process.clone().or_else(|| {
            self.sockets
                .process_name(listener.pid)
                .map_err(|err| {
                    log::debug!("Nombre del PID {} sin resolver: {}", listener.pid, err);
                })
                .ok()
        });

        let mut record = PortRecord::active(listener.port, listener.pid, process);
        self.enrich(&mut record);
        log::debug!("{}", record);
        record
    }

    /// Completa cwd y, solo si hay cwd, la rama git.
    fn enrich(&self, record: &mut PortRecord) {
        let Some(pid) = record.pid else {
            return;
        };

        match self.inspector.resolve_cwd(pid) {
            Ok(cwd) => record.cwd = Some(cwd),
            Err(err) => {
                log::debug!("cwd del PID {} sin resolver: {}", pid, err);
                return;
            }
        }

        if let Some(cwd) = &record.cwd {
            match self.branches.resolve_branch(cwd) {
                Ok(branch) => record.branch = Some(branch),
                Err(err) => log::debug!("Rama de {} sin resolver: {}", cwd.display(), err),
            }
        }
    }
}
