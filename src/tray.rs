/// Módulo del system tray (bandeja del sistema).
///
/// Dashboard de PortWatch usando el protocolo StatusNotifierItem/AppIndicator
/// de Linux.
///
/// ## Características del menú:
/// - Vista de puertos vigilados o de todos los puertos en escucha
/// - Proceso, PID y rama git de cada puerto activo
/// - Terminación con un clic sobre el puerto
/// - Paginación configurable (5 o 10 puertos por página)
/// - Actualización automática según el intervalo configurado
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use ksni::{self, menu::StandardItem, menu::SubMenu, Tray};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::record::PortRecord;
use crate::scanner::Scanner;
use crate::terminator::{KillReport, Terminator};

/// Capacidad de la cola de peticiones del tray al hilo de refresco
const REQUEST_QUEUE: usize = 16;

// ─────────────────────────────────────────────────────────────
// Servicios compartidos por el tray y el hilo de refresco
// ─────────────────────────────────────────────────────────────

/// Escáner, terminador y configuración del dashboard.
#[derive(Debug)]
pub struct Dashboard {
    scanner: Scanner,
    terminator: Terminator,
    config: Config,
}

impl Dashboard {
    pub fn new(scanner: Scanner, terminator: Terminator, config: Config) -> Self {
        Self {
            scanner,
            terminator,
            config,
        }
    }

    /// Crea el dashboard con los adaptadores nativos.
    pub fn native(config: Config) -> Self {
        Self::new(
            Scanner::native(&config.timeouts),
            Terminator::native(config.timeouts.signal),
            config,
        )
    }

    /// Escanea según la vista activa.
    fn snapshot(&self, discover: bool) -> Vec<PortRecord> {
        if discover {
            self.scanner.scan_all()
        } else {
            self.scanner.scan_watch(&self.config.ports)
        }
    }

    /// Termina el proceso de un puerto y deja el resultado en el log.
    fn terminate(&self, port: u16, pid: u32) {
        log::info!("Cerrando puerto {} (PID: {})", port, pid);
        let report = KillReport::from(self.terminator.terminate(&pid.to_string()));
        match (report.success, report.forced) {
            (true, Some(true)) => log::info!("Puerto {} liberado (forzado)", port),
            (true, _) => log::info!("Puerto {} liberado", port),
            (false, _) => log::error!(
                "Error cerrando puerto {}: {}",
                port,
                report.error.unwrap_or_default()
            ),
        }
    }
}

/// Trabajo que el menú delega en el hilo de refresco.
///
/// Los callbacks del menú corren en el hilo del servicio ksni; ahí solo
/// se encola la petición, nunca se escanea ni se envían señales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Volver a escanear con la vista activa
    Rescan,
    /// Terminar el proceso de un puerto y volver a escanear
    Terminate { port: u16, pid: u32 },
}

// ─────────────────────────────────────────────────────────────
// Estado del tray con vista y paginación
// ─────────────────────────────────────────────────────────────

/// Estado compartido del tray: el último escaneo y la configuración
/// de visualización (vista, página actual, tamaño de página).
#[derive(Debug)]
pub struct PortWatchTray {
    /// Resultado del último escaneo
    records: Arc<Mutex<Vec<PortRecord>>>,
    /// Servicios de escaneo y terminación
    dashboard: Arc<Dashboard>,
    /// `true` para la vista de descubrimiento, `false` para la vigilada
    discover: Arc<AtomicBool>,
    /// Cola hacia el hilo de refresco
    requests: Sender<Request>,
    /// Página actual (base 0) de la vista paginada
    current_page: usize,
    /// Cantidad de puertos a mostrar por página
    page_size: usize,
}

/// Tamaño de página por defecto al iniciar la aplicación
const DEFAULT_PAGE_SIZE: usize = 10;

impl PortWatchTray {
    /// Crea el tray con la lista vacía; el primer escaneo lo hace el
    /// hilo de refresco.
    pub fn new(dashboard: Arc<Dashboard>, requests: Sender<Request>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            dashboard,
            discover: Arc::new(AtomicBool::new(false)),
            requests,
            current_page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Encola trabajo para el hilo de refresco sin bloquear.
    ///
    /// Resetea la página actual a 0 ya que la lista va a cambiar y la
    /// página anterior podría no existir.
    fn request(&mut self, request: Request) {
        match self.requests.try_send(request) {
            Ok(()) => log::debug!("Petición encolada: {:?}", request),
            Err(TrySendError::Full(_)) => log::warn!("Cola del tray llena, se descarta {:?}", request),
            Err(TrySendError::Disconnected(_)) => log::error!("El hilo de refresco ya no está activo"),
        }
        self.current_page = 0;
    }

    /// Copia del último escaneo.
    fn current_records(&self) -> Vec<PortRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(_) => Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Implementación del menú contextual del tray
// ─────────────────────────────────────────────────────────────

impl Tray for PortWatchTray {
    fn icon_name(&self) -> String {
        "network-server".into()
    }

    fn title(&self) -> String {
        "PortWatch 🔭".into()
    }

    fn id(&self) -> String {
        "portwatch".into()
    }

    /// Construye el menú contextual dinámico.
    ///
    /// ```text
    /// 🔄 Actualizar
    /// ──────────
    /// 👁 Vista: [Vigilados|Todos] ▸ submenu
    /// 📋 Por página: [5|10] ▸ submenu
    /// ──────────
    /// 📡 2 de 6 puertos activos
    /// 🟢 3000 (web) → node [PID 501] ⎇ main
    /// ⚪ 4000 libre
    /// ...
    /// ──────────
    /// ◀ Anterior | Página X/Y | ▶ Siguiente
    /// ──────────
    /// ❌ Salir
    /// ```
    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        let discover = self.discover.load(Ordering::SeqCst);
        let mut items: Vec<ksni::MenuItem<Self>> = vec![
            build_refresh_item(),
            ksni::MenuItem::Separator,
            build_view_submenu(discover),
            build_page_size_submenu(self.page_size),
            ksni::MenuItem::Separator,
        ];

        let records = self.current_records();
        let total = records.len();
        let pages = total_pages(total, self.page_size);
        let safe_page = self.current_page.min(pages.saturating_sub(1));
        let page_records = get_page(&records, safe_page, self.page_size);

        if total == 0 {
            items.push(build_empty_message(discover));
        } else {
            let active = records.iter().filter(|r| r.is_active()).count();
            items.push(build_count_header(active, total, discover));
            for record in &page_records {
                let label = self.dashboard.config.label(record.port);
                items.push(build_port_item(record, label));
            }
        }

        if pages > 1 {
            items.push(ksni::MenuItem::Separator);
            items.extend(build_navigation_items(safe_page, pages));
        }

        items.push(ksni::MenuItem::Separator);
        items.push(build_exit_item());

        items
    }
}

// ─────────────────────────────────────────────────────────────
// Constructores de items del menú
// ─────────────────────────────────────────────────────────────

fn build_refresh_item() -> ksni::MenuItem<PortWatchTray> {
    StandardItem {
        label: "🔄 Actualizar".into(),
        activate: Box::new(|tray: &mut PortWatchTray| {
            tray.request(Request::Rescan);
        }),
        ..Default::default()
    }
    .into()
}

/// Submenu para alternar entre la lista vigilada y el descubrimiento.
fn build_view_submenu(discover: bool) -> ksni::MenuItem<PortWatchTray> {
    let views = [(false, "Vigilados"), (true, "Todos")];

    let submenu_items: Vec<ksni::MenuItem<PortWatchTray>> = views
        .iter()
        .map(|&(value, name)| {
            let indicator = if value == discover { "●" } else { "○" };
            StandardItem {
                label: format!("{} {}", indicator, name),
                activate: Box::new(move |tray: &mut PortWatchTray| {
                    log::info!("Vista cambiada a: {}", name);
                    tray.discover.store(value, Ordering::SeqCst);
                    tray.request(Request::Rescan);
                }),
                ..Default::default()
            }
            .into()
        })
        .collect();

    let current = if discover { "Todos" } else { "Vigilados" };
    SubMenu {
        label: format!("👁 Vista: {}", current),
        submenu: submenu_items,
        ..Default::default()
    }
    .into()
}

/// Submenu de tamaño de página (5 o 10 puertos).
fn build_page_size_submenu(current_size: usize) -> ksni::MenuItem<PortWatchTray> {
    let submenu_items: Vec<ksni::MenuItem<PortWatchTray>> = [5usize, 10]
        .iter()
        .map(|&size| {
            let indicator = if size == current_size { "●" } else { "○" };
            StandardItem {
                label: format!("{} {} puertos", indicator, size),
                activate: Box::new(move |tray: &mut PortWatchTray| {
                    log::info!("Tamaño de página cambiado a: {}", size);
                    tray.page_size = size;
                    tray.current_page = 0;
                }),
                ..Default::default()
            }
            .into()
        })
        .collect();

    SubMenu {
        label: format!("📋 Por página: {}", current_size),
        submenu: submenu_items,
        ..Default::default()
    }
    .into()
}

fn build_empty_message(discover: bool) -> ksni::MenuItem<PortWatchTray> {
    let label = if discover {
        "✅ Ningún puerto en escucha"
    } else {
        "✅ Sin puertos vigilados"
    };
    StandardItem {
        label: label.into(),
        enabled: false,
        ..Default::default()
    }
    .into()
}

fn build_count_header(active: usize, total: usize, discover: bool) -> ksni::MenuItem<PortWatchTray> {
    let label = if discover {
        format!("📡 {} puertos en escucha", total)
    } else {
        format!("📡 {} de {} puertos activos", active, total)
    };
    StandardItem {
        label,
        enabled: false,
        ..Default::default()
    }
    .into()
}

/// Item de un puerto: los activos se terminan con un clic, los libres
/// se muestran deshabilitados.
fn build_port_item(record: &PortRecord, label: Option<&str>) -> ksni::MenuItem<PortWatchTray> {
    let port = record.port;
    let pid = record.pid;

    StandardItem {
        label: port_label(record, label),
        enabled: pid.is_some(),
        activate: Box::new(move |tray: &mut PortWatchTray| {
            if let Some(pid) = pid {
                tray.request(Request::Terminate { port, pid });
            }
        }),
        ..Default::default()
    }
    .into()
}

/// Texto de un puerto en el menú.
///
/// Formato: `🟢 3000 (web) → node [PID 501] ⎇ main` o `⚪ 4000 libre`.
fn port_label(record: &PortRecord, label: Option<&str>) -> String {
    let mut text = match record.pid {
        Some(_) => format!("🟢 {}", record.port),
        None => format!("⚪ {}", record.port),
    };
    if let Some(label) = label {
        text.push_str(&format!(" ({})", label));
    }

    match record.pid {
        Some(pid) => {
            let process = record.process.as_deref().unwrap_or("desconocido");
            text.push_str(&format!(" → {} [PID {}]", process, pid));
            if let Some(branch) = &record.branch {
                text.push_str(&format!(" ⎇ {}", branch));
            }
        }
        None => text.push_str(" libre"),
    }
    text
}

/// Items de navegación: ◀ Anterior, Página X/Y, ▶ Siguiente.
fn build_navigation_items(
    current_page: usize,
    total_pages: usize,
) -> Vec<ksni::MenuItem<PortWatchTray>> {
    vec![
        StandardItem {
            label: "◀ Anterior".into(),
            enabled: current_page > 0,
            activate: Box::new(|tray: &mut PortWatchTray| {
                if tray.current_page > 0 {
                    tray.current_page -= 1;
                    log::debug!("Página anterior: {}", tray.current_page + 1);
                }
            }),
            ..Default::default()
        }
        .into(),
        StandardItem {
            label: format!("📄 Página {}/{}", current_page + 1, total_pages),
            enabled: false,
            ..Default::default()
        }
        .into(),
        StandardItem {
            label: "▶ Siguiente".into(),
            enabled: current_page + 1 < total_pages,
            activate: Box::new(move |tray: &mut PortWatchTray| {
                if tray.current_page + 1 < total_pages {
                    tray.current_page += 1;
                    log::debug!("Página siguiente: {}", tray.current_page + 1);
                }
            }),
            ..Default::default()
        }
        .into(),
    ]
}

fn build_exit_item() -> ksni::MenuItem<PortWatchTray> {
    StandardItem {
        label: "❌ Salir".into(),
        activate: Box::new(|_: &mut PortWatchTray| {
            log::info!("PortWatch cerrándose...");
            process::exit(0);
        }),
        ..Default::default()
    }
    .into()
}

// ─────────────────────────────────────────────────────────────
// Paginación
// ─────────────────────────────────────────────────────────────

/// Número de páginas necesarias para `total` elementos.
fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Elementos de la página `page` (base 0); vacío si no existe.
fn get_page<T: Clone>(items: &[T], page: usize, page_size: usize) -> Vec<T> {
    items
        .iter()
        .skip(page.saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect()
}

// ─────────────────────────────────────────────────────────────
// Inicio del servicio system tray
// ─────────────────────────────────────────────────────────────

/// Bucle del hilo de refresco.
///
/// Espera peticiones del menú hasta `refresh`; al recibir una (o al
/// agotarse la espera) atiende todo lo encolado, escanea una sola vez,
/// publica el resultado en `records` y llama a `on_update`. Termina
/// cuando el tray suelta su `Sender`.
pub fn run_worker(
    dashboard: &Dashboard,
    records: &Mutex<Vec<PortRecord>>,
    discover: &AtomicBool,
    requests: &Receiver<Request>,
    refresh: Duration,
    on_update: impl Fn(),
) {
    loop {
        match requests.recv_timeout(refresh) {
            Ok(request) => handle_request(dashboard, request),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        // Varios clics seguidos se resuelven con un único escaneo
        for request in requests.try_iter() {
            handle_request(dashboard, request);
        }

        let snapshot = dashboard.snapshot(discover.load(Ordering::SeqCst));
        log::debug!(
            "Escaneo: {} de {} puertos activos",
            snapshot.iter().filter(|r| r.is_active()).count(),
            snapshot.len()
        );
        if let Ok(mut current) = records.lock() {
            *current = snapshot;
        }
        on_update();
    }
    log::debug!("Hilo de refresco terminado");
}

fn handle_request(dashboard: &Dashboard, request: Request) {
    if let Request::Terminate { port, pid } = request {
        dashboard.terminate(port, pid);
    }
}

/// Inicia el system tray y ejecuta el loop principal.
///
/// Crea el ícono en la bandeja del sistema y lanza el hilo de refresco,
/// que hace todos los escaneos y terminaciones fuera del hilo del tray.
pub fn run_tray(config: Config) {
    log::info!("Iniciando PortWatch system tray...");
    let refresh = config.refresh;
    let (sender, receiver) = bounded(REQUEST_QUEUE);

    // Primer escaneo en cuanto arranca el hilo
    if let Err(err) = sender.try_send(Request::Rescan) {
        log::warn!("No se pudo pedir el escaneo inicial: {err}");
    }

    let tray = PortWatchTray::new(Arc::new(Dashboard::native(config)), sender);
    let records = Arc::clone(&tray.records);
    let dashboard = Arc::clone(&tray.dashboard);
    let discover = Arc::clone(&tray.discover);

    let service = ksni::TrayService::new(tray);
    let handle = service.handle();

    std::thread::spawn(move || {
        run_worker(&dashboard, &records, &discover, &receiver, refresh, || {
            // Notificar al tray para reconstruir el menú
            handle.update(|_tray: &mut PortWatchTray| {
                log::debug!("Menú actualizado");
            });
        });
    });

    // Ejecutar el servicio (bloquea el hilo principal)
    if let Err(e) = service.run() {
        log::error!("Error ejecutando el servicio de tray: {}", e);
    }
}
