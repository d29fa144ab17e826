use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::core::{
    alerts::{AlertBus, AlertDisplay, AlertProvider, AlertView},
    config::{ConfigManager, Settings},
    error::{self, AppError},
    form::{BulkUpload, CalculationRequest, DetailsForm},
    navigation::{BenefitFlow, BenefitStep, NavigationController, ProcessKind},
};

const ENV_CONFIG_DIR: &str = "BENEFIT_CONFIG_DIR";
const INFO_TITLE: &str = "Information";
const UNKNOWN_COMMAND_TITLE: &str = "Unknown Command";

/// Input to the wizard, one per console line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(ProcessKind),
    Goto(BenefitStep),
    /// Result of the start-process API call: the new process-instance id
    ProcessStarted(String),
    SubmitDetails(DetailsForm),
    SubmitBulk(BulkUpload),
    /// Result of the calculation API call
    ResultReceived(serde_json::Value),
    RequestFailed { endpoint: String, status: Option<u16> },
    Fault(String),
    Next,
    Back,
    Cancel,
    Dismiss,
    Info(String),
    View,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "start" => ProcessKind::parse(rest)
            .map(Command::Start)
            .ok_or_else(|| format!("Unknown process type {:?}. Use standard or bulk.", rest)),
        "goto" => BenefitStep::parse(rest)
            .map(Command::Goto)
            .ok_or_else(|| format!("Unknown step {:?}.", rest)),
        "process" if !rest.is_empty() => Ok(Command::ProcessStarted(rest.to_string())),
        "details" => serde_json::from_str(rest)
            .map(Command::SubmitDetails)
            .map_err(|e| format!("Details must be a JSON object: {}", e)),
        "upload" => {
            let (file_name, size) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| "Usage: upload <file> <bytes>".to_string())?;
            let size_bytes = size
                .parse::<u64>()
                .map_err(|_| format!("Invalid file size {:?}.", size))?;
            Ok(Command::SubmitBulk(BulkUpload {
                file_name: file_name.trim().to_string(),
                size_bytes,
            }))
        }
        "result" => serde_json::from_str(rest)
            .map(Command::ResultReceived)
            .map_err(|e| format!("Result must be JSON: {}", e)),
        "fail" => {
            let mut parts = rest.split_whitespace();
            let endpoint = parts
                .next()
                .ok_or_else(|| "Usage: fail <endpoint> [status]".to_string())?
                .to_string();
            let status = match parts.next() {
                Some(raw) => Some(
                    raw.parse::<u16>()
                        .map_err(|_| format!("Invalid status {:?}.", raw))?,
                ),
                None => None,
            };
            Ok(Command::RequestFailed { endpoint, status })
        }
        "fault" => Ok(Command::Fault(rest.to_string())),
        "next" => Ok(Command::Next),
        "back" => Ok(Command::Back),
        "cancel" | "reset" => Ok(Command::Cancel),
        "dismiss" | "close" => Ok(Command::Dismiss),
        "info" if !rest.is_empty() => Ok(Command::Info(rest.to_string())),
        "view" | "" => Ok(Command::View),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(format!("Unknown command {:?}.", line)),
    }
}

/// Everything the front end needs to render the current screen
#[derive(Debug, Clone, Serialize)]
pub struct AppView {
    pub step: BenefitStep,
    pub process_kind: Option<ProcessKind>,
    pub can_go_back: bool,
    pub can_go_next: bool,
    pub process_instance_id: Option<String>,
    pub result_ready: bool,
    pub request: Option<CalculationRequest>,
    pub upload: Option<BulkUpload>,
    pub result: Option<serde_json::Value>,
    pub alert: Option<AlertView>,
}

/// Composition root: owns the alert bus, the mounted provider and the flow.
pub struct App {
    bus: Arc<AlertBus>,
    provider: AlertProvider,
    navigation: NavigationController<BenefitFlow>,
    settings: Settings,
    request: Option<CalculationRequest>,
    upload: Option<BulkUpload>,
    result: Option<serde_json::Value>,
}

impl App {
    pub fn new(bus: Arc<AlertBus>, runtime: Handle, settings: Settings) -> Self {
        let provider = AlertProvider::mount(bus.clone(), runtime, settings.info_dismiss_after());
        Self {
            bus,
            provider,
            navigation: NavigationController::new(),
            settings,
            request: None,
            upload: None,
            result: None,
        }
    }

    pub fn bus(&self) -> &Arc<AlertBus> {
        &self.bus
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn step(&self) -> BenefitStep {
        self.navigation.current_step()
    }

    pub fn alert(&self) -> AlertDisplay {
        self.provider.display()
    }

    pub fn subscribe_alerts(&self) -> watch::Receiver<AlertDisplay> {
        self.provider.subscribe()
    }

    pub fn view(&self) -> AppView {
        let flags = self.navigation.flags();
        AppView {
            step: self.navigation.current_step(),
            process_kind: self.navigation.process_kind(),
            can_go_back: self.navigation.can_go_back(),
            can_go_next: self.navigation.can_go_next(),
            process_instance_id: flags.process_instance_id.clone(),
            result_ready: flags.result_ready,
            request: self.request.clone(),
            upload: self.upload.clone(),
            result: self.result.clone(),
            alert: self.provider.display().current().map(|a| a.view()),
        }
    }

    /// Run one command. Validation and network failures are shown as alerts;
    /// only application faults come back as errors.
    pub fn execute(&mut self, command: Command) -> Result<(), AppError> {
        match self.apply(command) {
            Ok(()) => Ok(()),
            Err(err) => error::report(&self.bus, err),
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Start(kind) => {
                if !self.navigation.handle_process_start(kind) {
                    log::warn!("Process already started, ignoring start {:?}", kind);
                }
            }
            Command::Goto(step) => self.navigation.navigate_to_step(step),
            Command::ProcessStarted(id) => {
                log::info!("Process instance {} started", id);
                self.navigation.set_process_instance_id(Some(id));
            }
            Command::SubmitDetails(form) => self.submit_details(&form)?,
            Command::SubmitBulk(upload) => self.submit_bulk(upload)?,
            Command::ResultReceived(result) => {
                self.result = Some(result);
                self.navigation.set_result_ready(true);
                self.bus
                    .show_info("Operation completed successfully.", Some(INFO_TITLE));
            }
            Command::RequestFailed { endpoint, status } => {
                return Err(AppError::network(endpoint, status));
            }
            Command::Fault(reason) => return Err(AppError::Fault(reason)),
            Command::Next => {
                if !self.navigation.handle_next_step() {
                    log::debug!("Next not available on {}", self.navigation.current_step());
                }
            }
            Command::Back => {
                self.navigation.handle_back();
            }
            Command::Cancel => self.reset(),
            Command::Dismiss => self.provider.dismiss(),
            Command::Info(message) => self.bus.show_info(message, Some(INFO_TITLE)),
            Command::View | Command::Quit => {}
        }
        Ok(())
    }

    fn submit_details(&mut self, form: &DetailsForm) -> Result<(), AppError> {
        if self.navigation.current_step() != BenefitStep::Details {
            log::warn!(
                "Details submitted on {}, ignoring",
                self.navigation.current_step()
            );
            return Ok(());
        }
        let request = form.validate()?;
        log::info!("Calculation requested for member {}", request.member_id);
        self.request = Some(request);
        self.bus
            .show_info("Details submitted. Calculating benefit...", Some(INFO_TITLE));
        Ok(())
    }

    fn submit_bulk(&mut self, upload: BulkUpload) -> Result<(), AppError> {
        if self.navigation.current_step() != BenefitStep::Bulk {
            log::warn!(
                "Bulk upload submitted on {}, ignoring",
                self.navigation.current_step()
            );
            return Ok(());
        }
        upload.validate()?;
        log::info!("Bulk upload accepted: {}", upload.file_name);
        self.bus.show_info(
            format!("{} uploaded. Processing members...", upload.file_name),
            Some(INFO_TITLE),
        );
        self.upload = Some(upload);
        Ok(())
    }

    /// Cancel: back to home with flags and form state cleared
    pub fn reset(&mut self) {
        self.navigation.reset_process();
        self.request = None;
        self.upload = None;
        self.result = None;
    }

    /// Unmount the alert provider
    pub fn shutdown(self) {
        self.provider.unmount();
    }
}

#[derive(Serialize)]
struct Emitted<'a, T: Serialize> {
    event: &'a str,
    payload: T,
}

fn emit<T: Serialize>(out: &mut impl Write, event: &str, payload: T) -> io::Result<()> {
    let line = serde_json::to_string(&Emitted { event, payload })?;
    writeln!(out, "{}", line)?;
    out.flush()
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/benefit-wizard")
}

fn init_logging(level: &str) {
    // RUST_LOG still wins when set
    let env = env_logger::Env::default().default_filter_or(level);
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Logger already initialised: {}", e);
    }
}

/// Apply one read from stdin. Returns false once the loop should stop.
fn handle_input(
    app: &mut App,
    read: io::Result<Option<String>>,
    out: &mut impl Write,
) -> io::Result<bool> {
    match read {
        Ok(None) => return Ok(false),
        Ok(Some(line)) => match parse_command(&line) {
            Ok(Command::Quit) => return Ok(false),
            Ok(command) => {
                if let Err(fault) = app.execute(command) {
                    // Boundary: render the fallback and offer a retry from home
                    emit(out, "fatal-error", fault.to_string())?;
                    app.reset();
                }
            }
            Err(message) => app.bus().show_warning(message, Some(UNKNOWN_COMMAND_TITLE)),
        },
        // One undecodable line is skipped, not fatal
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            log::warn!("Skipping input line: {}", e);
            app.bus().show_warning(
                "Input was not valid UTF-8 and was ignored.",
                Some(UNKNOWN_COMMAND_TITLE),
            );
        }
        Err(e) => return Err(e),
    }
    emit(out, "view-update", app.view())?;
    Ok(true)
}

async fn event_loop(settings: Settings) -> io::Result<()> {
    let bus = Arc::new(AlertBus::new());
    let mut app = App::new(bus.clone(), Handle::current(), settings);
    let mut alerts = app.subscribe_alerts();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    log::info!("Wizard ready. API: {}", app.settings().api_base_url);
    emit(&mut stdout, "view-update", app.view())?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                if !handle_input(&mut app, line, &mut stdout)? {
                    break;
                }
                // The view already carries the alert
                alerts.borrow_and_update();
            }
            changed = alerts.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = alerts.borrow_and_update().current().map(|a| a.view());
                emit(&mut stdout, "alert-update", current)?;
            }
        }
    }

    app.shutdown();
    if bus.has_sink() {
        log::warn!("Alert sink still attached after shutdown");
    }
    log::info!("Wizard closed");
    Ok(())
}

fn try_run() -> io::Result<()> {
    let config_manager = ConfigManager::new(config_dir());
    let loaded = config_manager.load_or_init();
    let settings = match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => Settings::default(),
    }
    .apply_env(|key| std::env::var(key).ok());
    init_logging(&settings.log_level);
    if let Err(e) = loaded {
        log::warn!("Using default settings: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(event_loop(settings))
}

pub fn run() {
    if let Err(e) = try_run() {
        log::error!("Wizard stopped: {}", e);
        eprintln!("benefit-wizard: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::AlertKind;
    use crate::core::error::{NETWORK_TITLE, VALIDATION_TITLE};
    use std::time::Duration;

    fn new_app() -> App {
        App::new(Arc::new(AlertBus::new()), Handle::current(), Settings::default())
    }

    fn details_json() -> &'static str {
        r#"details {"member_id":"AB123456","date_of_birth":"1970-06-15","retirement_date":"2035-06-15","annual_salary":"52000"}"#
    }

    fn run_line(app: &mut App, line: &str) {
        app.execute(parse_command(line).unwrap()).unwrap();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("start standard"), Ok(Command::Start(ProcessKind::Standard)));
        assert_eq!(parse_command("  goto details "), Ok(Command::Goto(BenefitStep::Details)));
        assert_eq!(
            parse_command("upload my members.csv 2048"),
            Ok(Command::SubmitBulk(BulkUpload {
                file_name: "my members.csv".to_string(),
                size_bytes: 2048,
            }))
        );
        assert_eq!(
            parse_command("fail /calculations 400"),
            Ok(Command::RequestFailed {
                endpoint: "/calculations".to_string(),
                status: Some(400),
            })
        );
        assert_eq!(parse_command(""), Ok(Command::View));
        assert!(parse_command("start sideways").is_err());
        assert!(parse_command("process").is_err());
        assert!(parse_command("details {broken").is_err());
        assert!(parse_command("fly").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_flow_end_to_end() {
        let mut app = new_app();

        run_line(&mut app, "start standard");
        assert_eq!(app.step(), BenefitStep::Standard);

        run_line(&mut app, "process proc-123");
        assert_eq!(app.step(), BenefitStep::Details);

        run_line(&mut app, details_json());
        assert_eq!(app.alert().current().unwrap().kind(), AlertKind::Info);
        assert_eq!(app.view().request.unwrap().member_id, "AB123456");

        run_line(&mut app, r#"result {"monthly_benefit": 1834.5}"#);
        let view = app.view();
        assert_eq!(view.step, BenefitStep::Results);
        assert!(view.result_ready);
        assert_eq!(view.result.unwrap()["monthly_benefit"], 1834.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_then_process_id_advances() {
        let mut app = new_app();
        run_line(&mut app, "goto standard");
        run_line(&mut app, "process p-1");
        assert_eq!(app.step(), BenefitStep::Details);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_details_show_validation_warning() {
        let mut app = new_app();
        run_line(&mut app, "goto details");
        run_line(&mut app, r#"details {"member_id":"","date_of_birth":"","retirement_date":"","annual_salary":""}"#);

        let display = app.alert();
        let alert = display.current().unwrap();
        assert_eq!(alert.kind(), AlertKind::Warning);
        assert_eq!(alert.title(), Some(VALIDATION_TITLE));
        assert_eq!(app.step(), BenefitStep::Details);
        assert!(app.view().request.is_none());

        // Warnings stay put
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(app.alert().is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_shows_error() {
        let mut app = new_app();
        run_line(&mut app, "fail /calculations 400");

        let view = app.view();
        let alert = view.alert.unwrap();
        assert_eq!(alert.tone, AlertKind::Error);
        assert_eq!(alert.message, "Request failed due to invalid parameters.");
        assert_eq!(alert.title.as_deref(), Some(NETWORK_TITLE));

        run_line(&mut app, "dismiss");
        assert!(app.view().alert.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_is_returned_to_boundary() {
        let mut app = new_app();
        let result = app.execute(Command::Fault("render crashed".to_string()));
        assert!(matches!(result, Err(AppError::Fault(_))));
        assert!(!app.alert().is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_alert_expires() {
        let mut app = new_app();
        run_line(&mut app, "info Saved");
        assert!(app.alert().is_showing());

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        assert_eq!(app.alert(), AlertDisplay::NoAlert);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resets_everything() {
        let mut app = new_app();
        run_line(&mut app, "start bulk");
        run_line(&mut app, "upload members.csv 1024");
        run_line(&mut app, r#"result {"processed": 12}"#);
        assert_eq!(app.step(), BenefitStep::Results);

        run_line(&mut app, "cancel");
        let view = app.view();
        assert_eq!(view.step, BenefitStep::Home);
        assert_eq!(view.process_kind, None);
        assert!(view.process_instance_id.is_none());
        assert!(!view.result_ready);
        assert!(view.upload.is_none());
        assert!(view.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_details_ignored_off_step() {
        let mut app = new_app();
        run_line(&mut app, details_json());
        assert_eq!(app.step(), BenefitStep::Home);
        assert!(app.view().request.is_none());
        assert!(!app.alert().is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_detaches_provider() {
        let bus = Arc::new(AlertBus::new());
        let app = App::new(bus.clone(), Handle::current(), Settings::default());
        assert!(bus.has_sink());
        app.shutdown();
        assert!(!bus.has_sink());
        bus.show_error("nobody listening", None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_line_is_skipped() {
        let mut app = new_app();
        let mut out = Vec::new();
        let read = Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        ));

        assert!(handle_input(&mut app, read, &mut out).unwrap());
        let display = app.alert();
        let alert = display.current().unwrap();
        assert_eq!(alert.kind(), AlertKind::Warning);
        assert_eq!(alert.title(), Some(UNKNOWN_COMMAND_TITLE));
        assert!(String::from_utf8(out).unwrap().contains("view-update"));

        // The next good line still runs
        let mut out = Vec::new();
        assert!(handle_input(&mut app, Ok(Some("start standard".to_string())), &mut out).unwrap());
        assert_eq!(app.step(), BenefitStep::Standard);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_read_errors_stop_the_loop() {
        let mut app = new_app();
        let mut out = Vec::new();
        let read = Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert!(handle_input(&mut app, read, &mut out).is_err());
        assert!(!handle_input(&mut app, Ok(None), &mut out).unwrap());
        assert!(!handle_input(&mut app, Ok(Some("quit".to_string())), &mut out).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_line_emits_fallback_and_resets() {
        let mut app = new_app();
        let mut out = Vec::new();
        handle_input(&mut app, Ok(Some("start bulk".to_string())), &mut out).unwrap();
        handle_input(&mut app, Ok(Some("fault render crashed".to_string())), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("fatal-error"));
        assert_eq!(app.step(), BenefitStep::Home);
    }

    #[test]
    fn test_emit_writes_event_line() {
        let mut out = Vec::new();
        emit(&mut out, "alert-update", Option::<AlertView>::None).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"event\":\"alert-update\",\"payload\":null}\n"
        );
    }
}
