// Windows service control manager integration

use crate::app::{App, RunMode};
use crate::collector::StopHandle;
use crate::config::Config;
use crate::error::Result;
use crate::exporter::MetricsEndpoint;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "WindowsServicesObserver";
pub const SERVICE_DISPLAY_NAME: &str = "Windows Services Observer";
pub const SERVICE_DESCRIPTION: &str = "Monitors the Windows services defined in a list";

/// State reported back to the service control manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    StartPending,
    Running,
    Stopped,
}

/// Receives the status updates of a hosted run
pub trait StatusReporter {
    fn report(&self, state: HostState, exit_code: u32) -> Result<()>;
}

/// Command line overrides baked into the installed service's launch arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOverrides {
    pub services: Vec<String>,
    pub interval: Option<u64>,
    pub port: Option<u16>,
}

/// Body of the hosted service.
///
/// `StartPending` is reported before anything fallible runs, and every exit
/// path ends with `Stopped`: exit code 0 after a clean stop, 1 when setup or
/// the run failed.
pub fn run_hosted(config: Config, stop: StopHandle, reporter: &dyn StatusReporter) -> Result<()> {
    reporter.report(HostState::StartPending, 0)?;

    let result = serve_hosted(config, stop, reporter);
    if let Err(e) = &result {
        tracing::error!("Service run failed: {:#}", e);
    }

    let exit_code = if result.is_ok() { 0 } else { 1 };
    if let Err(e) = reporter.report(HostState::Stopped, exit_code) {
        tracing::warn!("Failed to report stopped state: {:#}", e);
    }
    result
}

fn serve_hosted(config: Config, stop: StopHandle, reporter: &dyn StatusReporter) -> Result<()> {
    let app = App::with_stop_handle(config, RunMode::Service, stop)?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let endpoint = MetricsEndpoint::bind(app.metrics_addr()?, Arc::clone(&app.gauges)).await?;
        reporter.report(HostState::Running, 0)?;
        app.serve(endpoint).await
    })
}

/// Arguments the service manager passes when it launches the service.
/// Global options go before the `service` verb.
pub fn launch_arguments(config_path: Option<PathBuf>, overrides: &LaunchOverrides) -> Result<Vec<OsString>> {
    let mut arguments = Vec::new();
    if let Some(path) = config_path {
        arguments.push(OsString::from("--config"));
        arguments.push(std::fs::canonicalize(path)?.into_os_string());
    }
    for service in &overrides.services {
        arguments.push(OsString::from("--service"));
        arguments.push(OsString::from(service));
    }
    if let Some(interval) = overrides.interval {
        arguments.push(OsString::from("--interval"));
        arguments.push(OsString::from(interval.to_string()));
    }
    if let Some(port) = overrides.port {
        arguments.push(OsString::from("--port"));
        arguments.push(OsString::from(port.to_string()));
    }
    arguments.push(OsString::from("service"));
    Ok(arguments)
}

/// Hand the process to the service control dispatcher. Blocks until the
/// service is stopped.
#[cfg(windows)]
pub fn run_dispatcher(config: Config) -> Result<()> {
    windows_host::run_dispatcher(config)
}

/// Register this executable as an auto-start service
#[cfg(windows)]
pub fn install(config_path: Option<PathBuf>, overrides: &LaunchOverrides) -> Result<()> {
    windows_host::install(launch_arguments(config_path, overrides)?)
}

#[cfg(windows)]
pub fn remove() -> Result<()> {
    windows_host::remove()
}

#[cfg(windows)]
pub fn start() -> Result<()> {
    windows_host::start()
}

#[cfg(windows)]
pub fn stop() -> Result<()> {
    windows_host::stop()
}

#[cfg(not(windows))]
pub fn run_dispatcher(_config: Config) -> Result<()> {
    Err(unsupported("service"))
}

#[cfg(not(windows))]
pub fn install(_config_path: Option<PathBuf>, _overrides: &LaunchOverrides) -> Result<()> {
    Err(unsupported("install"))
}

#[cfg(not(windows))]
pub fn remove() -> Result<()> {
    Err(unsupported("remove"))
}

#[cfg(not(windows))]
pub fn start() -> Result<()> {
    Err(unsupported("start"))
}

#[cfg(not(windows))]
pub fn stop() -> Result<()> {
    Err(unsupported("stop"))
}

#[cfg(not(windows))]
fn unsupported(verb: &str) -> anyhow::Error {
    crate::error::ObserverError::ServiceHost(format!(
        "'{}' requires the Windows service control manager",
        verb
    ))
    .into()
}

#[cfg(windows)]
mod windows_host {
    use super::{
        run_hosted, HostState, StatusReporter, SERVICE_DESCRIPTION, SERVICE_DISPLAY_NAME, SERVICE_NAME,
    };
    use crate::collector::StopHandle;
    use crate::config::Config;
    use crate::error::{ObserverError, Result};
    use std::ffi::{OsStr, OsString};
    use std::sync::OnceLock;
    use std::time::Duration;
    use windows_service::service::{
        ServiceAccess, ServiceControl, ServiceControlAccept, ServiceErrorControl, ServiceExitCode, ServiceInfo,
        ServiceStartType, ServiceState, ServiceStatus, ServiceType,
    };
    use windows_service::service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle};
    use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};
    use windows_service::{define_windows_service, service_dispatcher};

    static SERVICE_CONFIG: OnceLock<Config> = OnceLock::new();

    define_windows_service!(ffi_service_main, service_main);

    fn host_error(e: windows_service::Error) -> ObserverError {
        ObserverError::ServiceHost(e.to_string())
    }

    pub fn run_dispatcher(config: Config) -> Result<()> {
        SERVICE_CONFIG
            .set(config)
            .map_err(|_| ObserverError::ServiceHost("dispatcher already started".to_string()))?;
        service_dispatcher::start(SERVICE_NAME, ffi_service_main).map_err(host_error)?;
        Ok(())
    }

    fn service_main(_arguments: Vec<OsString>) {
        if let Err(e) = run_service() {
            tracing::error!("Service failed: {:#}", e);
        }
    }

    /// Status updates go straight to the service manager
    struct ScmStatus(ServiceStatusHandle);

    impl StatusReporter for ScmStatus {
        fn report(&self, state: HostState, exit_code: u32) -> Result<()> {
            let (current_state, controls_accepted) = match state {
                HostState::StartPending => (ServiceState::StartPending, ServiceControlAccept::empty()),
                HostState::Running => (
                    ServiceState::Running,
                    ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
                ),
                HostState::Stopped => (ServiceState::Stopped, ServiceControlAccept::empty()),
            };

            self.0
                .set_service_status(ServiceStatus {
                    service_type: ServiceType::OWN_PROCESS,
                    current_state,
                    controls_accepted,
                    exit_code: ServiceExitCode::Win32(exit_code),
                    checkpoint: 0,
                    wait_hint: Duration::from_secs(10),
                    process_id: None,
                })
                .map_err(host_error)?;
            Ok(())
        }
    }

    fn run_service() -> Result<()> {
        // Registered before any fallible setup runs
        let stop = StopHandle::new();
        let handler_stop = stop.clone();

        let event_handler = move |control_event| -> ServiceControlHandlerResult {
            match control_event {
                ServiceControl::Stop | ServiceControl::Shutdown => {
                    tracing::info!("Received stop/shutdown from the service manager");
                    handler_stop.stop();
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            }
        };

        let status_handle = service_control_handler::register(SERVICE_NAME, event_handler).map_err(host_error)?;
        let reporter = ScmStatus(status_handle);

        match SERVICE_CONFIG.get().cloned() {
            Some(config) => run_hosted(config, stop, &reporter),
            None => {
                reporter.report(HostState::Stopped, 1)?;
                Err(ObserverError::ServiceHost("service started without configuration".to_string()).into())
            }
        }
    }

    pub fn install(launch_arguments: Vec<OsString>) -> Result<()> {
        let manager = ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )
        .map_err(host_error)?;

        let info = ServiceInfo {
            name: OsString::from(SERVICE_NAME),
            display_name: OsString::from(SERVICE_DISPLAY_NAME),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::AutoStart,
            error_control: ServiceErrorControl::Normal,
            executable_path: std::env::current_exe()?,
            launch_arguments,
            dependencies: vec![],
            account_name: None,
            account_password: None,
        };

        let service = manager
            .create_service(&info, ServiceAccess::CHANGE_CONFIG)
            .map_err(host_error)?;
        service.set_description(SERVICE_DESCRIPTION).map_err(host_error)?;

        tracing::info!("Installed service {}", SERVICE_NAME);
        Ok(())
    }

    pub fn remove() -> Result<()> {
        let service = open(ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE)?;

        if service.query_status().map_err(host_error)?.current_state != ServiceState::Stopped {
            service.stop().map_err(host_error)?;
        }
        service.delete().map_err(host_error)?;

        tracing::info!("Removed service {}", SERVICE_NAME);
        Ok(())
    }

    pub fn start() -> Result<()> {
        let service = open(ServiceAccess::START)?;
        service.start(&[] as &[&OsStr]).map_err(host_error)?;
        tracing::info!("Start requested for {}", SERVICE_NAME);
        Ok(())
    }

    pub fn stop() -> Result<()> {
        let service = open(ServiceAccess::STOP)?;
        service.stop().map_err(host_error)?;
        tracing::info!("Stop requested for {}", SERVICE_NAME);
        Ok(())
    }

    fn open(access: ServiceAccess) -> Result<windows_service::service::Service> {
        let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT).map_err(host_error)?;
        Ok(manager.open_service(SERVICE_NAME, access).map_err(host_error)?)
    }
}
