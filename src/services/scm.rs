// Service control manager backed registry

use crate::services::ServiceRegistry;

#[cfg(windows)]
pub use windows_impl::ScmRegistry;

/// Registry for the current host
#[cfg(windows)]
pub fn system_registry() -> Box<dyn ServiceRegistry> {
    Box::new(ScmRegistry)
}

/// Registry for the current host
#[cfg(not(windows))]
pub fn system_registry() -> Box<dyn ServiceRegistry> {
    Box::new(UnsupportedRegistry)
}

/// Stand-in on hosts without a service control manager: every lookup fails
#[cfg(not(windows))]
pub struct UnsupportedRegistry;

#[cfg(not(windows))]
impl ServiceRegistry for UnsupportedRegistry {
    fn query(&self, name: &str) -> crate::error::Result<crate::services::ServiceRecord> {
        Err(crate::error::ObserverError::ServiceLookup {
            service: name.to_string(),
            message: "the service control manager is only available on Windows".to_string(),
        }
        .into())
    }
}

/// Decode a NUL-terminated UTF-16 description and fold its line breaks
/// and indentation into single spaces.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn decode_description(wide: &[u16]) -> String {
    let end = wide.iter().position(|&unit| unit == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(windows)]
mod windows_impl {
    use crate::error::{ObserverError, Result};
    use crate::services::{ServiceRecord, ServiceRegistry};
    use windows_service::service::{ServiceAccess, ServiceStartType, ServiceState};
    use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

    /// Reads service status and configuration through the local SCM
    pub struct ScmRegistry;

    impl ServiceRegistry for ScmRegistry {
        fn query(&self, name: &str) -> Result<ServiceRecord> {
            let lookup_error = |e: windows_service::Error| ObserverError::ServiceLookup {
                service: name.to_string(),
                message: e.to_string(),
            };

            let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
                .map_err(lookup_error)?;
            let service = manager
                .open_service(name, ServiceAccess::QUERY_STATUS | ServiceAccess::QUERY_CONFIG)
                .map_err(lookup_error)?;

            let status = service.query_status().map_err(lookup_error)?;
            let config = service.query_config().map_err(lookup_error)?;

            Ok(ServiceRecord {
                name: name.to_string(),
                display_name: config.display_name.to_string_lossy().into_owned(),
                binpath: config.executable_path.to_string_lossy().into_owned(),
                username: config
                    .account_name
                    .map(|account| account.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                start_type: start_type_label(config.start_type).to_string(),
                status: state_label(status.current_state).to_string(),
                pid: status.process_id.filter(|pid| *pid != 0),
                description: query_description(name),
            })
        }
    }

    /// The SCM description is optional metadata; failures leave it blank
    fn query_description(name: &str) -> String {
        match description::query(name) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Failed to read description of {}: {}", name, e);
                String::new()
            }
        }
    }

    fn state_label(state: ServiceState) -> &'static str {
        match state {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::StartPending => "start_pending",
            ServiceState::StopPending => "stop_pending",
            ServiceState::ContinuePending => "continue_pending",
            ServiceState::PausePending => "pause_pending",
            ServiceState::Paused => "paused",
        }
    }

    fn start_type_label(start_type: ServiceStartType) -> &'static str {
        match start_type {
            ServiceStartType::AutoStart => "automatic",
            ServiceStartType::OnDemand => "manual",
            ServiceStartType::Disabled => "disabled",
            ServiceStartType::BootStart => "boot",
            ServiceStartType::SystemStart => "system",
        }
    }

    mod description {
        use crate::services::scm::decode_description;
        use windows::core::PCWSTR;
        use windows::Win32::System::Services::{
            CloseServiceHandle, OpenSCManagerW, OpenServiceW, QueryServiceConfig2W, SC_HANDLE, SC_MANAGER_CONNECT,
            SERVICE_CONFIG_DESCRIPTION, SERVICE_DESCRIPTIONW, SERVICE_QUERY_CONFIG,
        };

        /// Closes the wrapped SCM handle on drop
        struct ScHandle(SC_HANDLE);

        impl Drop for ScHandle {
            fn drop(&mut self) {
                unsafe {
                    let _ = CloseServiceHandle(self.0);
                }
            }
        }

        /// `SERVICE_CONFIG_DESCRIPTION` through `QueryServiceConfig2W`
        pub fn query(name: &str) -> windows::core::Result<String> {
            let wide_name: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

            unsafe {
                let manager = ScHandle(OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT)?);
                let service = ScHandle(OpenServiceW(manager.0, PCWSTR(wide_name.as_ptr()), SERVICE_QUERY_CONFIG)?);

                // Sizing call, expected to fail with ERROR_INSUFFICIENT_BUFFER
                let mut needed = 0u32;
                let _ = QueryServiceConfig2W(service.0, SERVICE_CONFIG_DESCRIPTION, None, &mut needed);
                if needed == 0 {
                    return Ok(String::new());
                }

                // u64 backing keeps the embedded pointer aligned
                let mut buffer = vec![0u64; (needed as usize).div_ceil(8)];
                let bytes = std::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), buffer.len() * 8);
                QueryServiceConfig2W(service.0, SERVICE_CONFIG_DESCRIPTION, Some(bytes), &mut needed)?;

                let info = &*buffer.as_ptr().cast::<SERVICE_DESCRIPTIONW>();
                if info.lpDescription.is_null() {
                    return Ok(String::new());
                }
                Ok(decode_description(info.lpDescription.as_wide()))
            }
        }
    }
}
