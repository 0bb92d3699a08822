use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Service advertised by this device while it looks for lighting hardware.
const RESPONDER_SERVICE_TYPE: &str = "_palpalette._tcp.local.";
const RESPONDER_PORT: u16 = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredService {
    pub hostname: String,
    pub address: String,
    pub port: u16,
}

pub trait ServiceBrowser: Send + Sync {
    /// Brings up the local responder under `instance_name`.
    fn start(&self, instance_name: &str) -> Result<()>;

    /// Browses `service_type` for up to `window`, returning services in the
    /// order they resolved.
    fn query(&self, service_type: &str, window: Duration) -> Result<Vec<DiscoveredService>>;
}

#[derive(Default)]
pub struct MdnsBrowser {
    daemon: Mutex<Option<ServiceDaemon>>,
}

impl MdnsBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_daemon<T>(&self, f: impl FnOnce(&ServiceDaemon) -> Result<T>) -> Result<T> {
        let mut guard = self
            .daemon
            .lock()
            .map_err(|_| Error::DiscoveryFailed("mDNS daemon lock poisoned".to_string()))?;
        if guard.is_none() {
            let daemon = ServiceDaemon::new()
                .map_err(|e| Error::DiscoveryFailed(format!("Failed to create mDNS daemon: {e}")))?;
            *guard = Some(daemon);
        }
        match guard.as_ref() {
            Some(daemon) => f(daemon),
            None => Err(Error::DiscoveryFailed("mDNS daemon unavailable".to_string())),
        }
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn start(&self, instance_name: &str) -> Result<()> {
        self.with_daemon(|daemon| {
            let host_name = format!("{instance_name}.local.");
            let mut properties = HashMap::new();
            properties.insert("name".to_string(), instance_name.to_string());

            let info = ServiceInfo::new(
                RESPONDER_SERVICE_TYPE,
                instance_name,
                &host_name,
                "",
                RESPONDER_PORT,
                properties,
            )
            .map_err(|e| Error::DiscoveryFailed(format!("Invalid responder info: {e}")))?
            .enable_addr_auto();

            daemon
                .register(info)
                .map_err(|e| Error::DiscoveryFailed(format!("Failed to register responder: {e}")))
        })
    }

    fn query(&self, service_type: &str, window: Duration) -> Result<Vec<DiscoveredService>> {
        self.with_daemon(|daemon| {
            let receiver = daemon
                .browse(service_type)
                .map_err(|e| Error::DiscoveryFailed(format!("Failed to browse {service_type}: {e}")))?;

            let mut found: Vec<DiscoveredService> = Vec::new();
            let start = Instant::now();

            while start.elapsed() < window {
                match receiver.recv_timeout(Duration::from_millis(100)) {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        let Some(address) = info.get_addresses().iter().next().map(|a| a.to_string())
                        else {
                            continue;
                        };
                        let hostname = info.get_fullname().to_string();
                        if found.iter().any(|s| s.hostname == hostname) {
                            continue;
                        }

                        log::debug!(
                            host = hostname.as_str(),
                            ip = address.as_str(),
                            port = info.get_port();
                            "[mdns] Service resolved"
                        );
                        found.push(DiscoveredService {
                            hostname,
                            address,
                            port: info.get_port(),
                        });
                    }
                    Ok(_) => {}
                    Err(flume::RecvTimeoutError::Timeout) => continue,
                    Err(_) => break,
                }
            }

            if let Err(e) = daemon.stop_browse(service_type) {
                log::debug!(err:display = e; "[mdns] Failed to stop browse");
            }
            Ok(found)
        })
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.daemon.lock() {
            if let Some(daemon) = guard.take() {
                let _ = daemon.shutdown();
            }
        }
    }
}
