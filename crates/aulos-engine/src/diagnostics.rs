// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Diagnostics relay and the optional remote-communication service.
//!
//! Every record the engine surfaces flows through [`DiagnosticsChannel`]:
//! records below the configured minimum severity are dropped, the rest are
//! forwarded to the caller-supplied sink. The sink executes on the engine's
//! reporting path and must not block materially.
//!
//! The remote-communication service accepts connections from external
//! authoring tools. Its failure to start is soft: it is reported as a
//! `Severity::Message` record and never aborts anything.

use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use aulos_core::settings::DiagnosticsSettings;
use aulos_core::telemetry::{codes, ErrorRecord, ErrorSink, Severity};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Severity-filtered relay of engine diagnostics, plus the remote service.
pub struct DiagnosticsChannel {
    min_severity: Severity,
    sink: RwLock<Option<Arc<dyn ErrorSink>>>,
    comm: Mutex<Option<CommService>>,
}

impl DiagnosticsChannel {
    /// Creates the channel and, when enabled, starts the communication
    /// service.
    ///
    /// Never fails: a communication start failure is returned as the
    /// `Severity::Message` record that describes it, alongside the channel.
    pub fn init(settings: &DiagnosticsSettings) -> (Arc<Self>, Option<ErrorRecord>) {
        let channel = Arc::new(Self {
            min_severity: settings.min_severity,
            sink: RwLock::new(None),
            comm: Mutex::new(None),
        });

        if !settings.enabled {
            log::info!("Remote communication disabled by configuration.");
            return (channel, None);
        }

        let warning = match CommService::start(settings.port, &settings.app_network_name) {
            Ok(service) => {
                log::info!(
                    "Remote communication listening on {} as '{}'.",
                    service.local_addr,
                    settings.app_network_name
                );
                *channel.comm.lock().unwrap() = Some(service);
                None
            }
            Err(bind_err) => {
                let record = ErrorRecord::new(
                    codes::COMM_INIT_FAILED,
                    Severity::Message,
                    format!(
                        "remote communication failed to start on port {}: {bind_err}. \
                         Connections from authoring tools will not be possible.",
                        settings.port
                    ),
                );
                log::warn!("{}", record.text);
                Some(record)
            }
        };
        (channel, warning)
    }

    /// Registers the caller's sink. Replaces any previous sink.
    pub fn set_sink(&self, sink: Arc<dyn ErrorSink>) {
        *self.sink.write().unwrap() = Some(sink);
    }

    /// Filters a record against the minimum severity and forwards it.
    pub fn report(&self, record: &ErrorRecord) {
        if record.severity < self.min_severity {
            return;
        }
        let sink = self.sink.read().unwrap().clone();
        match sink {
            Some(sink) => sink.handle(record),
            None => log::debug!("Diagnostic record discarded (no sink): {}", record.text),
        }
    }

    /// The address the communication service is listening on, if it runs.
    pub fn comm_addr(&self) -> Option<SocketAddr> {
        self.comm.lock().unwrap().as_ref().map(|c| c.local_addr)
    }

    /// Stops the communication service. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(service) = self.comm.lock().unwrap().take() {
            service.stop();
        }
        *self.sink.write().unwrap() = None;
        log::info!("Diagnostics channel shut down.");
    }
}

impl ErrorSink for DiagnosticsChannel {
    fn handle(&self, record: &ErrorRecord) {
        self.report(record);
    }
}

/// The accept loop for authoring-tool connections.
struct CommService {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl CommService {
    fn start(port: u16, app_network_name: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let stop = Arc::new(AtomicBool::new(false));
        let announce = format!("{app_network_name}\n");
        let thread = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("aulos-comm".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        match listener.accept() {
                            Ok((mut stream, peer)) => {
                                log::info!("Authoring tool connected from {peer}.");
                                if stream.write_all(announce.as_bytes()).is_err() {
                                    log::debug!("Greeting to {peer} failed.");
                                }
                            }
                            Err(accept_err)
                                if accept_err.kind() == std::io::ErrorKind::WouldBlock =>
                            {
                                std::thread::sleep(ACCEPT_POLL_INTERVAL);
                            }
                            Err(accept_err) => {
                                log::warn!("Accept failed: {accept_err}");
                                std::thread::sleep(ACCEPT_POLL_INTERVAL);
                            }
                        }
                    }
                })?
        };

        Ok(Self {
            local_addr,
            stop,
            thread,
        })
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.thread.join().is_err() {
            log::error!("Communication thread panicked during shutdown.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        records: StdMutex<Vec<ErrorRecord>>,
    }

    impl ErrorSink for RecordingSink {
        fn handle(&self, record: &ErrorRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn settings(enabled: bool, min_severity: Severity) -> DiagnosticsSettings {
        DiagnosticsSettings {
            enabled,
            // Port 0 asks the OS for a free port.
            port: 0,
            min_severity,
            ..Default::default()
        }
    }

    #[test]
    fn records_below_the_minimum_severity_are_dropped() {
        let (channel, warning) = DiagnosticsChannel::init(&settings(false, Severity::Error));
        assert!(warning.is_none());

        let sink = Arc::new(RecordingSink::default());
        channel.set_sink(sink.clone());

        channel.report(&ErrorRecord::new(1, Severity::Message, "chatter"));
        channel.report(&ErrorRecord::new(2, Severity::Error, "trouble"));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, 2);
        drop(records);
        channel.shutdown();
    }

    #[test]
    fn comm_bind_failure_is_a_message_not_an_error() {
        // Occupy a port, then ask the service to bind the same one.
        let blocker = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = blocker.local_addr().unwrap().port();

        let (channel, warning) = DiagnosticsChannel::init(&DiagnosticsSettings {
            enabled: true,
            port,
            ..Default::default()
        });

        let record = warning.expect("bind failure should be reported");
        assert_eq!(record.severity, Severity::Message);
        assert_eq!(record.code, codes::COMM_INIT_FAILED);
        assert!(channel.comm_addr().is_none());
        channel.shutdown();
    }

    #[test]
    fn comm_service_greets_with_the_network_name() {
        let (channel, warning) = DiagnosticsChannel::init(&DiagnosticsSettings {
            enabled: true,
            port: 0,
            app_network_name: "Test Runtime".to_string(),
            ..Default::default()
        });
        assert!(warning.is_none());

        let addr = channel.comm_addr().expect("service should be listening");
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        let mut greeting = String::new();
        use std::io::Read;
        stream.read_to_string(&mut greeting).unwrap();
        assert_eq!(greeting, "Test Runtime\n");

        channel.shutdown();
        // A second shutdown is a no-op.
        channel.shutdown();
    }
}
