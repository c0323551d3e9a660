//! Hysteresis lifecycle for the auxiliary network service.
//!
//! The network stack (AP, DNS, HTTP configurator) runs whenever the vehicle
//! needs attention and shuts down only after the system has been
//! continuously healthy for a full dwell period, so a flapping link cannot
//! cycle the stack.  Start failures are logged and retried on the next
//! evaluation; they are never fatal.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::ports::{NetworkService, ServiceFactory};
use crate::telemetry::{EventFrame, TelemetrySnapshot};

/// How long the system must stay healthy before the service stops.
pub const HEALTHY_DWELL: Duration = Duration::from_millis(5000);

/// One observation of system health, taken by the caller each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSample {
    pub is_receiving: bool,
    pub has_error: bool,
    /// User override: keep the configurator up regardless of health.
    pub keep_running: bool,
}

impl HealthSample {
    fn needs_network(self) -> bool {
        !self.is_receiving || self.has_error || self.keep_running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Running,
}

pub struct NetworkSupervisor<F: ServiceFactory> {
    factory: F,
    service: Option<Box<dyn NetworkService>>,
    healthy_since: Option<Instant>,
    dwell: Duration,
}

impl<F: ServiceFactory> NetworkSupervisor<F> {
    pub fn new(factory: F) -> Self {
        Self::with_dwell(factory, HEALTHY_DWELL)
    }

    pub fn with_dwell(factory: F, dwell: Duration) -> Self {
        Self {
            factory,
            service: None,
            healthy_since: None,
            dwell,
        }
    }

    pub fn state(&self) -> SupervisorState {
        if self.service.is_some() {
            SupervisorState::Running
        } else {
            SupervisorState::Stopped
        }
    }

    /// One supervision cycle (~10 Hz).  Starts or stops the service per the
    /// hysteresis rule, pumps it while running, and pushes a telemetry
    /// frame when one is provided.
    pub fn update(
        &mut self,
        now: Instant,
        health: HealthSample,
        telemetry: Option<&TelemetrySnapshot>,
    ) {
        let needed = health.needs_network();

        if self.service.is_none() {
            if needed {
                // A fresh instance per running period: no client or socket
                // state survives a restart.
                let mut service = self.factory.create();
                match service.start() {
                    Ok(()) => {
                        info!("network service started");
                        self.service = Some(service);
                        self.healthy_since = None;
                    }
                    Err(e) => {
                        warn!("network service start failed ({e}), will retry");
                    }
                }
            }
            return;
        }

        if needed {
            // Any unhealthy observation restarts the dwell clock.
            self.healthy_since = None;
        } else {
            let since = *self.healthy_since.get_or_insert(now);
            if now.duration_since(since) >= self.dwell {
                info!("system healthy for {:?}, stopping network service", self.dwell);
                if let Some(mut service) = self.service.take() {
                    service.stop();
                }
                self.healthy_since = None;
                return;
            }
        }

        if let Some(service) = self.service.as_mut() {
            service.pump();
            if let Some(snapshot) = telemetry {
                service.emit(&EventFrame::Telemetry(*snapshot));
            }
        }
    }
}
