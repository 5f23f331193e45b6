//! Sequential initialization: discover once, then admit each desired service.
//!
//! The first service that is rejected or times out aborts the run.
//! Services admitted before it stay admitted.

use crate::broker::{BrokerClient, ConnectionRequester, DiscoveryWaiter};
use crate::clock::Clock;
use crate::config::InitConfig;
use crate::models::{AdmissionRequest, ConnectionParameters, DesiredService, ServiceDescriptor};
use crate::Result;
use tracing::info;

/// A network service the broker admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConnection {
    pub service: String,
    pub parameters: ConnectionParameters,
}

/// How an initialization run ended successfully.
#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// The workload asked for no services.
    NothingRequested,
    /// The local NSM has no network services.
    NoServicesDiscovered,
    /// Every desired service was admitted, in list order.
    Connected(Vec<ServiceConnection>),
}

/// Drives one initialization run against a broker.
pub struct Initializer<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> {
    config: &'a InitConfig,
    broker: &'a B,
    clock: &'a C,
}

impl<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> Initializer<'a, B, C> {
    pub fn new(config: &'a InitConfig, broker: &'a B, clock: &'a C) -> Self {
        Self {
            config,
            broker,
            clock,
        }
    }

    /// Connect the workload to each of `desired`, in order.
    ///
    /// `linux_namespace` is the handle of the network namespace the broker
    /// should program.
    pub async fn run(
        &self,
        desired: &[DesiredService],
        linux_namespace: &str,
    ) -> Result<InitOutcome> {
        if desired.is_empty() {
            info!("nsm client: no NetworkServices requested, nothing to do");
            return Ok(InitOutcome::NothingRequested);
        }

        let available = DiscoveryWaiter::new(self.broker, self.clock)
            .discover(&self.config.policy)
            .await?;

        if available.is_empty() {
            info!("nsm client: Local NSM does not have any NetworkServices, exiting...");
            return Ok(InitOutcome::NoServicesDiscovered);
        }
        log_discovered(&available);

        let mut connections = Vec::with_capacity(desired.len());
        for service in desired {
            let request = AdmissionRequest::for_service(
                self.config.request_id.clone(),
                self.config.requester.clone(),
                linux_namespace,
                service,
            );
            info!(
                "Connection request: {:?} number of interfaces: {}",
                request,
                request.interfaces.len()
            );

            let parameters = ConnectionRequester::new(self.broker, self.clock)
                .request_connection(&request, &self.config.policy)
                .await?;

            info!(
                "nsm client: connection to Network Service {} succeeded, connection parameters: {}",
                service.name, parameters
            );
            connections.push(ServiceConnection {
                service: service.name.clone(),
                parameters,
            });
        }

        info!("nsm client: initialization is completed successfully");
        Ok(InitOutcome::Connected(connections))
    }
}

fn log_discovered(services: &[ServiceDescriptor]) {
    info!("nsm client: list of discovered network services:");
    for svc in services {
        info!("      network service: {}", svc.metadata);
        for channel in &svc.channels {
            info!("            Channel: {}", channel.metadata);
            for iface in &channel.interfaces {
                info!(
                    "                  Interface type: {} preference: {}",
                    iface.interface_type, iface.preference
                );
            }
        }
    }
    info!(
        "nsm client: {} NetworkServices discovered from Local NSM.",
        services.len()
    );
}
