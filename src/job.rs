use crate::checker::Verdict;
use crate::http_probe::{ProbeOutcome, ServiceProbe, DEFAULT_TIMEOUT};
use crate::importer::{is_truthy, Endpoint, Importer, ImporterError, HYPERVISOR_SERVICE, SUPERVISOR_SERVICE};
use crate::plugin::{Options, PluginParams};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const LOCAL_GUIDANCE: &str = "Importer error, please check local logs";
pub const REMOTE_GUIDANCE: &str = "Importer error, please check remote end";

const OFFLINE: &str = "offline";
const FINISHED: &str = "FINISHED";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    Importer(&'static str),
    #[error("unknown check {0:?}")]
    UnknownCheck(String)
}

/// The VM a job watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub address: String,
    pub service_url: Option<String>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    RestartVm,
    GetServiceStatus,
    GetStatus
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::RestartVm => "restart_vm",
            Check::GetServiceStatus => "get_service_status",
            Check::GetStatus => "get_status"
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Check {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart_vm" => Ok(Check::RestartVm),
            "get_service_status" => Ok(Check::GetServiceStatus),
            "get_status" => Ok(Check::GetStatus),
            other => Err(JobError::UnknownCheck(other.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct SupervisorReply {
    status: HashMap<String, ServiceCheck>
}

#[derive(Deserialize)]
struct ServiceCheck {
    check_status: String
}

pub struct Job {
    options: Options,
    target: TargetInfo,
    params: PluginParams,
    remote: Endpoint,
    importer: Arc<dyn Importer>,
    probe: Arc<dyn ServiceProbe>
}

impl Job {
    pub fn new(options: Options, target: TargetInfo, params: PluginParams,
               importer: Arc<dyn Importer>, probe: Arc<dyn ServiceProbe>) -> Self {
        let remote = Endpoint::exporter(&target.address, params.importer_tcp_timeout);
        Self{
            options: options,
            target: target,
            params: params,
            remote: remote,
            importer: importer,
            probe: probe
        }
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    /// Runs the check selected by name in the host configuration.
    pub fn run(&self, check: Check) -> Result<Verdict, JobError> {
        debug!("Running {} for {}", check, self.target.address);
        let verdict = match check {
            Check::RestartVm => self.restart_vm(),
            Check::GetServiceStatus => self.get_service_status(),
            Check::GetStatus => self.get_status()
        }?;
        info!("{} {} -> {}", self.target.address, check, verdict);
        Ok(verdict)
    }

    /// Starts the VM when the local hypervisor reports it offline.
    pub fn restart_vm(&self) -> Result<Verdict, JobError> {
        self.try_restart_vm().map_err(|e| {
            error!("restart_vm on {} failed: {}", self.target.address, e);
            JobError::Importer(LOCAL_GUIDANCE)
        })
    }

    /// Checks that the guest service URL answers, provided the VM is up.
    pub fn get_service_status(&self) -> Result<Verdict, JobError> {
        self.try_get_service_status().map_err(|e| {
            error!("get_service_status on {} failed: {}", self.target.address, e);
            JobError::Importer(LOCAL_GUIDANCE)
        })
    }

    /// Aggregates VM power states of the remote hypervisor with the service
    /// checks already gathered by the supervision service.
    pub fn get_status(&self) -> Result<Verdict, JobError> {
        self.try_get_status().map_err(|e| {
            error!("get_status on {} failed: {}", self.target.address, e);
            JobError::Importer(REMOTE_GUIDANCE)
        })
    }

    fn local(&self) -> Endpoint {
        Endpoint::exporter("localhost", self.params.importer_tcp_timeout)
    }

    fn try_restart_vm(&self) -> Result<Verdict, ImporterError> {
        let local = self.local();
        let states = self.vm_states(&local)?;
        let online = match states.get(&self.target.address).map(String::as_str) {
            None => return Ok(Verdict::error("VM unknown to hypervisor")),
            Some(OFFLINE) => {
                info!("VM {} is offline, starting it", self.target.address);
                let started = self.importer.call(&local, HYPERVISOR_SERVICE, "domain_start", &[json!(self.target.address)])?;
                is_truthy(&started)
            },
            Some(_) => true
        };
        if online {
            Ok(Verdict::finished("VM online"))
        } else {
            Ok(Verdict::error("VM offline"))
        }
    }

    fn try_get_service_status(&self) -> Result<Verdict, ImporterError> {
        let states = self.vm_states(&self.local())?;
        match states.get(&self.target.address).map(String::as_str) {
            None => return Ok(Verdict::error("VM unknown to hypervisor")),
            Some(OFFLINE) => return Ok(Verdict::error("VM offline")),
            Some(_) => {}
        }
        let url = match self.service_url() {
            Some(url) => url,
            None => return Ok(Verdict::error("Unknown URL scheme"))
        };
        let timeout = self.params.importer_tcp_timeout.unwrap_or(DEFAULT_TIMEOUT);
        let verdict = match self.probe.get(&url, timeout) {
            ProbeOutcome::Up => Verdict::finished("VM service URL is up"),
            ProbeOutcome::Status(code) => Verdict::error(format!("HTTP server returned code: {}", code)),
            ProbeOutcome::Unreachable(reason) => Verdict::error(format!("VM service URL unreachable: {}", reason))
        };
        Ok(verdict)
    }

    fn try_get_status(&self) -> Result<Verdict, ImporterError> {
        let states = self.vm_states(&self.remote)?;
        let supervisor = Endpoint::exporter(&self.options.supervisor_host, self.params.importer_tcp_timeout);
        let reply = self.importer.call(
            &supervisor,
            SUPERVISOR_SERVICE,
            "get_status",
            &[json!(self.options.name), json!(Check::GetServiceStatus.name())])?;
        let services: SupervisorReply = serde_json::from_value(reply).map_err(|e| ImporterError::Protocol{
            url: supervisor.url.clone(),
            reason: e.to_string()})?;

        let offline_vms = states.values().filter(|state| *state == OFFLINE).count();
        let offline_services = services.status.values().filter(|s| s.check_status != FINISHED).count();
        if offline_vms > 0 || offline_services > 0 {
            Ok(Verdict::error(format!(
                "{} of {} VMs currently offline plus {} of {} VMs services down",
                offline_vms, states.len(), offline_services, services.status.len())))
        } else {
            Ok(Verdict::finished("All VMs and services currently online"))
        }
    }

    fn vm_states(&self, endpoint: &Endpoint) -> Result<HashMap<String, String>, ImporterError> {
        let reply = self.importer.call(endpoint, HYPERVISOR_SERVICE, "get_status", &[])?;
        let protocol = |reason: String| ImporterError::Protocol{url: endpoint.url.clone(), reason: reason};
        match reply {
            Value::Object(map) => map.into_iter()
                .map(|(vm, state)| match state {
                    Value::String(s) => Ok((vm, s)),
                    other => Err(protocol(format!("state of {} is not a string: {}", vm, other)))
                })
                .collect(),
            other => Err(protocol(format!("expected a VM status map, got {}", other)))
        }
    }

    fn service_url(&self) -> Option<Url> {
        let raw = self.target.service_url.as_deref()?;
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" => Some(url),
            Ok(url) => {
                debug!("Refusing service URL scheme {:?} for {}", url.scheme(), self.target.address);
                None
            },
            Err(e) => {
                debug!("Cannot parse service URL {:?}: {}", raw, e);
                None
            }
        }
    }
}
