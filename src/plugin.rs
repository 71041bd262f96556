use crate::config::ConfigError;
use crate::http_probe::{HttpProbe, ServiceProbe};
use crate::importer::{HttpImporter, Importer};
use crate::job::{Job, TargetInfo};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use yaml_rust::Yaml;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer
}

impl ParamKind {
    fn accepts(&self, value: &Yaml) -> bool {
        match self {
            ParamKind::Integer => matches!(value, Yaml::Integer(_))
        }
    }
}

/// Host-level options shared by every job of a plugin instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Name under which the supervision service files this plugin's results.
    pub name: String,
    /// Host running the supervision service exporter.
    pub supervisor_host: String
}

impl Default for Options {
    fn default() -> Self {
        Self{name: String::from(Plugin::NAME), supervisor_host: String::from("localhost")}
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginParams {
    pub importer_tcp_timeout: Option<Duration>
}

impl PluginParams {
    /// Validates a `plugin:` section against the declared parameters.
    pub fn from_yaml(section: &Yaml) -> Result<Self, ConfigError> {
        let mut params = Self::default();
        let hash = match section {
            Yaml::BadValue | Yaml::Null => return Ok(params),
            Yaml::Hash(h) => h,
            _ => return Err(ConfigError::Invalid(String::from("plugin parameters should be a hashmap")))
        };
        for (name, _) in Plugin::REQUIRED {
            if section[*name].is_badvalue() {
                return Err(ConfigError::Invalid(format!("missing required parameter {}", name)));
            }
        }
        for (key, value) in hash {
            let key = key.as_str()
                .ok_or_else(|| ConfigError::Invalid(format!("parameter name should be a string: {:?}", key)))?;
            let kind = Plugin::REQUIRED.iter()
                .chain(Plugin::OPTIONAL.iter())
                .find(|(name, _)| *name == key)
                .map(|(_, kind)| *kind)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown parameter {}", key)))?;
            if !kind.accepts(value) {
                return Err(ConfigError::Invalid(format!("parameter {} should be {:?}", key, kind)));
            }
            match (key, value) {
                ("importer_tcp_timeout", Yaml::Integer(secs)) => {
                    let secs = u64::try_from(*secs)
                        .map_err(|_| ConfigError::Invalid(format!("importer_tcp_timeout should not be negative: {}", secs)))?;
                    params.importer_tcp_timeout = Some(Duration::from_secs(secs));
                },
                _ => {}
            }
        }
        Ok(params)
    }
}

pub struct Plugin {
    options: Options,
    params: PluginParams,
    importer: Arc<dyn Importer>,
    probe: Arc<dyn ServiceProbe>
}

impl Plugin {
    pub const NAME: &'static str = "virtmonitor";
    pub const REQUIRED: &'static [(&'static str, ParamKind)] = &[];
    pub const OPTIONAL: &'static [(&'static str, ParamKind)] = &[
        ("importer_tcp_timeout", ParamKind::Integer)
    ];

    pub fn new(options: Options, params: PluginParams) -> Self {
        Self::with_transport(options, params, Arc::new(HttpImporter::new()), Arc::new(HttpProbe::new()))
    }

    pub fn with_transport(options: Options, params: PluginParams,
                          importer: Arc<dyn Importer>, probe: Arc<dyn ServiceProbe>) -> Self {
        Self{options: options, params: params, importer: importer, probe: probe}
    }

    pub fn params(&self) -> &PluginParams {
        &self.params
    }

    pub fn create_new_job(&self, target: TargetInfo) -> Job {
        debug!("New {} job for {}", self.options.name, target.address);
        Job::new(
            self.options.clone(),
            target,
            self.params.clone(),
            Arc::clone(&self.importer),
            Arc::clone(&self.probe))
    }
}
