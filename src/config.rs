use clap::{value_parser, Arg, ArgAction, Command};
use log::debug;
use yaml_rust::{Yaml, YamlLoader, ScanError};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::job::{Check, TargetInfo};
use crate::plugin::{Options, PluginParams};

pub const DEFAULT_INTERVAL: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] ScanError),
    #[error("{0}")]
    Invalid(String)
}

pub struct CmdOptions {
    pub config: PathBuf,
    pub once: bool
}

#[derive(Debug)]
pub struct HostConfig {
    pub name: String,
    pub target: TargetInfo,
    pub check: Check,
    pub interval: u64,
    pub labels: HashMap<String, String>
}

#[derive(Debug)]
pub struct Config {
    pub options: Options,
    pub params: PluginParams,
    pub hosts: Vec<HostConfig>
}

fn command() -> Command {
    Command::new("virtmonitor")
        .about("Virtual machine and guest service monitoring")
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Config file")
            .required(true)
            .value_parser(value_parser!(PathBuf)))
        .arg(Arg::new("once")
            .short('1')
            .long("once")
            .help("Run every check a single time and exit")
            .action(ArgAction::SetTrue))
}

pub fn parse_args() -> CmdOptions {
    let matches = command().get_matches();
    CmdOptions{
        config: matches.get_one::<PathBuf>("config").cloned().expect("config is a required argument"),
        once: matches.get_flag("once")
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    debug!("Loading config from {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io{path: path.to_path_buf(), source: e})?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let docs = YamlLoader::load_from_str(text)?;
    let doc = docs.first().ok_or_else(|| ConfigError::Invalid(String::from("config is empty")))?;
    let mut options = Options::default();
    match doc["name"] {
        Yaml::BadValue => {},
        Yaml::String(ref name) => options.name = name.clone(),
        _ => return Err(ConfigError::Invalid(String::from("name should be a string")))
    }
    match doc["supervisor_host"] {
        Yaml::BadValue => {},
        Yaml::String(ref host) => options.supervisor_host = host.clone(),
        _ => return Err(ConfigError::Invalid(String::from("supervisor_host should be a string")))
    }
    let params = PluginParams::from_yaml(&doc["plugin"])?;
    let mut hosts = Vec::new();
    match doc["hosts"] {
        Yaml::Hash(ref h) => {
            for (key, value) in h {
                hosts.push(parse_host(key, value)?);
            }
        },
        _ => return Err(ConfigError::Invalid(String::from("hosts should be a hashmap")))
    }
    Ok(Config{options: options, params: params, hosts: hosts})
}

fn parse_host(key: &Yaml, value: &Yaml) -> Result<HostConfig, ConfigError> {
    let name = scalar(key).ok_or_else(|| ConfigError::Invalid(format!("host name should be a scalar: {:?}", key)))?;
    let invalid = |what: &str| ConfigError::Invalid(format!("host {}: {}", name, what));
    let address = value["addr"].as_str().ok_or_else(|| invalid("addr should be a string"))?;
    let check = value["check"].as_str()
        .ok_or_else(|| invalid("check should be a string"))?
        .parse::<Check>()
        .map_err(|e| invalid(&e.to_string()))?;
    let interval = match value["interval"] {
        Yaml::BadValue => DEFAULT_INTERVAL,
        Yaml::Integer(i) if i > 0 => i as u64,
        _ => return Err(invalid("interval should be a positive integer"))
    };
    let service_url = match value["service_url"] {
        Yaml::BadValue => None,
        Yaml::String(ref s) => Some(s.clone()),
        _ => return Err(invalid("service_url should be a string"))
    };
    let mut labels = HashMap::new();
    match value["labels"] {
        Yaml::BadValue => {},
        Yaml::Hash(ref l) => {
            for (l_key, l_value) in l {
                match (scalar(l_key), scalar(l_value)) {
                    (Some(k), Some(v)) => { labels.insert(k, v); },
                    _ => return Err(invalid("labels should map scalars to scalars"))
                }
            }
        },
        _ => return Err(invalid("labels should be a hashmap"))
    }
    Ok(HostConfig{
        name: name.clone(),
        target: TargetInfo{address: address.to_string(), service_url: service_url},
        check: check,
        interval: interval,
        labels: labels
    })
}

fn scalar(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Real(r) => Some(r.clone()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const SAMPLE: &str = "
name: virtmonitor-par
supervisor_host: sup.example
plugin:
  importer_tcp_timeout: 10
hosts:
  web01:
    addr: 10.0.0.5
    check: get_service_status
    interval: 30
    service_url: http://10.0.0.5/health
    labels:
      site: par
      rack: 4
  hv01:
    addr: hv01.example
    check: get_status
";

    #[test]
    fn parses_sample() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.options.name, "virtmonitor-par");
        assert_eq!(cfg.options.supervisor_host, "sup.example");
        assert_eq!(cfg.params.importer_tcp_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cfg.hosts.len(), 2);

        let web = &cfg.hosts[0];
        assert_eq!(web.name, "web01");
        assert_eq!(web.check, Check::GetServiceStatus);
        assert_eq!(web.interval, 30);
        assert_eq!(web.target.service_url.as_deref(), Some("http://10.0.0.5/health"));
        assert_eq!(web.labels.get("rack").map(String::as_str), Some("4"));

        let hv = &cfg.hosts[1];
        assert_eq!(hv.target.address, "hv01.example");
        assert_eq!(hv.check, Check::GetStatus);
        assert_eq!(hv.interval, DEFAULT_INTERVAL);
        assert!(hv.target.service_url.is_none());
    }

    #[test]
    fn rejects_unknown_check() {
        let err = parse_config("hosts:\n  a:\n    addr: a\n    check: reboot\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("reboot")));
    }

    #[test]
    fn rejects_missing_hosts_and_bad_interval() {
        assert!(parse_config("plugin: {}\n").is_err());
        assert!(parse_config("hosts:\n  a:\n    addr: a\n    check: get_status\n    interval: 0\n").is_err());
        assert!(parse_config("").is_err());
        assert!(parse_config("supervisor_host: [a]\nhosts: {}\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.hosts.len(), 2);
        assert!(matches!(load_config(Path::new("/nonexistent/virtmonitor.yaml")), Err(ConfigError::Io{..})));
    }

    #[test]
    fn command_line() {
        let matches = command().try_get_matches_from(["virtmonitor", "-c", "checks.yaml", "--once"]).unwrap();
        assert_eq!(matches.get_one::<PathBuf>("config"), Some(&PathBuf::from("checks.yaml")));
        assert!(matches.get_flag("once"));
        assert!(command().try_get_matches_from(["virtmonitor"]).is_err());
    }
}
