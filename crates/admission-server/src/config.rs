use admission_evaluator::config::AdmissionSettings;
use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: Option<TlsConfig>,
    pub admission_settings: AdmissionSettings,
    pub validation_timeout: Duration,
    pub ignore_kubernetes_connection_failure: bool,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;
        let (cert_file, key_file) = tls_files(matches)?;
        let tls_config = if cert_file.is_empty() {
            None
        } else {
            Some(TlsConfig {
                cert_file,
                key_file,
            })
        };

        let admission_settings = admission_settings(matches)?;
        let validation_timeout = matches
            .get_one::<u64>("validation-timeout")
            .map(|seconds| Duration::from_secs(*seconds))
            .ok_or_else(|| anyhow!("missing value for validation-timeout"))?;
        let ignore_kubernetes_connection_failure =
            matches.get_flag("ignore-kubernetes-connection-failure");

        let log_level = string_arg(matches, "log-level")?;
        let log_fmt = string_arg(matches, "log-fmt")?;
        let log_no_color = matches.get_flag("log-no-color");

        Ok(Self {
            addr,
            tls_config,
            admission_settings,
            validation_timeout,
            ignore_kubernetes_connection_failure,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn string_arg(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| anyhow!("missing value for {}", id))
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    format!(
        "{}:{}",
        string_arg(matches, "address")?,
        string_arg(matches, "port")?
    )
    .parse()
    .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn tls_files(matches: &ArgMatches) -> Result<(String, String)> {
    let cert_file = string_arg(matches, "cert-file")?;
    let key_file = string_arg(matches, "key-file")?;
    if cert_file.is_empty() != key_file.is_empty() {
        Err(anyhow!("error parsing arguments: either both --cert-file and --key-file must be provided, or neither"))
    } else {
        Ok((cert_file, key_file))
    }
}

fn admission_settings(matches: &ArgMatches) -> Result<AdmissionSettings> {
    match matches.get_one::<String>("admission-config") {
        Some(path) => AdmissionSettings::read_file(Path::new(path))
            .map_err(|e| anyhow!("error while loading admission settings: {}", e)),
        None => Ok(AdmissionSettings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;
    use admission_evaluator::config::DEFAULT_SCHEDULER_SERVICE_ADDRESS;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn matches(args: &[&str]) -> ArgMatches {
        cli::build_cli().get_matches_from(std::iter::once("admission-server").chain(args.iter().copied()))
    }

    #[test]
    fn default_config() {
        let config = Config::from_args(&matches(&[])).unwrap();

        assert_eq!(config.addr, "0.0.0.0:9089".parse().unwrap());
        assert_eq!(config.tls_config, None);
        assert_eq!(config.validation_timeout, Duration::from_secs(10));
        assert_eq!(config.admission_settings, AdmissionSettings::default());
        assert_eq!(
            config.admission_settings.scheduler_service_address,
            DEFAULT_SCHEDULER_SERVICE_ADDRESS
        );
        assert!(!config.ignore_kubernetes_connection_failure);
    }

    #[rstest]
    #[case::cert_only(&["--cert-file", "tls.crt"])]
    #[case::key_only(&["--key-file", "tls.key"])]
    fn tls_files_must_be_paired(#[case] args: &[&str]) {
        let error = Config::from_args(&matches(args)).err().unwrap();

        assert!(error.to_string().contains("either both --cert-file and --key-file"));
    }

    #[test]
    fn tls_config() {
        let config = Config::from_args(&matches(&[
            "--cert-file",
            "tls.crt",
            "--key-file",
            "tls.key",
        ]))
        .unwrap();

        assert_eq!(
            config.tls_config,
            Some(TlsConfig {
                cert_file: "tls.crt".to_owned(),
                key_file: "tls.key".to_owned(),
            })
        );
    }

    #[test]
    fn invalid_bind_address() {
        let result = Config::from_args(&matches(&["--addr", "not an address"]));
        assert!(result.is_err());
    }

    #[test]
    fn admission_settings_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
admissionController.webHook.schedulerServiceAddress: "scheduler:9080"
admissionController.accessControl.bypassAuth: true
admissionController.filtering.bypassNamespaces: "^kube-system$,^tools$"
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = Config::from_args(&matches(&["--admission-config", path])).unwrap();

        assert_eq!(
            config.admission_settings.scheduler_service_address,
            "scheduler:9080"
        );
        assert_eq!(config.admission_settings.bypass_auth, "true");
        assert_eq!(
            config.admission_settings.bypass_namespaces,
            "^kube-system$,^tools$"
        );
    }

    #[test]
    fn missing_admission_settings_file() {
        let error = Config::from_args(&matches(&["--admission-config", "/does/not/exist.yaml"]))
            .err()
            .unwrap();

        assert!(error.to_string().contains("error while loading admission settings"));
    }
}
