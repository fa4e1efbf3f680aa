//! Polls an external service lister (`avahi-browse -arpt` by default) and
//! publishes its latest listing. This state is separate from the packet
//! reconciliation and is only merged by readers.

use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{ListedService, ServiceTypeName};
use crate::config::ListerConfig;
use crate::error::ListerError;

/// Fields on a `+` (new) line
const NEW_FIELDS: usize = 6;
/// Fields on a `=` (resolved) line, without the trailing TXT field
const RESOLVED_FIELDS: usize = 9;

/// Extra argument that makes the type database dump print DNS-SD types
/// instead of readable names
const NO_DB_LOOKUP: &str = "--no-db-lookup";

pub async fn run_poller(
    config: ListerConfig,
    tx: watch::Sender<Vec<ListedService>>,
    types_tx: watch::Sender<Vec<ServiceTypeName>>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!(command = %config.command, "Starting service lister poller");

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut have_type_names = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The type database does not change at runtime
                if !have_type_names {
                    tokio::select! {
                        result = service_type_names(&config.command, &config.dump_args) => {
                            match result {
                                Ok(names) => {
                                    tracing::debug!(count = names.len(), "service type names loaded");
                                    types_tx.send_replace(names);
                                    have_type_names = true;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Could not load service type names");
                                }
                            }
                        }
                        _ = cancel.cancelled() => break,
                    }
                }

                tokio::select! {
                    result = list_services(&config.command, &config.args) => {
                        match result {
                            Ok(services) => {
                                tracing::trace!(count = services.len(), "service listing updated");
                                tx.send_replace(services);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Service lister failed, keeping previous listing");
                            }
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Service lister poller shutting down");
    Ok(())
}

/// Run the lister once and parse its output
pub async fn list_services(command: &str, args: &[String]) -> Result<Vec<ListedService>, ListerError> {
    let stdout = run_command(command, args).await?;
    parse_listing(&stdout)
}

/// Dump the lister's type database with and without name lookup and pair
/// the two outputs up.
pub async fn service_type_names(command: &str, dump_args: &[String]) -> Result<Vec<ServiceTypeName>, ListerError> {
    let names = run_command(command, dump_args).await?;

    let mut raw_args = dump_args.to_vec();
    raw_args.push(NO_DB_LOOKUP.to_string());
    let types = run_command(command, &raw_args).await?;

    parse_type_names(&types, &names)
}

/// Line `i` of `types` is the DNS-SD type whose readable name is line `i`
/// of `names`.
pub fn parse_type_names(types: &str, names: &str) -> Result<Vec<ServiceTypeName>, ListerError> {
    let types: Vec<&str> = types.lines().collect();
    let names: Vec<&str> = names.lines().collect();
    if types.len() != names.len() {
        return Err(ListerError::TypeNameMismatch {
            types: types.len(),
            names: names.len(),
        });
    }

    Ok(types
        .into_iter()
        .zip(names)
        .filter(|(service_type, _)| !service_type.is_empty())
        .map(|(service_type, description)| ServiceTypeName {
            service_type: service_type.to_string(),
            description: description.to_string(),
        })
        .collect())
}

async fn run_command(command: &str, args: &[String]) -> Result<String, ListerError> {
    let output = Command::new(command)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ListerError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ListerError::Exit {
            command: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `avahi-browse --parsable` output. `+` lines add a service, `=` lines
/// fill in its resolution, `-` lines are ignored.
pub fn parse_listing(output: &str) -> Result<Vec<ListedService>, ListerError> {
    let mut services: Vec<ListedService> = Vec::new();

    for line in output.lines().filter(|l| !l.is_empty()) {
        let kind = line.split(';').next().unwrap_or_default();
        match kind {
            "+" => {
                let parts: Vec<&str> = line.split(';').collect();
                check_fields(kind, &parts, NEW_FIELDS)?;
                services.push(ListedService {
                    interface: parts[1].to_string(),
                    protocol: parts[2].to_string(),
                    name: unescape(parts[3]),
                    service_type: unescape(parts[4]),
                    domain: unescape(parts[5]),
                    ..Default::default()
                });
            }
            "=" => {
                // TXT data may itself contain ';'
                let parts: Vec<&str> = line.splitn(RESOLVED_FIELDS + 1, ';').collect();
                check_fields(kind, &parts, RESOLVED_FIELDS)?;

                let name = unescape(parts[3]);
                let service_type = unescape(parts[4]);
                let domain = unescape(parts[5]);
                let Some(service) = services.iter_mut().find(|s| {
                    s.interface == parts[1]
                        && s.protocol == parts[2]
                        && s.name == name
                        && s.service_type == service_type
                        && s.domain == domain
                }) else {
                    tracing::warn!(
                        interface = parts[1],
                        protocol = parts[2],
                        %name,
                        %service_type,
                        "Resolved service was never listed"
                    );
                    continue;
                };

                service.hostname = Some(unescape(parts[6]));
                service.address = Some(parts[7].to_string());
                service.port = parts[8].parse().ok();
                service.txt_records = parts.get(9).map(|txt| split_txt(txt)).unwrap_or_default();
            }
            "-" => {}
            other => {
                return Err(ListerError::UnknownLineType { kind: other.to_string() });
            }
        }
    }

    Ok(services)
}

fn check_fields(kind: &str, parts: &[&str], expected: usize) -> Result<(), ListerError> {
    if parts.len() < expected {
        return Err(ListerError::Truncated {
            kind: kind.to_string(),
            expected,
            got: parts.len(),
        });
    }
    Ok(())
}

/// Undo avahi's label escaping: `\DDD` is a decimal byte, `\x` is `x`.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let digits = &bytes[i + 1..bytes.len().min(i + 4)];
            if digits.len() == 3 && digits.iter().all(u8::is_ascii_digit) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
            out.push(bytes[i + 1]);
            i += 2;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Split avahi's TXT field, `"a=1" "b=2"`, into its strings.
fn split_txt(field: &str) -> Vec<String> {
    field
        .split('"')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}
