//! Name resolution primitives
//!
//! Provides:
//! - Resolver configuration parsing and rewriting (`/etc/resolv.conf`)
//! - Static host pinning lookup (`/etc/hosts`)
//! - Lookups against an explicit server and through the system resolver

use crate::error::{Error, Result};
use crate::network::command;
use chrono::NaiveDateTime;
use std::fs;
use std::net::{IpAddr, ToSocketAddrs};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Nameservers listed in resolver configuration content
pub fn parse_nameservers(content: &str) -> Vec<IpAddr> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("nameserver") => fields.next()?.parse().ok(),
                _ => None,
            }
        })
        .collect()
}

/// Nameservers configured on the host (empty if the file is unreadable)
pub fn nameservers(resolv_conf: &Path) -> Vec<IpAddr> {
    fs::read_to_string(resolv_conf)
        .map(|content| parse_nameservers(&content))
        .unwrap_or_default()
}

/// Whether `name` appears as a hostname or alias in hosts file content
pub fn is_pinned(content: &str, name: &str) -> bool {
    content.lines().any(|line| {
        let line = line.split('#').next().unwrap_or("");
        let mut fields = line.split_whitespace();
        // First field is the address
        fields.next().is_some() && fields.any(|host| host.eq_ignore_ascii_case(name))
    })
}

/// Resolve `name` against one specific DNS server
pub fn lookup_with(name: &str, server: IpAddr, timeout: Duration) -> bool {
    let server = server.to_string();
    let wait = format!("-timeout={}", timeout.as_secs().max(1));
    let args = [wait.as_str(), name, server.as_str()];

    match command::run("nslookup", &args, timeout + Duration::from_secs(2)) {
        // nslookup exits 0 on NXDOMAIN with some builds; require an answer section
        Ok(output) => output.success && has_answer(&output.stdout),
        Err(_) => false,
    }
}

fn has_answer(output: &str) -> bool {
    // The server's own address is printed first; answers follow "Name:"
    output
        .split_once("Name:")
        .map(|(_, answer)| answer.contains("Address"))
        .unwrap_or(false)
}

/// Resolve `name` through the system resolver
pub fn resolve(name: &str) -> bool {
    (name, 0)
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

/// Resolver configuration pointing at known-good servers
pub fn render_resolver_config(servers: &[IpAddr], timeout_secs: u32, attempts: u32) -> String {
    let mut out = String::from("# Generated by lookout\n");
    for server in servers {
        out.push_str(&format!("nameserver {}\n", server));
    }
    out.push_str(&format!(
        "options timeout:{} attempts:{}\n",
        timeout_secs, attempts
    ));
    out
}

/// Timestamped backup location next to the resolver config
pub fn backup_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "resolv.conf".into());
    name.push(format!(".backup.{}", at.format("%Y%m%d_%H%M%S")));
    path.with_file_name(name)
}

/// Back up and overwrite the resolver configuration, then make it read-only
///
/// Returns the backup path, or `None` if there was nothing to back up.
pub fn rewrite_resolver_config(
    path: &Path,
    servers: &[IpAddr],
    timeout_secs: u32,
    attempts: u32,
    at: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    if servers.is_empty() {
        return Err(Error::ConfigValidation(
            "No nameservers configured for resolver rewrite".into(),
        ));
    }

    let backup = match fs::read(path) {
        Ok(content) => {
            let backup = backup_path(path, at);
            fs::write(&backup, content)?;
            Some(backup)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    // A symlinked resolver config is replaced by a plain file
    if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
        fs::remove_file(path)?;
    } else if path.exists() {
        // Previous runs leave the file read-only
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    }

    let rendered = render_resolver_config(servers, timeout_secs, attempts);
    fs::write(path, rendered)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o444))?;

    Ok(backup)
}
