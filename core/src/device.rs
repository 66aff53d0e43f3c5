//! # Device Fingerprinting
//!
//! Everything that happens after the port scan for hosts exposing SSH:
//! deciding whether and where SSH runs, logging in, identifying the
//! platform and pulling device facts and configuration.
//!
//! * [`session`] holds the transport seams ([`session::SshConnector`] and friends).
//! * [`ssh`] implements them with `russh`.
//! * [`escalation`] enters the privileged `enable` mode on interactive shells.
//! * [`fingerprint`] runs the session state machine.
//! * [`commands`] and [`grab`] collect device-specific output and configuration.

use std::collections::BTreeMap;
use std::fmt;

use netrecon_common::probe::PortProbeResult;
use serde::Serialize;

pub mod commands;
pub mod escalation;
pub mod fingerprint;
pub mod grab;
pub mod session;
pub mod ssh;

pub const SSH_PORT: u16 = 22;

/// The operating-system family guessed from an SSH banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OsFamily {
    Cisco,
    Linux,
    Other,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Cisco => f.write_str("Cisco"),
            OsFamily::Linux => f.write_str("Linux"),
            OsFamily::Other => f.write_str("Other"),
        }
    }
}

/// Normalized platform tag handed to configuration retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum PlatformTag {
    Ios,
    IosXr,
    NxosSsh,
    Linux,
    Unknown,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Ios => "ios",
            PlatformTag::IosXr => "iosxr",
            PlatformTag::NxosSsh => "nxos_ssh",
            PlatformTag::Linux => "linux",
            PlatformTag::Unknown => "unknown",
        }
    }
}

impl From<PlatformTag> for &'static str {
    fn from(tag: PlatformTag) -> Self {
        tag.as_str()
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful fingerprint learned about a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub ssh_port: u16,
    pub os_family: OsFamily,
    pub banner_lines: Vec<String>,
    pub platform: PlatformTag,
}

/// Finds the port SSH is listening on and guesses the OS family from its banner.
///
/// Port 22 wins when open: `Cisco` in the banner means Cisco, `Ubuntu` means
/// Linux and anything else is `Other`. Otherwise the lowest open port whose
/// payload mentions `SSH` is taken as `Other`. Closed entries are ignored.
pub fn check_ports(open_tcp: &BTreeMap<u16, PortProbeResult>) -> Option<(u16, OsFamily)> {
    if let Some(result) = open_tcp.get(&SSH_PORT).filter(|r| r.is_open()) {
        let banner: String = result.text();
        let family: OsFamily = if banner.contains("Cisco") {
            OsFamily::Cisco
        } else if banner.contains("Ubuntu") {
            OsFamily::Linux
        } else {
            OsFamily::Other
        };
        return Some((SSH_PORT, family));
    }

    open_tcp
        .iter()
        .filter(|(_, result)| result.is_open())
        .find(|(_, result)| result.text().contains("SSH"))
        .map(|(port, _)| (*port, OsFamily::Other))
}

/// Maps discovery-command output to a platform tag. The first line carrying a
/// known marker decides.
pub fn infer_platform<S: AsRef<str>>(lines: &[S]) -> PlatformTag {
    lines
        .iter()
        .find_map(|line| platform_marker(line.as_ref()))
        .unwrap_or(PlatformTag::Unknown)
}

fn platform_marker(line: &str) -> Option<PlatformTag> {
    if line.contains("IOS-XE") {
        Some(PlatformTag::Ios)
    } else if line.contains("IOS-XR") || line.contains("IOS XR") {
        Some(PlatformTag::IosXr)
    } else if line.contains("Cisco Nexus") || line.contains("NX-OS") {
        Some(PlatformTag::NxosSsh)
    } else if line.contains("Cisco IOS Software") || line.contains("IOS Software") {
        Some(PlatformTag::Ios)
    } else if line.contains("Linux") || line.contains("Ubuntu") {
        Some(PlatformTag::Linux)
    } else {
        None
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use netrecon_common::probe::{ErrorKind, RETURN_INFORMATION_KEY};

    fn banner(text: &str) -> PortProbeResult {
        PortProbeResult::field(RETURN_INFORMATION_KEY, text)
    }

    fn refused() -> PortProbeResult {
        PortProbeResult::closed(
            ErrorKind::ConnectionRefused,
            "No connection could be made because the target machine actively refused it",
        )
    }

    #[test]
    fn cisco_banner_on_port_22() {
        let ports: BTreeMap<u16, PortProbeResult> = BTreeMap::from([
            (21, banner("220 (vsFTPd 3.0.3)")),
            (22, banner("SSH-1.99-Cisco-1.25")),
        ]);
        assert_eq!(check_ports(&ports), Some((22, OsFamily::Cisco)));
    }

    #[test]
    fn ubuntu_banner_is_linux() {
        let ports: BTreeMap<u16, PortProbeResult> =
            BTreeMap::from([(22, banner("SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.1"))]);
        assert_eq!(check_ports(&ports), Some((22, OsFamily::Linux)));
    }

    #[test]
    fn unknown_banner_on_port_22_is_other() {
        let ports: BTreeMap<u16, PortProbeResult> =
            BTreeMap::from([(22, banner("SSH-2.0-dropbear_2020.81"))]);
        assert_eq!(check_ports(&ports), Some((22, OsFamily::Other)));
    }

    #[test]
    fn ssh_on_another_port_is_other() {
        let ports: BTreeMap<u16, PortProbeResult> = BTreeMap::from([
            (21, banner("220 (vsFTPd 3.0.3)")),
            (2222, banner("SSH-2.0-OpenSSH_9.6")),
        ]);
        assert_eq!(check_ports(&ports), Some((2222, OsFamily::Other)));
    }

    #[test]
    fn closed_entries_are_ignored() {
        let ports: BTreeMap<u16, PortProbeResult> = BTreeMap::from([
            (21, banner("220 (vsFTPd 3.0.3)")),
            (22, refused()),
        ]);
        assert_eq!(check_ports(&ports), None);
    }

    #[test]
    fn no_ssh_anywhere() {
        assert_eq!(check_ports(&BTreeMap::new()), None);
    }

    #[test]
    fn platform_markers() {
        let xe: [&str; 2] = [
            "Cisco IOS XE Software, Version 16.09.03",
            "Cisco IOS Software [Fuji], Virtual XE Software (X86_64_LINUX_IOSD-UNIVERSALK9-M), IOS-XE",
        ];
        assert_eq!(infer_platform(&xe), PlatformTag::Ios);
        assert_eq!(
            infer_platform(&["Cisco IOS XR Software, Version 6.1.3"]),
            PlatformTag::IosXr
        );
        assert_eq!(
            infer_platform(&["Cisco Nexus Operating System (NX-OS) Software"]),
            PlatformTag::NxosSsh
        );
        assert_eq!(
            infer_platform(&["Linux box 5.4.0-58-generic #64-Ubuntu SMP x86_64 GNU/Linux"]),
            PlatformTag::Linux
        );
        assert_eq!(infer_platform(&["JUNOS 12.1X46"]), PlatformTag::Unknown);
        assert_eq!(infer_platform::<&str>(&[]), PlatformTag::Unknown);
    }

    #[test]
    fn platform_tag_strings() {
        assert_eq!(PlatformTag::NxosSsh.as_str(), "nxos_ssh");
        assert_eq!(
            serde_json::to_string(&PlatformTag::IosXr).unwrap(),
            "\"iosxr\""
        );
    }
}
