//! Canned remote diagnostics for the `run` command.

/// One catalogued remote command. The command string is interpreted by the
/// remote shell; locally it is always a single ssh argv element.
#[derive(Debug, Clone, Copy)]
pub struct Diagnostic {
    pub name: &'static str,
    pub summary: &'static str,
    pub remote_command: &'static str,
}

pub const DIAGNOSTICS: &[Diagnostic] = &[
    Diagnostic {
        name: "reboot",
        summary: "reboot the host",
        remote_command: "sudo reboot",
    },
    Diagnostic {
        name: "docker-ps",
        summary: "list running containers",
        remote_command: "docker ps || echo 'docker not installed'",
    },
    Diagnostic {
        name: "services-failed",
        summary: "list failed systemd units",
        remote_command: "systemctl --failed || echo 'systemd not available'",
    },
    Diagnostic {
        name: "disk-usage",
        summary: "filesystem usage",
        remote_command: "df -h",
    },
    Diagnostic {
        name: "kernel-log",
        summary: "last 20 kernel log lines",
        remote_command: "dmesg | tail -n 20",
    },
];

pub fn find(name: &str) -> Option<&'static Diagnostic> {
    DIAGNOSTICS.iter().find(|d| d.name == name)
}

/// Printed by `run hardening`; informational only, never executed.
pub const HARDENING_CHECKLIST: &str = "\
Example hardening commands (displayed only, never run automatically):

- Disable SSH root login:
    sudo sed -i 's/^PermitRootLogin.*/PermitRootLogin no/' /etc/ssh/sshd_config
    sudo systemctl restart sshd

- Disable password authentication (keys only!):
    sudo sed -i 's/^PasswordAuthentication.*/PasswordAuthentication no/' /etc/ssh/sshd_config
    sudo systemctl restart sshd

- Install fail2ban:
    sudo apt install fail2ban
";
