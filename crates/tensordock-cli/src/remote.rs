//! Remote-shell commands run through the user's SSH client.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tensordock_marketplace::RemoteEndpoint;
use tracing::info;

const REMOTE_HOME: &str = "/home/user";

const SETUP_BASE_URL: &str = "https://raw.githubusercontent.com/raefon/td-stream/main/setup";
const SETUP_FILES: &[&str] = &[
    "setup.sh",
    "88-wolf-virtual-inputs.rules",
    "89-blacklist-vfio.rules",
];

const WOLF_BASE_URL: &str = "https://raw.githubusercontent.com/raefon/td-stream/main/wolf";
const WOLF_FILES: &[&str] = &["docker-compose.nvidia.yml", "docker-nvidia-start.sh"];
const WOLF_CONTAINER: &str = "wolf-wolf-1";

const NVIDIA_INSTALL: &str = "git clone https://github.com/Scotchman0/NVIDIA_Drivers/ && cd NVIDIA_Drivers && sudo ./NVIDIA_drivers.sh && echo 'Complete.... Rebooting.' && sudo reboot";
const VPN_INSTALL: &str =
    "wget https://git.io/wireguard -O wireguard-install.sh && sudo bash wireguard-install.sh";

/// Something to do on a server over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Run `command`, or open an interactive shell when there is none.
    Shell(Option<String>),
    /// Fetch and run the streaming host setup script.
    Setup,
    /// Install NVIDIA drivers and reboot.
    NvidiaInstall,
    /// Install a WireGuard VPN server.
    VpnInstall,
    /// Fetch and start the Wolf streaming containers.
    WolfInstall,
    /// Print the Wolf container logs.
    WolfLogs,
}

impl Task {
    /// Remote commands to run, one SSH session each, in order.
    #[must_use]
    pub fn steps(&self) -> Vec<Option<String>> {
        match self {
            Self::Shell(command) => vec![command.clone()],
            Self::Setup => vec![
                Some(fetch_files(SETUP_BASE_URL, SETUP_FILES)),
                Some(format!("bash {REMOTE_HOME}/setup.sh")),
            ],
            Self::NvidiaInstall => vec![Some(NVIDIA_INSTALL.to_string())],
            Self::VpnInstall => vec![Some(VPN_INSTALL.to_string())],
            Self::WolfInstall => vec![
                Some(fetch_files(WOLF_BASE_URL, WOLF_FILES)),
                Some(format!(
                    "bash {REMOTE_HOME}/docker-nvidia-start.sh {REMOTE_HOME}/docker-compose.nvidia.yml"
                )),
            ],
            Self::WolfLogs => vec![Some(format!("docker logs {WOLF_CONTAINER}"))],
        }
    }
}

fn fetch_files(base_url: &str, files: &[&str]) -> String {
    files
        .iter()
        .map(|file| format!("curl -o {REMOTE_HOME}/{file} {base_url}/{file}"))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// How to reach servers: client binary, login user and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    /// SSH client executable, for example `ssh` or `mosh`.
    pub bin: String,
    /// Remote login user.
    pub user: String,
    /// Private key passed with `-i`.
    pub key_path: PathBuf,
}

/// One invocation of the SSH client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
}

impl RemoteCommand {
    /// `<bin> -i <key> -p <port> <user>@<host> [command]`
    #[must_use]
    pub fn new(options: &ShellOptions, endpoint: &RemoteEndpoint, command: Option<&str>) -> Self {
        let mut args = vec![
            "-i".to_string(),
            options.key_path.display().to_string(),
            "-p".to_string(),
            endpoint.port.to_string(),
            format!("{}@{}", options.user, endpoint.host),
        ];
        if let Some(command) = command {
            args.push(command.to_string());
        }

        Self {
            program: options.bin.clone(),
            args,
        }
    }

    /// Executable name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run with the terminal attached and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be started or exits unsuccessfully.
    pub fn run(&self) -> Result<()> {
        info!("running {self}");
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("Failed to start `{}`", self.program))?;

        if !status.success() {
            bail!("`{}` exited with {status}", self.program);
        }
        Ok(())
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program(), self.args.join(" "))
    }
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(Path::new(rest)),
        None => PathBuf::from(path),
    }
}
