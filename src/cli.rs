//! Command-Line Surface
//!
//! One subcommand per operation. Handlers stay thin: parse arguments, call
//! one library operation, print the result. Connect flows append to the
//! session audit log here, at the call site, before the external client
//! starts.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::info;

use crate::agent::protocol::ProcessEntry;
use crate::agent::{AgentClient, MetricsResponse, DEFAULT_AGENT_PORT};
use crate::audit::{EventKind, SessionLog};
use crate::config::{
    ops, ssh_config, ConnectionProfile, EditRequest, Keychain, ListFilter, ProfileKind,
    ProfileRow, ProfileStore, RdpProfile, SshProfile,
};
use crate::exec::{self, TransferDirection, HARDENING_CHECKLIST};
use crate::probe::wol;
use crate::relay::{RelayConfig, RelayServer, DEFAULT_BIND};
use crate::status::{
    clamp_interval, ProbeConfig, StatusEngine, StatusMonitor, StatusSnapshot,
    DEFAULT_MONITOR_INTERVAL,
};

/// Rows shown by `agent-status --processes`.
const PROCESS_ROWS: usize = 15;

#[derive(Parser)]
#[command(
    name = "hostlink",
    version,
    about = "SSH/RDP host manager with a live status engine and terminal relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the WebSocket terminal relay.
    Serve {
        /// Listen address.
        #[arg(long, default_value = DEFAULT_BIND, env = "HOSTLINK_BIND")]
        bind: String,
        /// Cap on concurrently open sessions.
        #[arg(long, default_value_t = 32)]
        max_sessions: usize,
    },
    /// Save a new SSH profile.
    AddSsh {
        name: String,
        host: String,
        /// Login user; omitted means ssh decides at connect time.
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 22)]
        port: u16,
        /// Tags, comma separated.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        favorite: bool,
    },
    /// Save a new RDP profile.
    AddRdp {
        name: String,
        host: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 3389)]
        port: u16,
        /// MAC address; enables `wake`.
        #[arg(long)]
        mac: Option<String>,
        /// Tags, comma separated.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        favorite: bool,
    },
    /// Change tags, favorite flag or MAC of a saved profile.
    Edit {
        kind: KindArg,
        name: String,
        /// Replace the tag list, comma separated; an empty value clears it.
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long)]
        favorite: Option<bool>,
        /// Replace the MAC address (RDP only).
        #[arg(long, conflicts_with = "clear_mac")]
        mac: Option<String>,
        /// Drop the stored MAC address (RDP only).
        #[arg(long)]
        clear_mac: bool,
    },
    /// Delete a saved profile.
    Remove { kind: KindArg, name: String },
    /// List saved profiles, favorites first.
    List {
        /// Restrict to one kind.
        #[arg(long)]
        kind: Option<KindArg>,
        /// Substring match on name or host.
        #[arg(long)]
        filter: Option<String>,
        /// Exact tag match.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Probe reachability of all or named profiles once.
    Status {
        /// Profile names; empty probes everything.
        names: Vec<String>,
        /// Wall-clock budget for the whole snapshot, seconds.
        #[arg(long, default_value_t = 3)]
        budget: u64,
        /// Probe only the favorites dashboard (top 3 per kind).
        #[arg(long, conflicts_with = "names")]
        favorites: bool,
    },
    /// Re-probe on an interval until ctrl-c.
    Monitor {
        /// Profile names; empty monitors everything.
        names: Vec<String>,
        /// Refresh interval in seconds, clamped to the supported range.
        #[arg(long, default_value_t = DEFAULT_MONITOR_INTERVAL.as_secs())]
        interval: u64,
    },
    /// Open an interactive shell on a saved SSH profile.
    Connect { name: String },
    /// Run a catalogued diagnostic on a profile; no arguments lists the
    /// catalogue, `run hardening` prints the hardening checklist.
    Run {
        name: Option<String>,
        action: Option<String>,
    },
    /// Lightweight remote process view, refreshed until ctrl-c.
    Top { name: String },
    /// Copy a file or directory over scp.
    Transfer {
        name: String,
        direction: DirectionArg,
        local: String,
        remote: String,
        /// Copy directories recursively.
        #[arg(short, long)]
        recursive: bool,
    },
    /// Forward a local port through a saved SSH profile.
    Forward {
        name: String,
        local_port: u16,
        remote_host: String,
        remote_port: u16,
    },
    /// Launch the platform RDP client for a saved profile.
    Rdp { name: String },
    /// Send a wake-on-LAN packet to a saved RDP profile.
    Wake {
        name: String,
        /// Wait for the host to answer, then connect.
        #[arg(long)]
        connect: bool,
        /// How long to wait with --connect, seconds.
        #[arg(long, default_value_t = 120)]
        wait: u64,
    },
    /// Show recent connect activity from the audit log.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Write ~/.ssh/config host blocks for the saved SSH profiles.
    SshConfig {
        /// Target file; defaults to ~/.ssh/config.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print to stdout instead of writing.
        #[arg(long)]
        print: bool,
    },
    /// Store or clear a profile secret in the system keychain.
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },
    /// Query the telemetry agent on a host.
    AgentStatus {
        /// Profile name or bare hostname.
        target: String,
        #[arg(long, default_value_t = DEFAULT_AGENT_PORT)]
        port: u16,
        /// Include the process table.
        #[arg(long)]
        processes: bool,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Read a secret from stdin and store it under the profile name.
    Set { name: String },
    /// Remove the stored secret.
    Clear { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Ssh,
    Rdp,
}

impl From<KindArg> for ProfileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ssh => ProfileKind::Ssh,
            KindArg::Rdp => ProfileKind::Rdp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Upload,
    Download,
}

impl From<DirectionArg> for TransferDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Upload => TransferDirection::Upload,
            DirectionArg::Download => TransferDirection::Download,
        }
    }
}

/// Parses the command line and runs the selected subcommand.
pub async fn run() -> anyhow::Result<()> {
    dispatch(Cli::parse().command).await
}

async fn dispatch(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve { bind, max_sessions } => {
            let store = Arc::new(open_store()?);
            let keychain = Arc::new(Keychain::new());
            let audit = Arc::new(open_audit()?);
            let server = Arc::new(RelayServer::new(
                RelayConfig { bind, max_sessions },
                store,
                keychain,
                audit,
            ));
            let listener = server.bind().await?;
            let addr = listener.local_addr()?;
            println!("ws://{}/?token={}", addr, server.token());
            tokio::select! {
                _ = Arc::clone(&server).run(listener) => {}
                _ = tokio::signal::ctrl_c() => {
                    let live = server.registry().list();
                    info!("relay interrupted with {} live session(s), shutting down", live.len());
                    for session in &live {
                        info!("  {} ({}, {:?}, up {}s)",
                            session.id, session.profile_name, session.state, session.uptime_secs);
                    }
                }
            }
            Ok(())
        }
        Command::AddSsh {
            name,
            host,
            user,
            port,
            tags,
            favorite,
        } => {
            let store = open_store()?;
            ops::add_ssh(
                &store,
                &name,
                SshProfile {
                    user,
                    host,
                    port,
                    tags,
                    favorite,
                },
            )?;
            println!("saved ssh profile {name}");
            Ok(())
        }
        Command::AddRdp {
            name,
            host,
            user,
            port,
            mac,
            tags,
            favorite,
        } => {
            let store = open_store()?;
            ops::add_rdp(
                &store,
                &name,
                RdpProfile {
                    user,
                    host,
                    port,
                    mac,
                    tags,
                    favorite,
                },
            )?;
            println!("saved rdp profile {name}");
            Ok(())
        }
        Command::Edit {
            kind,
            name,
            tags,
            favorite,
            mac,
            clear_mac,
        } => {
            let store = open_store()?;
            let kind: ProfileKind = kind.into();
            let mac = if clear_mac { Some(None) } else { mac.map(Some) };
            let tags =
                tags.map(|list| list.into_iter().filter(|t| !t.is_empty()).collect());
            ops::edit(
                &store,
                kind,
                &name,
                EditRequest {
                    tags,
                    favorite,
                    mac,
                },
            )?;
            println!("updated {kind} profile {name}");
            Ok(())
        }
        Command::Remove { kind, name } => {
            let store = open_store()?;
            let kind: ProfileKind = kind.into();
            ops::remove(&store, kind, &name)?;
            println!("removed {kind} profile {name}");
            Ok(())
        }
        Command::List { kind, filter, tag } => {
            let store = open_store()?;
            let rows = ops::list(
                &store,
                kind.map(Into::into),
                &ListFilter { text: filter, tag },
            )?;
            if rows.is_empty() {
                println!("no profiles");
                return Ok(());
            }
            for row in &rows {
                println!("{}", format_row(row));
            }
            Ok(())
        }
        Command::Status {
            names,
            budget,
            favorites,
        } => {
            let store = open_store()?;
            let rows = if favorites {
                let rows = ops::favorites(&store, 3)?;
                if rows.is_empty() {
                    bail!("no favorite profiles; mark some with `hostlink edit .. --favorite true`");
                }
                rows
            } else {
                select_rows(&store, &names)?
            };
            let engine = StatusEngine::new(ProbeConfig {
                budget: Duration::from_secs(budget),
                ..ProbeConfig::default()
            });
            for snap in engine.snapshot(&rows).await {
                println!("{}", format_snapshot(&snap));
            }
            Ok(())
        }
        Command::Monitor { names, interval } => {
            let store = open_store()?;
            let rows = select_rows(&store, &names)?;
            let interval = clamp_interval(Duration::from_secs(interval));
            let (tx, mut rx) = mpsc::channel(4);
            let monitor = StatusMonitor::spawn(StatusEngine::default(), rows, interval, tx);
            println!("monitoring; ctrl-c stops");
            loop {
                tokio::select! {
                    cycle = rx.recv() => {
                        let Some(snapshots) = cycle else { break };
                        println!("--- {}", Local::now().format("%H:%M:%S"));
                        for snap in &snapshots {
                            println!("{}", format_snapshot(snap));
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            monitor.shutdown().await;
            Ok(())
        }
        Command::Connect { name } => {
            let store = open_store()?;
            let profile = saved_ssh(&store, &name)?;
            open_audit()?.record(EventKind::SshConnect, &name, None);
            exec::open_shell(&profile).await?;
            Ok(())
        }
        Command::Run { name, action } => match (name, action) {
            (Some(name), Some(action)) => {
                let Some(diagnostic) = exec::catalog::find(&action) else {
                    bail!("unknown action {action}; `hostlink run` lists the catalogue");
                };
                let store = open_store()?;
                let profile = saved_ssh(&store, &name)?;
                println!("{} on {name}: {}", diagnostic.name, diagnostic.remote_command);
                exec::run_diagnostic(&profile, diagnostic).await?;
                Ok(())
            }
            (Some(word), None) if word == "hardening" => {
                println!("{HARDENING_CHECKLIST}");
                Ok(())
            }
            (None, Some(_)) => bail!("an action needs a profile name"),
            _ => {
                print_catalogue();
                Ok(())
            }
        },
        Command::Top { name } => {
            let store = open_store()?;
            let profile = saved_ssh(&store, &name)?;
            println!("remote process view for {name}; ctrl-c stops");
            exec::mini_top(&profile).await?;
            Ok(())
        }
        Command::Transfer {
            name,
            direction,
            local,
            remote,
            recursive,
        } => {
            let store = open_store()?;
            let profile = saved_ssh(&store, &name)?;
            exec::transfer(&profile, direction.into(), recursive, &local, &remote).await?;
            Ok(())
        }
        Command::Forward {
            name,
            local_port,
            remote_host,
            remote_port,
        } => {
            let store = open_store()?;
            let profile = saved_ssh(&store, &name)?;
            exec::forward(&profile, local_port, &remote_host, remote_port).await?;
            Ok(())
        }
        Command::Rdp { name } => {
            let store = open_store()?;
            let profile = saved_rdp(&store, &name)?;
            open_audit()?.record(EventKind::RdpConnect, &name, None);
            exec::launch_rdp(&profile)?;
            println!("RDP client started for {}:{}", profile.host, profile.port);
            Ok(())
        }
        Command::Wake {
            name,
            connect,
            wait,
        } => {
            let store = open_store()?;
            let profile = saved_rdp(&store, &name)?;
            let Some(mac) = profile.mac.clone() else {
                bail!("{name} has no MAC address; set one with `hostlink edit rdp {name} --mac ..`");
            };
            wol::send_magic_packet(&mac).await?;
            println!("magic packet sent to {mac}");
            if !connect {
                return Ok(());
            }
            println!("waiting up to {wait}s for {} to come up", profile.host);
            if !wol::wait_until_awake(&profile.host, profile.port, Duration::from_secs(wait))
                .await
            {
                bail!("{} did not come up within {wait}s", profile.host);
            }
            open_audit()?.record(EventKind::RdpConnectAfterWol, &name, None);
            exec::launch_rdp(&profile)?;
            println!("RDP client started for {}:{}", profile.host, profile.port);
            Ok(())
        }
        Command::Recent { limit } => {
            let audit = open_audit()?;
            let entries = audit.recent(limit)?;
            if entries.is_empty() {
                println!("no recorded sessions");
                return Ok(());
            }
            for entry in &entries {
                if entry.extra.is_empty() {
                    println!(
                        "{}  {:<22} {}",
                        entry.timestamp, entry.event_kind, entry.profile_name
                    );
                } else {
                    println!(
                        "{}  {:<22} {}  ({})",
                        entry.timestamp, entry.event_kind, entry.profile_name, entry.extra
                    );
                }
            }
            Ok(())
        }
        Command::SshConfig { out, print } => {
            let store = open_store()?;
            let doc = store.load()?;
            if doc.ssh.is_empty() {
                bail!("no SSH profiles saved yet");
            }
            let identity = ssh_config::default_identity_path()
                .ok_or_else(|| anyhow!("cannot resolve the home directory"))?;
            let rendered = ssh_config::render(&doc.ssh, &identity);
            if print {
                println!("{rendered}");
                return Ok(());
            }
            let path = match out {
                Some(path) => path,
                None => ssh_config::default_ssh_config_path()
                    .ok_or_else(|| anyhow!("cannot resolve the home directory"))?,
            };
            ssh_config::write(&path, &rendered)?;
            println!("wrote {} host blocks to {}", doc.ssh.len(), path.display());
            Ok(())
        }
        Command::Secret { command } => match command {
            SecretCommand::Set { name } => {
                eprint!("secret for {name}: ");
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
                let secret = line.trim_end_matches(['\r', '\n']);
                if secret.is_empty() {
                    bail!("empty secret, nothing stored");
                }
                Keychain::new().store(&name, secret)?;
                println!("stored secret for {name}");
                Ok(())
            }
            SecretCommand::Clear { name } => {
                Keychain::new().delete(&name)?;
                println!("cleared secret for {name}");
                Ok(())
            }
        },
        Command::AgentStatus {
            target,
            port,
            processes,
        } => {
            let store = open_store()?;
            let host = resolve_host(&store, &target)?;
            let client = AgentClient::new(&host, port)?;
            let health = client.health().await?;
            println!("{host}:{port}  {} (agent {})", health.status, health.version);
            print_metrics(&client.metrics().await?);
            if processes {
                let mut rows = client.processes().await?.processes;
                rows.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
                print_processes(&rows);
            }
            Ok(())
        }
    }
}

fn open_store() -> anyhow::Result<ProfileStore> {
    ProfileStore::new().context("cannot open the profile store")
}

fn open_audit() -> anyhow::Result<SessionLog> {
    SessionLog::default_location().context("cannot resolve the session log path")
}

fn saved_ssh(store: &ProfileStore, name: &str) -> anyhow::Result<SshProfile> {
    match store.get_one(ProfileKind::Ssh, name)? {
        ConnectionProfile::Ssh(profile) => Ok(profile),
        ConnectionProfile::Rdp(_) => bail!("{name} is an RDP profile"),
    }
}

fn saved_rdp(store: &ProfileStore, name: &str) -> anyhow::Result<RdpProfile> {
    match store.get_one(ProfileKind::Rdp, name)? {
        ConnectionProfile::Rdp(profile) => Ok(profile),
        ConnectionProfile::Ssh(_) => bail!("{name} is an SSH profile"),
    }
}

/// All rows, or just those whose name is in `names` (either kind).
fn select_rows(store: &ProfileStore, names: &[String]) -> anyhow::Result<Vec<ProfileRow>> {
    let all = ops::list(store, None, &ListFilter::default())?;
    if names.is_empty() {
        if all.is_empty() {
            bail!("no profiles saved yet");
        }
        return Ok(all);
    }
    let rows: Vec<ProfileRow> = all
        .into_iter()
        .filter(|row| names.iter().any(|n| n == &row.name))
        .collect();
    if rows.is_empty() {
        bail!("no profiles match {names:?}");
    }
    Ok(rows)
}

/// Saved profile host if the target names one (SSH first), else the
/// target itself.
fn resolve_host(store: &ProfileStore, target: &str) -> anyhow::Result<String> {
    let doc = store.load()?;
    if let Some(profile) = doc
        .get(ProfileKind::Ssh, target)
        .or_else(|| doc.get(ProfileKind::Rdp, target))
    {
        return Ok(profile.host().to_string());
    }
    Ok(target.to_string())
}

fn format_row(row: &ProfileRow) -> String {
    let target = match row.profile.user() {
        Some(user) => format!("{}@{}:{}", user, row.profile.host(), row.profile.port()),
        None => format!("{}:{}", row.profile.host(), row.profile.port()),
    };
    let star = if row.profile.favorite() { "*" } else { " " };
    let mut line = format!("{star} {:<4} {:<20} {target}", row.kind, row.name);
    let tags = row.profile.tags().join(",");
    if !tags.is_empty() {
        line.push_str(&format!("  [{tags}]"));
    }
    line
}

fn format_snapshot(snap: &StatusSnapshot) -> String {
    let host = if snap.reachable { "up" } else { "down" };
    let port = if snap.service_reachable { "open" } else { "closed" };
    let latency = snap
        .latency_ms
        .map(|ms| format!("{ms} ms"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<4} {:<20} host {host:<5} port {port:<7} {latency}",
        snap.kind, snap.name
    )
}

fn print_catalogue() {
    println!("available actions:");
    for diagnostic in exec::DIAGNOSTICS {
        println!("  {:<16} {}", diagnostic.name, diagnostic.summary);
    }
    println!();
    println!("`run <profile> <action>` executes one; `run hardening` prints the checklist");
}

fn print_metrics(m: &MetricsResponse) {
    println!(
        "  cpu     {:.1}% of {} cores, load {:.2} {:.2} {:.2}",
        m.cpu.percent, m.cpu.count, m.cpu.load_avg[0], m.cpu.load_avg[1], m.cpu.load_avg[2]
    );
    println!(
        "  memory  {:.1}% ({} / {})",
        m.memory.percent,
        human_bytes(m.memory.used),
        human_bytes(m.memory.total)
    );
    println!(
        "  disk    {:.1}% ({} / {})",
        m.disk.percent,
        human_bytes(m.disk.used),
        human_bytes(m.disk.total)
    );
    println!(
        "  network {} sent, {} received",
        human_bytes(m.network.bytes_sent),
        human_bytes(m.network.bytes_recv)
    );
    println!("  uptime  {}", human_duration(m.uptime));
}

fn print_processes(rows: &[ProcessEntry]) {
    println!("  {:>7} {:>6} {:>6}  name", "pid", "cpu%", "mem%");
    for p in rows.iter().take(PROCESS_ROWS) {
        println!(
            "  {:>7} {:>6.1} {:>6.1}  {} ({})",
            p.pid, p.cpu_percent, p.memory_percent, p.name, p.status
        );
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn human_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
