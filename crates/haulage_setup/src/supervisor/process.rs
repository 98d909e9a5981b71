use std::{
    ffi::OsStr,
    fs::File,
    os::unix::{ffi::OsStrExt, process::CommandExt},
    path::{Path, PathBuf},
    process::Stdio,
};

use jiff::{Timestamp, Zoned};
use tracing::{debug, info};

use crate::{
    config::SetupConfig,
    dataset::{control_socket_path, logs_dir, runner_config_path},
    error::SetupError,
    supervisor::record::RunnerRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    fn flag(&self) -> &'static str {
        match self {
            Signal::Term => "-TERM",
            Signal::Kill => "-KILL",
        }
    }
}

/// Whether a process with this id exists and may be signalled by us.
pub async fn is_alive(pid: u32) -> bool {
    match tokio::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(err) => {
            debug!("Cannot run kill: {}", err);
            false
        }
    }
}

pub async fn send_signal(pid: u32, signal: Signal) -> Result<(), SetupError> {
    let status = tokio::process::Command::new("kill")
        .arg(signal.flag())
        .arg(pid.to_string())
        .status()
        .await
        .map_err(|err| SetupError::Control(format!("Cannot run kill: {err}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(SetupError::Control(format!(
            "kill {} {} exited with {}",
            signal.flag(),
            pid,
            status
        )))
    }
}

/// Whether a `/proc/<pid>/cmdline` blob holds `run --config <config_path>`.
pub fn is_runner_command(cmdline: &[u8], config_path: &Path) -> bool {
    let args: Vec<&OsStr> = cmdline
        .split(|byte| *byte == 0)
        .filter(|arg| !arg.is_empty())
        .map(OsStr::from_bytes)
        .collect();

    let same_config = |arg: &OsStr| {
        let arg = Path::new(arg);
        arg == config_path
            || matches!(
                (arg.canonicalize(), config_path.canonicalize()),
                (Ok(arg), Ok(config)) if arg == config
            )
    };

    args.iter().skip(1).any(|arg| *arg == "run")
        && args
            .windows(2)
            .any(|pair| pair[0] == "--config" && same_config(pair[1]))
}

/// Command line of a live process. `None` where `/proc` is not available.
pub fn process_cmdline(pid: u32) -> Option<std::io::Result<Vec<u8>>> {
    if !Path::new("/proc/self/cmdline").exists() {
        return None;
    }
    Some(std::fs::read(format!("/proc/{pid}/cmdline")))
}

pub fn log_file_name(now: &Zoned) -> String {
    format!("setup-{}.log", now.strftime("%Y%m%d-%H%M%S"))
}

/// Newest `setup-*.log` of the data directory. Names sort by start time.
pub fn newest_log(data_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(logs_dir(data_dir)).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("setup-") && name.ends_with(".log"))
        })
        .max()
}

/// Re-executes `exe run --config <file>` as a detached process group whose
/// output goes to a timestamped log file.
pub async fn start_detached(config: &SetupConfig, exe: &Path) -> Result<RunnerRecord, SetupError> {
    let data_dir = &config.data_dir;

    if let Some(record) = RunnerRecord::load(data_dir)? {
        if is_alive(record.pid).await {
            return Err(SetupError::Control(format!(
                "A setup is already running with pid {}",
                record.pid
            )));
        }
        debug!("Removing stale runner record of pid {}", record.pid);
        RunnerRecord::remove(data_dir)?;
    }

    let logs = logs_dir(data_dir);
    std::fs::create_dir_all(&logs).map_err(SetupError::io(&logs))?;

    let config_path = runner_config_path(data_dir);
    let detached_config = SetupConfig {
        overwrite: config.overwrite.non_interactive(),
        ..config.clone()
    };
    detached_config.save(&config_path)?;

    let log_file = logs.join(log_file_name(&Zoned::now()));
    let stdout = File::create(&log_file).map_err(SetupError::io(&log_file))?;
    let stderr = stdout.try_clone().map_err(SetupError::io(&log_file))?;

    let child = std::process::Command::new(exe)
        .arg("run")
        .arg("--config")
        .arg(&config_path)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .process_group(0)
        .spawn()
        .map_err(SetupError::io(exe))?;

    let record = RunnerRecord {
        pid: child.id(),
        started_at: Timestamp::now(),
        log_file,
        control_socket: control_socket_path(data_dir),
    };
    record.save(data_dir)?;

    info!(
        "Setup running in the background with pid {}, logging to {}",
        record.pid,
        record.log_file.display()
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    #[test]
    fn test_log_file_name() {
        let now: Zoned = "2026-03-01T08:05:09[UTC]".parse().unwrap();
        assert_eq!(log_file_name(&now), "setup-20260301-080509.log");
    }

    #[test]
    fn test_newest_log() {
        let dir = TestDir::new();
        assert_eq!(newest_log(dir.path()), None);

        let logs = logs_dir(dir.path());
        std::fs::create_dir_all(&logs).unwrap();
        for name in [
            "setup-20260301-080509.log",
            "setup-20260302-080509.log",
            "notes.txt",
        ] {
            std::fs::write(logs.join(name), b"").unwrap();
        }

        assert_eq!(
            newest_log(dir.path()),
            Some(logs.join("setup-20260302-080509.log"))
        );
    }

    #[test]
    fn test_is_runner_command() {
        let config = Path::new("/srv/osrm/runner_config.json");

        assert!(is_runner_command(
            b"/usr/local/bin/haulage\0run\0--config\0/srv/osrm/runner_config.json\0",
            config
        ));
        assert!(!is_runner_command(b"sleep\030\0", config));
        assert!(!is_runner_command(
            b"/usr/local/bin/haulage\0run\0--config\0/home/osrm/runner_config.json\0",
            config
        ));
        assert!(!is_runner_command(
            b"/usr/local/bin/haulage\0status\0--config\0/srv/osrm/runner_config.json\0",
            config
        ));
        assert!(!is_runner_command(b"", config));
    }

    #[test]
    fn test_cmdline_of_current_process() {
        if let Some(cmdline) = process_cmdline(std::process::id()) {
            assert!(!cmdline.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()).await);
    }
}
