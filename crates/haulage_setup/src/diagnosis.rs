//! Classification of OSRM tool and container output into typed events.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Exit code of a process killed with SIGKILL, as reported by docker.
pub const KILLED_EXIT_CODE: i32 = 137;

/// Known failure signatures of the OSRM tools and the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Diagnosis {
    OutOfMemory,
    Killed,
    NoEdges,
    ProfileError(String),
    InputMissing(String),
    DockerPermissionDenied,
    DiskFull,
    Crash(String),
    Other(String),
    Unknown,
}

impl Diagnosis {
    pub fn hint(&self) -> &'static str {
        match self {
            Diagnosis::OutOfMemory => {
                "Not enough memory: use a smaller extract, add swap or lower --threads"
            }
            Diagnosis::Killed => {
                "The process was killed, most likely by the kernel OOM killer: add memory or swap"
            }
            Diagnosis::NoEdges => {
                "The profile excluded every road: check the vehicle dimensions and the extract"
            }
            Diagnosis::ProfileError(_) => "The Lua profile failed to load or run",
            Diagnosis::InputMissing(_) => {
                "An input file is missing: rerun the previous stage or check the data directory"
            }
            Diagnosis::DockerPermissionDenied => {
                "The current user cannot reach the docker daemon: add it to the docker group"
            }
            Diagnosis::DiskFull => "The data directory ran out of disk space",
            Diagnosis::Crash(_) => "The OSRM tool crashed",
            Diagnosis::Other(_) => "The OSRM tool reported an error",
            Diagnosis::Unknown => "No known failure signature in the output",
        }
    }

    /// Most specific diagnosis first when several lines matched.
    fn rank(&self) -> u8 {
        match self {
            Diagnosis::Unknown => 0,
            Diagnosis::Other(_) => 1,
            Diagnosis::Crash(_) => 2,
            Diagnosis::Killed => 3,
            _ => 4,
        }
    }

    /// Picks the most specific of `events`' failures, falling back on the exit
    /// code.
    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a EngineEvent>,
        exit_code: Option<i32>,
    ) -> Diagnosis {
        let mut best = match exit_code {
            Some(KILLED_EXIT_CODE) => Diagnosis::Killed,
            _ => Diagnosis::Unknown,
        };

        for event in events {
            if let EngineEvent::Failure(diagnosis) = event
                && diagnosis.rank() > best.rank()
            {
                best = diagnosis.clone();
            }
        }

        best
    }
}

impl Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnosis::OutOfMemory => write!(f, "out of memory"),
            Diagnosis::Killed => write!(f, "killed"),
            Diagnosis::NoEdges => write!(f, "no edges remaining after profile filtering"),
            Diagnosis::ProfileError(line) => write!(f, "profile error: {line}"),
            Diagnosis::InputMissing(line) => write!(f, "input missing: {line}"),
            Diagnosis::DockerPermissionDenied => write!(f, "docker permission denied"),
            Diagnosis::DiskFull => write!(f, "disk full"),
            Diagnosis::Crash(line) => write!(f, "crash: {line}"),
            Diagnosis::Other(line) => write!(f, "{line}"),
            Diagnosis::Unknown => write!(f, "unknown failure"),
        }
    }
}

/// One classified line of engine output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "line", rename_all = "snake_case")]
pub enum EngineEvent {
    Progress(String),
    Warning(String),
    Failure(Diagnosis),
}

impl EngineEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, EngineEvent::Failure(_))
    }
}

impl Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::Progress(line) => write!(f, "{line}"),
            EngineEvent::Warning(line) => write!(f, "warning: {line}"),
            EngineEvent::Failure(diagnosis) => write!(f, "failure: {diagnosis}"),
        }
    }
}

const OUT_OF_MEMORY: [&str; 3] = ["std::bad_alloc", "Cannot allocate memory", "out of memory"];
const PROFILE_ERRORS: [&str; 3] = ["sol: ", "lua:", "Lua"];
const INPUT_MISSING: [&str; 2] = ["not found", "No such file or directory"];
const CRASHES: [&str; 3] = ["terminate called", "Segmentation fault", "core dumped"];

/// Classifies one output line of an OSRM tool or of docker itself.
pub fn classify_line(line: &str) -> EngineEvent {
    let trimmed = line.trim();

    if trimmed.contains("permission denied while trying to connect to the Docker daemon") {
        return EngineEvent::Failure(Diagnosis::DockerPermissionDenied);
    }
    if trimmed.contains("No space left on device") {
        return EngineEvent::Failure(Diagnosis::DiskFull);
    }
    if OUT_OF_MEMORY.iter().any(|marker| trimmed.contains(marker)) {
        return EngineEvent::Failure(Diagnosis::OutOfMemory);
    }
    if trimmed.contains("There are no edges remaining") {
        return EngineEvent::Failure(Diagnosis::NoEdges);
    }
    if trimmed == "Killed" || trimmed.ends_with(" Killed") {
        return EngineEvent::Failure(Diagnosis::Killed);
    }
    if CRASHES.iter().any(|marker| trimmed.contains(marker)) {
        return EngineEvent::Failure(Diagnosis::Crash(trimmed.to_string()));
    }

    let is_error = trimmed.contains("[error]");
    if is_error && PROFILE_ERRORS.iter().any(|marker| trimmed.contains(marker)) {
        return EngineEvent::Failure(Diagnosis::ProfileError(trimmed.to_string()));
    }
    if (is_error || trimmed.starts_with("docker:"))
        && INPUT_MISSING.iter().any(|marker| trimmed.contains(marker))
    {
        return EngineEvent::Failure(Diagnosis::InputMissing(trimmed.to_string()));
    }
    if is_error || trimmed.starts_with("docker:") {
        return EngineEvent::Failure(Diagnosis::Other(trimmed.to_string()));
    }

    if trimmed.contains("[warn]") {
        return EngineEvent::Warning(trimmed.to_string());
    }

    EngineEvent::Progress(trimmed.to_string())
}

/// Every failure found in a log, deduplicated, in order of appearance.
pub fn scan_log(content: &str) -> Vec<Diagnosis> {
    let mut found: Vec<Diagnosis> = Vec::new();

    for line in content.lines() {
        if let EngineEvent::Failure(diagnosis) = classify_line(line)
            && !found.contains(&diagnosis)
        {
            found.push(diagnosis);
        }
    }

    found
}
