use std::{
    fmt::Display,
    io::{BufRead, Write},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// What to do when a stage's output already exists but the pipeline state
/// does not vouch for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    #[default]
    Ask,
    Skip,
    Overwrite,
}

impl OverwritePolicy {
    /// Detached runs have nobody to ask.
    pub fn non_interactive(self) -> Self {
        match self {
            OverwritePolicy::Ask => OverwritePolicy::Skip,
            policy => policy,
        }
    }
}

impl Display for OverwritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                OverwritePolicy::Ask => "ask",
                OverwritePolicy::Skip => "skip",
                OverwritePolicy::Overwrite => "overwrite",
            }
        )
    }
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(OverwritePolicy::Ask),
            "skip" => Ok(OverwritePolicy::Skip),
            "overwrite" => Ok(OverwritePolicy::Overwrite),
            other => Err(format!(
                "Unknown overwrite policy {other}, expected ask, skip or overwrite"
            )),
        }
    }
}

/// Asks a `y/N` question. Anything but `y`/`yes` (including end of input)
/// means no.
pub fn confirm<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Whether an existing artifact should be rebuilt.
pub fn should_overwrite(policy: OverwritePolicy, what: &str) -> std::io::Result<bool> {
    match policy {
        OverwritePolicy::Skip => Ok(false),
        OverwritePolicy::Overwrite => Ok(true),
        OverwritePolicy::Ask => confirm(
            &format!("{what} already exists. Overwrite?"),
            &mut std::io::stdin().lock(),
            &mut std::io::stderr(),
        ),
    }
}
