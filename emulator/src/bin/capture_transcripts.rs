//! Replays scripted bench scenarios and stores their transcripts under `transcripts/`.

use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use selftest_core::config::BenchConfig;
use session::Session;

const TRANSCRIPT_DIR: &str = "transcripts";

const SCENARIOS: &[(&str, &[&str])] = &[
    (
        "full-run",
        &["raw 512", "tick 2", "link down", "test on", "tick 130", "status"],
    ),
    (
        "link-preemption",
        &["link down", "test on", "tick 40", "link up", "tick 2", "status"],
    ),
    (
        "allocation-failure",
        &[
            "alloc fail",
            "link down",
            "test on",
            "tick 130",
            "status",
            "alloc ok",
            "test reset",
            "tick 2",
            "test off",
            "tick 1",
            "test on",
            "tick 130",
            "status",
        ],
    ),
    (
        "test-mode-off",
        &["link down", "test on", "tick 60", "test off", "tick 2", "status"],
    ),
];

fn main() -> io::Result<()> {
    for (name, script) in SCENARIOS {
        record_scenario(name, script)?;
    }
    Ok(())
}

fn record_scenario(name: &str, script: &[&str]) -> io::Result<()> {
    let path = PathBuf::from(TRANSCRIPT_DIR).join(format!("{name}.log"));
    let mut session = Session::new(&BenchConfig::DEFAULT, Some(&path))?;
    for line in script {
        session.handle_command(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
