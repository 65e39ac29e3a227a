//! Commands that drive the sync agent.

use schoolsync_engine::{
    BootstrapOutcome, HttpTransport, ReqwestClient, SyncAgent, SyncAgentConfig, SyncError,
};
use std::process::ExitCode;
use tracing::{error, info};

type Agent = SyncAgent<HttpTransport<ReqwestClient>>;
type CommandResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Opens the agent, or returns `None` when another instance holds the lock.
fn open_agent(config: SyncAgentConfig) -> Result<Option<Agent>, Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(&config, ReqwestClient::new()?);
    match SyncAgent::open(config, transport) {
        Ok(agent) => Ok(Some(agent)),
        Err(SyncError::Lock { path }) => {
            info!(lock = %path.display(), "another sync agent is already running; exiting");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Syncs continuously.
pub fn run(config: SyncAgentConfig) -> CommandResult {
    let Some(mut agent) = open_agent(config)? else {
        return Ok(ExitCode::SUCCESS);
    };
    let stats = agent.run(None);
    info!(
        cycles = stats.cycles,
        failed = stats.failed_cycles,
        "sync agent stopped"
    );
    Ok(ExitCode::SUCCESS)
}

/// Runs a single cycle; the exit status reflects its outcome.
pub fn once(config: SyncAgentConfig) -> CommandResult {
    let Some(mut agent) = open_agent(config)? else {
        return Ok(ExitCode::SUCCESS);
    };
    let report = agent.run_cycle();

    if let Some(pull) = &report.pull {
        println!(
            "pulled {} event(s), applied {}, cursor {}",
            pull.received, pull.applied, pull.cursor
        );
    }
    if let Some(push) = &report.push {
        println!("pushed {} change(s)", push.acknowledged);
    }
    if let Some(assets) = &report.assets {
        println!(
            "assets: {} uploaded, {} downloaded",
            assets.uploaded, assets.downloaded
        );
    }
    for (stage, reason) in &report.skipped {
        println!("{stage} skipped: {reason}");
    }
    for (stage, message) in &report.failures {
        error!(%stage, %message, "stage failed");
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Uploads local teachers and students.
pub fn push_snapshot(config: SyncAgentConfig) -> CommandResult {
    let Some(agent) = open_agent(config)? else {
        return Ok(ExitCode::SUCCESS);
    };
    let (teachers, students) = agent.push_full_snapshot()?;
    println!("pushed snapshot: {teachers} teacher(s), {students} student(s)");
    Ok(ExitCode::SUCCESS)
}

/// Applies a server snapshot if the station needs one.
pub fn bootstrap(config: SyncAgentConfig, force: bool) -> CommandResult {
    let force = force || config.force_bootstrap;
    let Some(mut agent) = open_agent(config)? else {
        return Ok(ExitCode::SUCCESS);
    };
    match agent.bootstrap(force)? {
        BootstrapOutcome::NotNeeded { reason } => {
            println!("bootstrap not needed: {reason}");
        }
        BootstrapOutcome::Applied {
            tables,
            rows,
            cursor,
        } => {
            let cursor = cursor.map_or_else(|| "unchanged".to_string(), |c| c.to_string());
            println!("bootstrapped {tables} table(s), {rows} row(s), cursor {cursor}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
