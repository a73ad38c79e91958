use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    calibration, sessions, EnsureSession, RequestStatus, RobotApiClient, TrackedRequest,
};
use shared::domain::{CorrelationId, RobotName};
use shared::error::{ApiException, ErrorBody};
use shared::protocol::SessionType;
use tracing::info;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Robot to talk to, by discovery name.
    #[arg(long)]
    robot: String,
    /// Override the robot's address (`host[:port]`) instead of relying
    /// on robots.toml / environment discovery.
    #[arg(long)]
    address: Option<String>,
    /// Start (or resume) a deck calibration session and report its
    /// current step, then clean the session up again.
    #[arg(long)]
    deck_session: bool,
    /// Seconds to wait for each request to settle.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

async fn settle(
    client: &RobotApiClient,
    id: CorrelationId,
    wait: Duration,
    what: &str,
) -> Result<TrackedRequest> {
    let record = tokio::time::timeout(wait, client.settled(id))
        .await
        .with_context(|| format!("{what}: no reply (robot offline?)"))??;
    if record.status == RequestStatus::Failure {
        let body = record
            .error
            .clone()
            .unwrap_or_else(|| ErrorBody::message("unknown error"));
        return Err(ApiException { body }).with_context(|| format!("{what} failed"));
    }
    Ok(record)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let wait = Duration::from_secs(args.timeout);
    let robot = RobotName::from(args.robot.as_str());

    let client = RobotApiClient::with_default_transport();
    for host in config::load_hosts() {
        info!(robot = %host.name, address = %host.address, "discovered robot");
        client.upsert_host(host)?;
    }
    if let Some(address) = &args.address {
        client.upsert_host(config::parse_host(&args.robot, address))?;
    }

    let id = client.fetch_calibration_status(robot.clone())?;
    settle(&client, id, wait, "calibration status fetch").await?;
    let state = client.snapshot().await;
    println!(
        "{}: deck calibration status {:?}",
        robot,
        calibration::deck_calibration_status(&state, &robot)
    );

    let id = client.fetch_all_sessions(robot.clone())?;
    settle(&client, id, wait, "session listing").await?;
    let state = client.snapshot().await;
    for session in sessions::live_sessions(&state, &robot) {
        println!("active session {} ({:?})", session.id, session.session_type());
    }

    if args.deck_session {
        let session_id = match client
            .ensure_session(robot.clone(), SessionType::DeckCalibration, None)
            .await?
        {
            EnsureSession::Existing(session_id) => {
                println!("resuming deck calibration session {session_id}");
                session_id
            }
            EnsureSession::Requested(id) => {
                settle(&client, id, wait, "session create").await?;
                let state = client.snapshot().await;
                sessions::find_session_of_type(&state, &robot, SessionType::DeckCalibration)
                    .map(|session| session.id.clone())
                    .ok_or_else(|| anyhow!("created session missing from state"))?
            }
        };

        let state = client.snapshot().await;
        if let Some(session) = sessions::session_by_id(&state, &robot, &session_id) {
            println!(
                "deck calibration session {}: {}",
                session.id,
                serde_json::to_string(&session.attributes)?
            );
        }

        let id = client.delete_session(robot.clone(), session_id.clone())?;
        settle(&client, id, wait, "session delete").await?;
        println!("cleaned up session {session_id}");
    }

    Ok(())
}
