use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target URL (e.g., http://localhost:8000)
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Number of participants to simulate
    #[arg(short = 'n', long, default_value_t = 100)]
    participants: usize,

    /// Number of concurrent requests
    #[arg(short, long, default_value_t = 10)]
    concurrency: usize,

    /// Presenter password for admin actions
    #[arg(short, long, default_value = "password")]
    password: String,

    /// Interest tags to spread participants across
    #[arg(short, long, value_delimiter = ',', default_value = "web,ml,systems,design")]
    tags: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct Event {
    id: i64,
}

#[derive(Deserialize, Debug, Clone)]
struct Participant {
    id: i64,
    interest_tag: String,
}

#[derive(Deserialize, Debug)]
struct Team {
    id: i64,
    leader_id: i64,
}

#[derive(Deserialize, Debug)]
struct ImportReport {
    imported: usize,
}

#[derive(Deserialize, Debug)]
struct LeaderSelection {
    leader_count: usize,
    threshold: Option<i64>,
    leaders: Vec<Participant>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[derive(Serialize)]
struct CreateEventRequest {
    name: String,
}

#[derive(Serialize)]
struct ParticipantRow {
    name: String,
    email: String,
    interest_tag: String,
}

#[derive(Serialize)]
struct PhaseRequest<'a> {
    phase: &'a str,
}

#[derive(Serialize)]
struct CastVoteRequest {
    voter_id: i64,
    candidate_id: i64,
}

#[derive(Serialize)]
struct CreateTeamRequest {
    leader_id: i64,
}

#[derive(Serialize)]
struct JoinTeamRequest {
    participant_id: i64,
}

#[derive(Serialize)]
struct ConfirmTeamRequest {
    leader_id: i64,
}

/// Outcome counters for one concurrent stage.
struct StageResult {
    successes: usize,
    failures: usize,
    duration: Duration,
}

impl StageResult {
    fn report(&self, stage: &str) {
        let rps = self.successes as f64 / self.duration.as_secs_f64().max(f64::EPSILON);
        println!(
            "   {:<10} ok: {:>5}  failed: {:>5}  time: {:>8.2?}  {:.2} req/sec",
            stage, self.successes, self.failures, self.duration, rps
        );
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

/// Run `job` for every item with bounded concurrency, counting outcomes.
async fn run_stage<T, F, Fut>(items: Vec<T>, concurrency: usize, job: F) -> StageResult
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let success_count = Arc::new(AtomicUsize::new(0));
    let failure_count = Arc::new(AtomicUsize::new(0));
    let pb = progress_bar(items.len());
    let start_time = Instant::now();

    stream::iter(items)
        .map(|item| {
            let success_count = success_count.clone();
            let failure_count = failure_count.clone();
            let pb = pb.clone();
            let fut = job(item);

            async move {
                match fut.await {
                    Ok(()) => {
                        success_count.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failure_count.fetch_add(1, Ordering::Relaxed);
                        pb.set_message(format!("last error: {e:#}"));
                    }
                }
                pb.inc(1);
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<()>>()
        .await;

    pb.finish_and_clear();

    StageResult {
        successes: success_count.load(Ordering::Relaxed),
        failures: failure_count.load(Ordering::Relaxed),
        duration: start_time.elapsed(),
    }
}

async fn advance(client: &Client, base_url: &str, event_id: i64, phase: &str) -> Result<()> {
    client
        .post(format!("{base_url}/api/admin/events/{event_id}/phase"))
        .json(&PhaseRequest { phase })
        .send()
        .await
        .context("Failed to send phase request")?
        .error_for_status()
        .with_context(|| format!("Failed to advance event to {phase}"))?;
    println!("⏭️  Event is now in phase '{phase}'");
    Ok(())
}

async fn cast_vote(
    client: &Client,
    base_url: &str,
    event_id: i64,
    voter_id: i64,
    candidate_id: i64,
) -> Result<()> {
    client
        .post(format!("{base_url}/api/events/{event_id}/votes"))
        .json(&CastVoteRequest {
            voter_id,
            candidate_id,
        })
        .send()
        .await
        .context("Failed to send vote request")?
        .error_for_status()
        .context("Vote casting failed")?;
    Ok(())
}

async fn join_team(
    client: &Client,
    base_url: &str,
    team_id: i64,
    participant_id: i64,
) -> Result<()> {
    client
        .post(format!("{base_url}/api/teams/{team_id}/members"))
        .json(&JoinTeamRequest { participant_id })
        .send()
        .await
        .context("Failed to send join request")?
        .error_for_status()
        .context("Joining team failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(!args.tags.is_empty(), "at least one interest tag is required");

    println!("🚀 Starting load test against {}", args.url);
    println!("👥 Participants: {}", args.participants);
    println!("🏷️  Tags: {}", args.tags.join(", "));
    println!("⚡ Concurrency: {}", args.concurrency);

    let admin_client = Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build admin client")?;
    let client = Client::new();
    let base_url = args.url.trim_end_matches('/').to_string();

    // Login first
    admin_client
        .post(format!("{base_url}/api/admin/login"))
        .json(&LoginRequest {
            password: &args.password,
        })
        .send()
        .await
        .context("Failed to send login request")?
        .error_for_status()
        .context("Failed to login as presenter")?;
    println!("🔑 Logged in as presenter");

    let run_started = Instant::now();
    let event: Event = admin_client
        .post(format!("{base_url}/api/admin/events"))
        .json(&CreateEventRequest {
            name: format!("Load test {}", unix_timestamp()),
        })
        .send()
        .await
        .context("Failed to create event")?
        .error_for_status()
        .context("Event creation rejected")?
        .json()
        .await
        .context("Failed to parse event")?;
    println!("📅 Created event {}", event.id);

    // 1. Import participants round-robin across tags
    let rows: Vec<ParticipantRow> = (0..args.participants)
        .map(|i| ParticipantRow {
            name: format!("LoadTestUser_{i}"),
            email: format!("loadtest{i}@example.com"),
            interest_tag: args.tags[i % args.tags.len()].clone(),
        })
        .collect();
    let report: ImportReport = admin_client
        .post(format!("{base_url}/api/admin/events/{}/participants/import", event.id))
        .json(&rows)
        .send()
        .await
        .context("Failed to import participants")?
        .error_for_status()
        .context("Participant import rejected")?
        .json()
        .await
        .context("Failed to parse import report")?;
    println!("📋 Imported {} participants", report.imported);

    let participants: Vec<Participant> = client
        .get(format!("{base_url}/api/events/{}/participants", event.id))
        .send()
        .await
        .context("Failed to fetch participants")?
        .json()
        .await
        .context("Failed to parse participants")?;

    let mut groups: HashMap<String, Vec<i64>> = HashMap::new();
    for p in &participants {
        groups.entry(p.interest_tag.clone()).or_default().push(p.id);
    }

    // 2. Everyone votes for a random peer in their group
    advance(&admin_client, &base_url, event.id, "voting").await?;
    let ballots: Vec<(i64, i64)> = {
        let mut rng = rand::thread_rng();
        participants
            .iter()
            .filter_map(|voter| {
                let peers: Vec<i64> = groups[&voter.interest_tag]
                    .iter()
                    .copied()
                    .filter(|id| *id != voter.id)
                    .collect();
                peers.choose(&mut rng).map(|candidate| (voter.id, *candidate))
            })
            .collect()
    };
    let votes = run_stage(ballots, args.concurrency, |(voter, candidate)| {
        let client = client.clone();
        let base_url = base_url.clone();
        let event_id = event.id;
        async move { cast_vote(&client, &base_url, event_id, voter, candidate).await }
    })
    .await;

    // 3. Leaders
    let selection: LeaderSelection = admin_client
        .post(format!("{base_url}/api/admin/events/{}/leaders/select", event.id))
        .send()
        .await
        .context("Failed to select leaders")?
        .error_for_status()
        .context("Leader selection rejected")?
        .json()
        .await
        .context("Failed to parse leader selection")?;
    println!(
        "👑 Selected {} leaders (threshold: {} votes)",
        selection.leader_count,
        selection.threshold.unwrap_or(0)
    );
    advance(&admin_client, &base_url, event.id, "team_formation").await?;

    // 4. Every leader opens a team
    let mut teams = Vec::with_capacity(selection.leaders.len());
    for leader in &selection.leaders {
        let team: Team = client
            .post(format!("{base_url}/api/events/{}/teams", event.id))
            .json(&CreateTeamRequest {
                leader_id: leader.id,
            })
            .send()
            .await
            .context("Failed to create team")?
            .error_for_status()
            .context("Team creation rejected")?
            .json()
            .await
            .context("Failed to parse team")?;
        teams.push(team);
    }
    println!("🧩 Opened {} teams", teams.len());

    // 5. Unassigned participants fill the teams concurrently
    let unassigned: Vec<Participant> = client
        .get(format!("{base_url}/api/events/{}/participants/unassigned", event.id))
        .send()
        .await
        .context("Failed to fetch unassigned participants")?
        .json()
        .await
        .context("Failed to parse unassigned participants")?;
    let assignments: Vec<(i64, i64)> = if teams.is_empty() {
        Vec::new()
    } else {
        // Three open seats per team besides the leader
        unassigned
            .iter()
            .take(teams.len() * 3)
            .enumerate()
            .map(|(i, p)| (teams[i % teams.len()].id, p.id))
            .collect()
    };
    let joins = run_stage(assignments, args.concurrency, |(team_id, participant_id)| {
        let client = client.clone();
        let base_url = base_url.clone();
        async move { join_team(&client, &base_url, team_id, participant_id).await }
    })
    .await;

    // 6. Leaders confirm
    let confirmations = run_stage(teams, args.concurrency, |team| {
        let client = client.clone();
        let base_url = base_url.clone();
        async move {
            client
                .post(format!("{base_url}/api/teams/{}/confirm", team.id))
                .json(&ConfirmTeamRequest {
                    leader_id: team.leader_id,
                })
                .send()
                .await
                .context("Failed to send confirm request")?
                .error_for_status()
                .context("Team confirmation rejected")?;
            Ok(())
        }
    })
    .await;

    println!("\n📊 Results:");
    votes.report("votes");
    joins.report("joins");
    confirmations.report("confirms");
    println!(
        "   Unplaced participants: {}",
        unassigned.len().saturating_sub(joins.successes)
    );
    println!("   Total time: {:?}", run_started.elapsed());

    Ok(())
}

/// Seconds since the epoch, enough to tell runs apart.
fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
