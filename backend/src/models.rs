use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rocket_db_pools::diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{admin_sessions, events, participants, team_members, teams, votes};

/// Lifecycle of an event. Phases only ever move forward one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Registration,
    Voting,
    TeamFormation,
    Completed,
}

impl EventPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            EventPhase::Registration => "registration",
            EventPhase::Voting => "voting",
            EventPhase::TeamFormation => "team_formation",
            EventPhase::Completed => "completed",
        }
    }

    pub fn next(self) -> Option<EventPhase> {
        match self {
            EventPhase::Registration => Some(EventPhase::Voting),
            EventPhase::Voting => Some(EventPhase::TeamFormation),
            EventPhase::TeamFormation => Some(EventPhase::Completed),
            EventPhase::Completed => None,
        }
    }
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event phase '{}'", self.0)
    }
}

impl FromStr for EventPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(EventPhase::Registration),
            "voting" => Ok(EventPhase::Voting),
            "team_formation" => Ok(EventPhase::TeamFormation),
            "completed" => Ok(EventPhase::Completed),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub phase: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = participants)]
pub struct Participant {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub email: String,
    pub interest_tag: String,
    pub is_leader: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = participants)]
pub struct NewParticipant {
    pub event_id: i32,
    pub name: String,
    pub email: String,
    pub interest_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = votes)]
pub struct Vote {
    pub id: i32,
    pub event_id: i32,
    pub voter_id: i32,
    pub candidate_id: i32,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote {
    pub event_id: i32,
    pub voter_id: i32,
    pub candidate_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub leader_id: i32,
    pub confirmed: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = teams)]
pub struct NewTeam {
    pub event_id: i32,
    pub name: String,
    pub leader_id: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = team_members)]
pub struct NewTeamMember {
    pub team_id: i32,
    pub participant_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = admin_sessions)]
pub struct AdminSession {
    pub session_token: String,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = admin_sessions)]
pub struct NewAdminSession {
    pub session_token: String,
    pub expires_at: Option<NaiveDateTime>,
    pub ip_address: Option<String>,
}

// Requests

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvancePhaseRequest {
    pub phase: EventPhase,
}

/// One participant row, used both for self registration and bulk import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub name: String,
    pub email: String,
    pub interest_tag: String,
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub voter_id: i32,
    pub candidate_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub leader_id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinTeamRequest {
    pub participant_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmTeamRequest {
    pub leader_id: i32,
}

// Responses

#[derive(Debug, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub participants: i64,
    pub leaders: i64,
    pub teams: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagGroup {
    pub tag: String,
    pub participants: usize,
}

#[derive(Debug, Serialize)]
pub struct VoteStatusResponse {
    pub has_voted: bool,
    pub candidate_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateResult {
    pub participant_id: i32,
    pub name: String,
    pub interest_tag: String,
    pub votes: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderSelectionResponse {
    pub leader_count: usize,
    pub threshold: Option<i64>,
    pub leaders: Vec<Participant>,
}

#[derive(Debug, Serialize)]
pub struct TeamWithMembers {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<Participant>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_round_trips_through_its_name() {
        for phase in [
            EventPhase::Registration,
            EventPhase::Voting,
            EventPhase::TeamFormation,
            EventPhase::Completed,
        ] {
            assert_eq!(phase.as_str().parse::<EventPhase>(), Ok(phase));
        }
        assert!("closed".parse::<EventPhase>().is_err());
    }

    #[test]
    fn phases_advance_in_order() {
        assert_eq!(EventPhase::Registration.next(), Some(EventPhase::Voting));
        assert_eq!(EventPhase::Voting.next(), Some(EventPhase::TeamFormation));
        assert_eq!(EventPhase::TeamFormation.next(), Some(EventPhase::Completed));
        assert_eq!(EventPhase::Completed.next(), None);
    }

    #[test]
    fn phase_serializes_as_snake_case() {
        let json = serde_json::to_string(&EventPhase::TeamFormation).unwrap();
        assert_eq!(json, "\"team_formation\"");
        let parsed: AdvancePhaseRequest = serde_json::from_str(r#"{"phase":"voting"}"#).unwrap();
        assert_eq!(parsed.phase, EventPhase::Voting);
    }
}
