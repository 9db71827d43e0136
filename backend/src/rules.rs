//! Business rules for leader selection and team formation.
//!
//! Everything here is pure so handlers can load rows, ask these functions
//! for a verdict and then write the outcome back.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    CandidateResult, EventPhase, ImportReport, NewParticipant, Participant, ParticipantInput,
    RejectedRow, TagGroup, Team,
};

/// Maximum members per team, leader included.
pub const TEAM_CAPACITY: usize = 4;
/// A team needs at least this many members before it can be confirmed.
pub const MIN_CONFIRMED_TEAM_SIZE: usize = 2;
/// One leader is chosen per this many participants.
pub const PARTICIPANTS_PER_LEADER: usize = 4;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 255;
const MAX_TAG_LEN: usize = 50;

/// `round(participants / 4)` with halves rounded up.
pub fn leader_count(participants: usize) -> usize {
    (participants + PARTICIPANTS_PER_LEADER / 2) / PARTICIPANTS_PER_LEADER
}

pub fn require_phase(actual: EventPhase, expected: EventPhase) -> ApiResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ApiError::PreconditionFailed(format!(
            "event is in phase '{actual}', this action needs '{expected}'"
        )))
    }
}

pub fn check_transition(from: EventPhase, to: EventPhase) -> ApiResult<()> {
    match from.next() {
        Some(next) if next == to => Ok(()),
        Some(next) => Err(ApiError::Conflict(format!(
            "event in phase '{from}' can only advance to '{next}'"
        ))),
        None => Err(ApiError::Conflict(format!("event is already '{from}'"))),
    }
}

/// Trim and lowercase a submitted participant, rejecting unusable rows.
pub fn normalize_participant(event_id: i32, input: &ParticipantInput) -> ApiResult<NewParticipant> {
    let name = input.name.trim();
    let email = input.email.trim().to_lowercase();
    let tag = input.interest_tag.trim().to_lowercase();

    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
        _ => {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not a valid email address",
                input.email.trim()
            )))
        }
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::BadRequest(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    if tag.is_empty() {
        return Err(ApiError::BadRequest("interest_tag must not be empty".to_string()));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(ApiError::BadRequest(format!(
            "interest_tag must be at most {MAX_TAG_LEN} characters"
        )));
    }

    Ok(NewParticipant {
        event_id,
        name: name.to_string(),
        email,
        interest_tag: tag,
    })
}

/// Split an import batch into rows to insert and a report. Rows are numbered
/// from 1; emails already in `existing` or earlier in the batch are skipped.
pub fn plan_import(
    event_id: i32,
    rows: &[ParticipantInput],
    mut existing: HashSet<String>,
) -> (Vec<NewParticipant>, ImportReport) {
    let mut accepted = Vec::new();
    let mut report = ImportReport::default();

    for (index, row) in rows.iter().enumerate() {
        match normalize_participant(event_id, row) {
            Ok(participant) => {
                if existing.insert(participant.email.clone()) {
                    accepted.push(participant);
                } else {
                    report.skipped += 1;
                }
            }
            Err(e) => report.rejected.push(RejectedRow {
                row: index + 1,
                reason: e.to_string(),
            }),
        }
    }

    report.imported = accepted.len();
    (accepted, report)
}

pub fn check_vote(voter: &Participant, candidate: &Participant) -> ApiResult<()> {
    if voter.id == candidate.id {
        return Err(ApiError::BadRequest(
            "participants cannot vote for themselves".to_string(),
        ));
    }
    if voter.interest_tag != candidate.interest_tag {
        return Err(ApiError::BadRequest(format!(
            "candidate is in group '{}', voter is in '{}'",
            candidate.interest_tag, voter.interest_tag
        )));
    }
    Ok(())
}

pub fn tally_votes(candidate_ids: impl IntoIterator<Item = i32>) -> HashMap<i32, i64> {
    let mut tally = HashMap::new();
    for id in candidate_ids {
        *tally.entry(id).or_insert(0) += 1;
    }
    tally
}

/// Every participant ranked by received votes, most first. Ties go to the
/// participant who registered first.
pub fn rank_candidates(
    participants: &[Participant],
    tally: &HashMap<i32, i64>,
) -> Vec<CandidateResult> {
    let mut ranked: Vec<CandidateResult> = participants
        .iter()
        .map(|p| CandidateResult {
            participant_id: p.id,
            name: p.name.clone(),
            interest_tag: p.interest_tag.clone(),
            votes: tally.get(&p.id).copied().unwrap_or(0),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then(a.participant_id.cmp(&b.participant_id))
    });
    ranked
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderSelection {
    pub leader_ids: Vec<i32>,
    /// Votes held by the lowest-ranked leader.
    pub threshold: Option<i64>,
}

/// Take the top `leader_count(ranked.len())` of an already ranked list.
pub fn select_leaders(ranked: &[CandidateResult]) -> LeaderSelection {
    let chosen = &ranked[..leader_count(ranked.len()).min(ranked.len())];
    LeaderSelection {
        leader_ids: chosen.iter().map(|c| c.participant_id).collect(),
        threshold: chosen.last().map(|c| c.votes),
    }
}

pub fn group_by_tag<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<TagGroup> {
    let mut groups: BTreeMap<&str, usize> = BTreeMap::new();
    for tag in tags {
        *groups.entry(tag).or_default() += 1;
    }
    groups
        .into_iter()
        .map(|(tag, participants)| TagGroup {
            tag: tag.to_string(),
            participants,
        })
        .collect()
}

pub fn check_team_leader(leader: &Participant, already_on_team: bool) -> ApiResult<()> {
    if !leader.is_leader {
        return Err(ApiError::BadRequest(format!(
            "participant {} was not selected as a leader",
            leader.id
        )));
    }
    if already_on_team {
        return Err(ApiError::Conflict(format!(
            "participant {} is already on a team",
            leader.id
        )));
    }
    Ok(())
}

pub fn check_join(team: &Team, member_count: usize, already_on_team: bool) -> ApiResult<()> {
    if team.confirmed {
        return Err(ApiError::Conflict(format!(
            "team '{}' is confirmed and locked",
            team.name
        )));
    }
    if already_on_team {
        return Err(ApiError::Conflict(
            "participant is already on a team".to_string(),
        ));
    }
    if member_count >= TEAM_CAPACITY {
        return Err(team_full());
    }
    Ok(())
}

/// `seat` is the 1-based position of a new membership row among the team's
/// rows in insertion order. Only rows past capacity give their seat back, so
/// of two racing joins only the later one is undone.
pub fn check_seat(seat: usize) -> ApiResult<()> {
    if seat > TEAM_CAPACITY {
        return Err(team_full());
    }
    Ok(())
}

fn team_full() -> ApiError {
    ApiError::Conflict(format!("team is full ({TEAM_CAPACITY} members)"))
}

pub fn check_leave(team: &Team, participant_id: i32) -> ApiResult<()> {
    if team.confirmed {
        return Err(ApiError::Conflict(format!(
            "team '{}' is confirmed and locked",
            team.name
        )));
    }
    if team.leader_id == participant_id {
        return Err(ApiError::BadRequest(
            "the team leader cannot leave their own team".to_string(),
        ));
    }
    Ok(())
}

pub fn check_confirm(team: &Team, leader_id: i32, member_count: usize) -> ApiResult<()> {
    if team.leader_id != leader_id {
        return Err(ApiError::Forbidden(
            "only the team leader can confirm the team".to_string(),
        ));
    }
    if team.confirmed {
        return Err(ApiError::Conflict("team is already confirmed".to_string()));
    }
    if member_count < MIN_CONFIRMED_TEAM_SIZE {
        return Err(ApiError::PreconditionFailed(format!(
            "a team needs at least {MIN_CONFIRMED_TEAM_SIZE} members to be confirmed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    fn participant(id: i32, tag: &str) -> Participant {
        Participant {
            id,
            event_id: 1,
            name: format!("P{id}"),
            email: format!("p{id}@example.com"),
            interest_tag: tag.to_string(),
            is_leader: false,
            created_at: None,
        }
    }

    fn team(leader_id: i32, confirmed: bool) -> Team {
        Team {
            id: 10,
            event_id: 1,
            name: "Rustaceans".to_string(),
            leader_id,
            confirmed,
            created_at: None,
        }
    }

    fn input(name: &str, email: &str, tag: &str) -> ParticipantInput {
        ParticipantInput {
            name: name.to_string(),
            email: email.to_string(),
            interest_tag: tag.to_string(),
        }
    }

    #[test]
    fn leader_count_rounds_half_up() {
        assert_eq!(leader_count(0), 0);
        assert_eq!(leader_count(1), 0);
        assert_eq!(leader_count(2), 1);
        assert_eq!(leader_count(4), 1);
        assert_eq!(leader_count(5), 1);
        assert_eq!(leader_count(6), 2);
        assert_eq!(leader_count(10), 3);
        assert_eq!(leader_count(13), 3);
        assert_eq!(leader_count(14), 4);
    }

    #[test]
    fn transitions_only_go_one_step_forward() {
        assert!(check_transition(EventPhase::Registration, EventPhase::Voting).is_ok());
        assert!(check_transition(EventPhase::Voting, EventPhase::TeamFormation).is_ok());
        assert!(check_transition(EventPhase::TeamFormation, EventPhase::Completed).is_ok());

        let skip = check_transition(EventPhase::Registration, EventPhase::TeamFormation);
        assert_eq!(skip.unwrap_err().status(), Status::Conflict);
        let back = check_transition(EventPhase::Voting, EventPhase::Registration);
        assert_eq!(back.unwrap_err().status(), Status::Conflict);
        let same = check_transition(EventPhase::Voting, EventPhase::Voting);
        assert!(same.is_err());
        let done = check_transition(EventPhase::Completed, EventPhase::Completed);
        assert!(done.is_err());
    }

    #[test]
    fn wrong_phase_is_precondition_failure() {
        assert!(require_phase(EventPhase::Voting, EventPhase::Voting).is_ok());
        let err = require_phase(EventPhase::Registration, EventPhase::Voting).unwrap_err();
        assert_eq!(err.status(), Status::PreconditionFailed);
    }

    #[test]
    fn participant_input_is_normalized() {
        let row = normalize_participant(7, &input("  Ada Lovelace ", " Ada@Example.COM ", " Rust "))
            .unwrap();
        assert_eq!(
            row,
            NewParticipant {
                event_id: 7,
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                interest_tag: "rust".to_string(),
            }
        );
    }

    #[test]
    fn unusable_participant_rows_are_rejected() {
        assert!(normalize_participant(1, &input(" ", "a@b.c", "ml")).is_err());
        assert!(normalize_participant(1, &input("A", "not-an-email", "ml")).is_err());
        assert!(normalize_participant(1, &input("A", "@b.c", "ml")).is_err());
        assert!(normalize_participant(1, &input("A", "a@", "ml")).is_err());
        assert!(normalize_participant(1, &input("A", "a@b@c", "ml")).is_err());
        assert!(normalize_participant(1, &input("A", "a@b.c", "  ")).is_err());
        let long_name = "x".repeat(101);
        assert!(normalize_participant(1, &input(&long_name, "a@b.c", "ml")).is_err());
    }

    #[test]
    fn import_skips_duplicates_and_reports_bad_rows() {
        let existing: HashSet<String> = ["taken@example.com".to_string()].into();
        let rows = vec![
            input("Ada", "ada@example.com", "web"),
            input("Taken", "TAKEN@example.com", "web"),
            input("", "blank@example.com", "web"),
            input("Ada again", " Ada@Example.com", "ml"),
            input("Grace", "grace@example.com", "ML"),
        ];

        let (accepted, report) = plan_import(3, &rows, existing);
        let emails: Vec<&str> = accepted.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails, vec!["ada@example.com", "grace@example.com"]);
        assert_eq!(accepted[1].interest_tag, "ml");
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].row, 3);
    }

    #[test]
    fn votes_stay_inside_the_tag_group() {
        let alice = participant(1, "web");
        let bob = participant(2, "web");
        let carol = participant(3, "ml");

        assert!(check_vote(&alice, &bob).is_ok());
        assert_eq!(
            check_vote(&alice, &alice).unwrap_err().status(),
            Status::BadRequest
        );
        assert_eq!(
            check_vote(&alice, &carol).unwrap_err().status(),
            Status::BadRequest
        );
    }

    #[test]
    fn ranking_orders_by_votes_then_registration() {
        let people: Vec<_> = (1..=5).map(|id| participant(id, "web")).collect();
        let tally = tally_votes([3, 3, 5, 2, 5, 4]);

        let ranked = rank_candidates(&people, &tally);
        let order: Vec<(i32, i64)> = ranked.iter().map(|r| (r.participant_id, r.votes)).collect();
        assert_eq!(order, vec![(3, 2), (5, 2), (2, 1), (4, 1), (1, 0)]);
    }

    #[test]
    fn top_n_leaders_are_selected_with_threshold() {
        let people: Vec<_> = (1..=10).map(|id| participant(id, "web")).collect();
        let tally = tally_votes([9, 9, 9, 4, 4, 7, 2]);
        let ranked = rank_candidates(&people, &tally);

        let selection = select_leaders(&ranked);
        // round(10 / 4) = 3
        assert_eq!(selection.leader_ids, vec![9, 4, 2]);
        assert_eq!(selection.threshold, Some(1));
    }

    #[test]
    fn zero_vote_participants_fill_remaining_leader_slots() {
        let people: Vec<_> = (1..=8).map(|id| participant(id, "web")).collect();
        let ranked = rank_candidates(&people, &tally_votes([6]));

        let selection = select_leaders(&ranked);
        assert_eq!(selection.leader_ids, vec![6, 1]);
        assert_eq!(selection.threshold, Some(0));
    }

    #[test]
    fn no_participants_means_no_leaders() {
        let selection = select_leaders(&[]);
        assert!(selection.leader_ids.is_empty());
        assert_eq!(selection.threshold, None);
    }

    #[test]
    fn tags_are_grouped_and_sorted() {
        let groups = group_by_tag(["web", "ml", "web", "data", "web"]);
        assert_eq!(
            groups,
            vec![
                TagGroup { tag: "data".into(), participants: 1 },
                TagGroup { tag: "ml".into(), participants: 1 },
                TagGroup { tag: "web".into(), participants: 3 },
            ]
        );
    }

    #[test]
    fn only_unassigned_selected_leaders_open_teams() {
        let mut leader = participant(1, "web");
        assert_eq!(
            check_team_leader(&leader, false).unwrap_err().status(),
            Status::BadRequest
        );
        leader.is_leader = true;
        assert!(check_team_leader(&leader, false).is_ok());
        assert_eq!(
            check_team_leader(&leader, true).unwrap_err().status(),
            Status::Conflict
        );
    }

    #[test]
    fn joining_respects_capacity_and_lock() {
        let open = team(1, false);
        assert!(check_join(&open, 1, false).is_ok());
        assert!(check_join(&open, TEAM_CAPACITY - 1, false).is_ok());

        let full = check_join(&open, TEAM_CAPACITY, false).unwrap_err();
        assert_eq!(full.status(), Status::Conflict);
        assert!(full.to_string().contains("full"));

        assert!(check_join(&open, 1, true).is_err());
        assert!(check_join(&team(1, true), 1, false).is_err());
    }

    #[test]
    fn only_seats_past_capacity_are_given_back() {
        // Three members, then two joins that both passed the count check
        let first = TEAM_CAPACITY;
        let second = TEAM_CAPACITY + 1;
        assert!(check_seat(first).is_ok());
        let err = check_seat(second).unwrap_err();
        assert_eq!(err.status(), Status::Conflict);
        assert!(err.to_string().contains("full"));
        assert!(check_seat(1).is_ok());
    }

    #[test]
    fn leader_cannot_leave_and_confirmed_teams_are_locked() {
        assert!(check_leave(&team(1, false), 2).is_ok());
        assert_eq!(
            check_leave(&team(1, false), 1).unwrap_err().status(),
            Status::BadRequest
        );
        assert_eq!(
            check_leave(&team(1, true), 2).unwrap_err().status(),
            Status::Conflict
        );
    }

    #[test]
    fn confirmation_rules() {
        let open = team(1, false);
        assert!(check_confirm(&open, 1, 2).is_ok());
        assert!(check_confirm(&open, 1, TEAM_CAPACITY).is_ok());
        assert_eq!(
            check_confirm(&open, 2, 3).unwrap_err().status(),
            Status::Forbidden
        );
        assert_eq!(
            check_confirm(&open, 1, 1).unwrap_err().status(),
            Status::PreconditionFailed
        );
        assert_eq!(
            check_confirm(&team(1, true), 1, 3).unwrap_err().status(),
            Status::Conflict
        );
    }
}
