pub mod admin;
pub mod client;

use crate::db::{self, Db};
use crate::error::ApiResult;
use crate::models::{Participant, Team, TeamWithMembers};

/// Pair each team with its members, keeping both orders.
pub fn attach_members(teams: Vec<Team>, members: Vec<(i32, Participant)>) -> Vec<TeamWithMembers> {
    let mut result: Vec<TeamWithMembers> = teams
        .into_iter()
        .map(|team| TeamWithMembers {
            team,
            members: Vec::new(),
        })
        .collect();

    for (team_id, participant) in members {
        if let Some(entry) = result.iter_mut().find(|t| t.team.id == team_id) {
            entry.members.push(participant);
        }
    }
    result
}

pub async fn with_members(db: &mut Db, teams: Vec<Team>) -> ApiResult<Vec<TeamWithMembers>> {
    let team_ids = teams.iter().map(|t| t.id).collect::<Vec<_>>();
    let members = if team_ids.is_empty() {
        Vec::new()
    } else {
        db::load_members(db, team_ids).await?
    };
    Ok(attach_members(teams, members))
}

pub async fn team_with_members(db: &mut Db, team: Team) -> ApiResult<TeamWithMembers> {
    let members = db::load_members(db, vec![team.id]).await?;
    let mut teams = attach_members(vec![team], members);
    Ok(teams.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i32, leader_id: i32) -> Team {
        Team {
            id,
            event_id: 1,
            name: format!("Team {id}"),
            leader_id,
            confirmed: false,
            created_at: None,
        }
    }

    fn participant(id: i32) -> Participant {
        Participant {
            id,
            event_id: 1,
            name: format!("P{id}"),
            email: format!("p{id}@example.com"),
            interest_tag: "web".to_string(),
            is_leader: false,
            created_at: None,
        }
    }

    #[test]
    fn members_land_on_their_own_team() {
        let teams = vec![team(1, 10), team(2, 20), team(3, 30)];
        let members = vec![
            (1, participant(10)),
            (2, participant(20)),
            (1, participant(11)),
            (99, participant(99)),
        ];

        let grouped = attach_members(teams, members);
        let ids: Vec<Vec<i32>> = grouped
            .iter()
            .map(|t| t.members.iter().map(|m| m.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![10, 11], vec![20], vec![]]);
    }
}
