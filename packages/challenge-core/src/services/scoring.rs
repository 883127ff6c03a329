use crate::models::participant::Participant;

/// Flat value of a correct answer, shared by duel and group modes.
pub const POINTS_PER_CORRECT_ANSWER: u32 = 10;

/// Higher score wins; on equal scores the lower total time wins; a full
/// tie is a draw.
pub fn determine_winner(p1: &Participant, p2: &Participant) -> Option<String> {
    use std::cmp::Ordering;

    match p1
        .score
        .cmp(&p2.score)
        .then(p2.total_time_seconds.cmp(&p1.total_time_seconds))
    {
        Ordering::Greater => Some(p1.user_id.clone()),
        Ordering::Less => Some(p2.user_id.clone()),
        Ordering::Equal => None,
    }
}

/// Assigns ranks 1..N ordered by score descending, then total time
/// ascending. Participants tied on both fields get distinct consecutive
/// ranks in arrival order: the slice is first put in seat order, and the
/// ranking sort is stable.
pub fn rank_participants(participants: &mut [Participant]) {
    participants.sort_by_key(|p| p.seat);
    participants.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.total_time_seconds.cmp(&b.total_time_seconds))
    });

    for (index, participant) in participants.iter_mut().enumerate() {
        participant.rank = Some(index as u32 + 1);
    }
}

/// Completion predicate: the match is over once every participant has
/// marked complete.
pub fn all_completed(participants: &[Participant]) -> bool {
    !participants.is_empty() && participants.iter().all(|p| p.completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(user_id: &str, score: u32, time: u32, seat: u32) -> Participant {
        let mut p = Participant::new("match-1", user_id, user_id, seat);
        p.score = score;
        p.total_time_seconds = time;
        p
    }

    #[test]
    fn test_higher_score_wins() {
        let p1 = participant("p1", 50, 200, 0);
        let p2 = participant("p2", 30, 100, 1);

        assert_eq!(determine_winner(&p1, &p2).as_deref(), Some("p1"));
        assert_eq!(determine_winner(&p2, &p1).as_deref(), Some("p1"));
    }

    #[test]
    fn test_equal_score_faster_time_wins() {
        let p1 = participant("p1", 40, 120, 0);
        let p2 = participant("p2", 40, 150, 1);

        assert_eq!(determine_winner(&p1, &p2).as_deref(), Some("p1"));
        assert_eq!(determine_winner(&p2, &p1).as_deref(), Some("p1"));
    }

    #[test]
    fn test_full_tie_is_a_draw() {
        let p1 = participant("p1", 40, 120, 0);
        let p2 = participant("p2", 40, 120, 1);

        assert_eq!(determine_winner(&p1, &p2), None);
    }

    #[test]
    fn test_ranks_are_a_permutation() {
        let mut participants = vec![
            participant("a", 30, 90, 0),
            participant("b", 50, 200, 1),
            participant("c", 30, 60, 2),
            participant("d", 10, 10, 3),
        ];

        rank_participants(&mut participants);

        let mut ranks: Vec<u32> = participants.iter().map(|p| p.rank.unwrap()).collect();
        ranks.sort();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rank_order_score_then_time() {
        let mut participants = vec![
            participant("slow", 40, 150, 0),
            participant("fast", 40, 120, 1),
            participant("top", 50, 300, 2),
        ];

        rank_participants(&mut participants);

        let order: Vec<(&str, u32)> = participants
            .iter()
            .map(|p| (p.user_id.as_str(), p.rank.unwrap()))
            .collect();
        assert_eq!(order, vec![("top", 1), ("fast", 2), ("slow", 3)]);
    }

    #[test]
    fn test_full_ties_rank_in_arrival_order() {
        let mut participants = vec![
            participant("second", 40, 120, 1),
            participant("third", 40, 120, 2),
            participant("first", 40, 120, 0),
        ];

        rank_participants(&mut participants);

        let order: Vec<(&str, u32)> = participants
            .iter()
            .map(|p| (p.user_id.as_str(), p.rank.unwrap()))
            .collect();
        assert_eq!(order, vec![("first", 1), ("second", 2), ("third", 3)]);
    }

    #[test]
    fn test_tie_break_is_reproducible() {
        for _ in 0..10 {
            let mut participants = vec![
                participant("b", 20, 50, 1),
                participant("a", 20, 50, 0),
            ];
            rank_participants(&mut participants);
            assert_eq!(participants[0].user_id, "a");
            assert_eq!(participants[0].rank, Some(1));
            assert_eq!(participants[1].rank, Some(2));
        }
    }

    #[test]
    fn test_all_completed() {
        let mut participants = vec![participant("a", 0, 0, 0), participant("b", 0, 0, 1)];
        assert!(!all_completed(&participants));

        participants[0].completed = true;
        assert!(!all_completed(&participants));

        participants[1].completed = true;
        assert!(all_completed(&participants));

        assert!(!all_completed(&[]));
    }
}
