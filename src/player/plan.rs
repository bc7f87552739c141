// Pure queue arithmetic behind the controller operations.

use crate::api::models::Song;

/// `song` at the head of `queue`, with any earlier entry for the same url
/// dropped so the track appears once.
pub fn promote_to_top(queue: &[Song], song: Song) -> Vec<Song> {
    let mut next = Vec::with_capacity(queue.len() + 1);
    next.extend(
        queue
            .iter()
            .filter(|existing| !existing.same_track(&song))
            .cloned(),
    );
    next.insert(0, song);
    next
}

/// Active index once `removed` is taken out of a queue that is `new_len`
/// long afterwards.
pub fn index_after_removal(removed: usize, active: usize, new_len: usize) -> usize {
    if removed < active {
        active - 1
    } else if removed == active {
        removed.min(new_len.saturating_sub(1))
    } else {
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(name: &str) -> Song {
        Song {
            name: name.to_string(),
            url: format!("https://cdn.example.com/{name}.mp3"),
            ..Song::default()
        }
    }

    fn names(queue: &[Song]) -> Vec<String> {
        queue.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn new_song_is_prepended() {
        let queue = vec![song("a"), song("b"), song("c")];
        let next = promote_to_top(&queue, song("d"));
        assert_eq!(next.len(), queue.len() + 1);
        assert_eq!(names(&next), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn existing_song_moves_without_growth() {
        let queue = vec![song("a"), song("b"), song("c")];
        let next = promote_to_top(&queue, song("c"));
        assert_eq!(next.len(), queue.len());
        assert_eq!(names(&next), vec!["c", "a", "b"]);

        let next = promote_to_top(&queue, song("b"));
        assert_eq!(names(&next), vec!["b", "a", "c"]);
    }

    #[test]
    fn removal_shifts_active_index() {
        for len in 2..6usize {
            for active in 0..len {
                for removed in 0..len {
                    let new_len = len - 1;
                    let next = index_after_removal(removed, active, new_len);
                    if removed < active {
                        assert_eq!(next, active - 1);
                    } else if removed > active {
                        assert_eq!(next, active);
                    } else {
                        assert_eq!(next, removed.min(new_len - 1));
                    }
                    assert!(next < new_len);
                }
            }
        }
    }
}
