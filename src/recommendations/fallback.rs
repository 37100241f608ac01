//! Offline recommendations used when the generator cannot be reached.
//!
//! Seeds are matched against four small artist lists to guess a dominant
//! genre, which selects one of a handful of fixed lists. Output depends
//! only on the input, so repeated calls are identical.

use crate::recommendations::types::RecommendationEntry;

struct GenreBucket {
    name: &'static str,
    artists: &'static [&'static str],
    titles: &'static [&'static str],
}

const BUCKET_COUNT: usize = 4;

static BUCKETS: [GenreBucket; BUCKET_COUNT] = [
    GenreBucket {
        name: "rock",
        artists: &[
            "queen", "beatles", "rolling stones", "led zeppelin", "ac/dc",
            "guns n' roses", "nirvana", "radiohead", "pink floyd", "u2",
        ],
        titles: &[
            "Bohemian Rhapsody", "Stairway to Heaven", "Sweet Child O' Mine",
            "Smells Like Teen Spirit", "Back in Black", "Comfortably Numb",
            "I Can't Get No Satisfaction", "With or Without You", "Creep",
            "Come As You Are", "Baba O'Riley", "Enter Sandman", "Black",
            "November Rain", "Paint It Black",
        ],
    },
    GenreBucket {
        name: "pop",
        artists: &[
            "michael jackson", "madonna", "prince", "beyoncé", "taylor swift",
            "adele", "justin timberlake", "katy perry", "bruno mars", "ariana grande",
        ],
        titles: &[
            "Billie Jean", "Like a Prayer", "Purple Rain", "Single Ladies",
            "Blank Space", "Rolling in the Deep", "SexyBack", "Roar",
            "Just the Way You Are", "Thank U, Next", "Shape of You", "Toxic",
            "Uptown Funk", "Bad Guy", "Blinding Lights",
        ],
    },
    GenreBucket {
        name: "electronic",
        artists: &[
            "daft punk", "calvin harris", "avicii", "skrillex", "deadmau5",
            "david guetta", "the chemical brothers", "tiësto", "diplo", "marshmello",
        ],
        titles: &[
            "One More Time", "Summer", "Wake Me Up", "Bangarang", "Strobe",
            "Titanium", "Block Rockin' Beats", "Adagio for Strings", "Lean On",
            "Alone", "Levels", "Don't You Worry Child", "Animals",
            "Scary Monsters and Nice Sprites", "Clarity",
        ],
    },
    GenreBucket {
        name: "hip-hop",
        artists: &[
            "jay-z", "kanye west", "tupac", "drake", "kendrick lamar", "eminem",
            "nas", "snoop dogg", "missy elliott", "run-dmc",
        ],
        titles: &[
            "Empire State of Mind", "Stronger", "California Love", "God's Plan",
            "Alright", "Lose Yourself", "N.Y. State of Mind", "Drop It Like It's Hot",
            "Get Ur Freak On", "It's Tricky", "Hotline Bling", "Humble", "Juicy",
            "This Is America", "Jesus Walks",
        ],
    },
];

/// Served when seeds show no single dominant genre.
const DIVERSE_TITLES: &[&str] = &[
    "Bohemian Rhapsody", "Billie Jean", "One More Time", "99 Problems",
    "Hotel California", "Shape of You", "Levels", "Alright", "Hey Jude",
    "Bad Guy", "Dreams", "Uptown Funk", "Hurt", "Hymn for the Weekend",
    "Blinding Lights",
];

/// Served when there are no seeds at all.
const CLASSIC_TITLES: &[&str] = &[
    "Bohemian Rhapsody", "Hotel California", "Billie Jean", "Imagine",
    "Smells Like Teen Spirit", "Sweet Child O' Mine", "Like a Rolling Stone",
    "Respect", "Yesterday", "Purple Haze", "Dancing Queen", "Superstition",
    "Stairway to Heaven", "I Want to Hold Your Hand", "Johnny B. Goode",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackRecommender;

impl FallbackRecommender {
    pub fn new() -> Self {
        Self
    }

    /// Fixed 15-entry list chosen from the seeds' dominant genre.
    pub fn recommend(&self, seed_tracks: &[String]) -> Vec<RecommendationEntry> {
        let titles = if seed_tracks.is_empty() {
            CLASSIC_TITLES
        } else {
            match Self::dominant_bucket(seed_tracks) {
                Some(bucket) => {
                    log::info!("Fallback picked genre '{}'", bucket.name);
                    bucket.titles
                }
                None => DIVERSE_TITLES,
            }
        };

        log::info!(
            "Generated {} fallback recommendations from {} seed tracks",
            titles.len(),
            seed_tracks.len()
        );

        titles.iter().map(|t| RecommendationEntry::titled(*t)).collect()
    }

    /// Bucket with the strictly highest match count, if any.
    fn dominant_bucket(seed_tracks: &[String]) -> Option<&'static GenreBucket> {
        let mut counts = [0usize; BUCKET_COUNT];

        for track in seed_tracks {
            let lower = track.to_lowercase();
            for (count, bucket) in counts.iter_mut().zip(BUCKETS.iter()) {
                if bucket.artists.iter().any(|artist| lower.contains(artist)) {
                    *count += 1;
                }
            }
        }

        let max = counts.iter().copied().max().unwrap_or(0);
        if max == 0 || counts.iter().filter(|&&c| c == max).count() > 1 {
            return None;
        }

        counts
            .iter()
            .position(|&c| c == max)
            .map(|idx| &BUCKETS[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn first_title(entries: &[RecommendationEntry]) -> &str {
        &entries[0].song_title
    }

    #[test]
    fn test_every_list_has_fifteen_entries() {
        for bucket in &BUCKETS {
            assert_eq!(bucket.titles.len(), 15, "{}", bucket.name);
        }
        assert_eq!(DIVERSE_TITLES.len(), 15);
        assert_eq!(CLASSIC_TITLES.len(), 15);
    }

    #[test]
    fn test_empty_seeds_get_classics() {
        let recs = FallbackRecommender::new().recommend(&[]);
        assert_eq!(recs.len(), 15);
        assert_eq!(recs[3].song_title, "Imagine");
    }

    #[test]
    fn test_dominant_genre() {
        let recs = FallbackRecommender::new().recommend(&seeds(&[
            "Lose Yourself by Eminem",
            "HUMBLE. by Kendrick Lamar",
            "Creep by Radiohead",
        ]));
        assert_eq!(first_title(&recs), "Empire State of Mind");
        assert!(recs.iter().all(|e| e.artist.is_empty()));
    }

    #[test]
    fn test_one_match_per_bucket_per_track() {
        // Two rock artists in one description still count once.
        let recs = FallbackRecommender::new().recommend(&seeds(&[
            "Under Pressure by Queen & David Bowie (Beatles cover)",
            "Levels by Avicii",
            "Strobe by deadmau5",
        ]));
        assert_eq!(first_title(&recs), "One More Time");
    }

    #[test]
    fn test_tie_gets_diverse_list() {
        let recs = FallbackRecommender::new().recommend(&seeds(&[
            "Creep by Radiohead",
            "Toxic by Britney Spears feat. Madonna",
        ]));
        assert_eq!(first_title(&recs), "Bohemian Rhapsody");
        assert_eq!(recs[2].song_title, "One More Time");
    }

    #[test]
    fn test_no_signal_gets_diverse_list() {
        let recs = FallbackRecommender::new().recommend(&seeds(&["Song by Nobody"]));
        assert_eq!(recs[3].song_title, "99 Problems");
    }

    #[test]
    fn test_deterministic() {
        let input = seeds(&["Around the World by Daft Punk", "Clocks by Coldplay"]);
        let fallback = FallbackRecommender::new();
        assert_eq!(fallback.recommend(&input), fallback.recommend(&input));
    }
}
