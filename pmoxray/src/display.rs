//! Display targets written by the synchronizer
//!
//! The core never reads a slot back. [`NowPlayingDisplay`] receives the
//! track fields; [`FactDisplay`] is the single slot owned by the carousel.

/// Track slots: title, cover, artists, meaning
pub trait NowPlayingDisplay {
    fn set_song_title(&mut self, title: &str);
    fn set_album_art(&mut self, url: &str);
    fn set_artists(&mut self, artists: &str);
    fn set_meaning(&mut self, meaning: &str);
}

/// The current-fact slot
pub trait FactDisplay {
    /// Show `fact`, or clear the slot on `None`
    fn show_fact(&mut self, fact: Option<&str>);
}

/// In-memory display keeping the last value of every slot
///
/// Handy for headless use and for asserting on what was rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDisplay {
    pub song_title: Option<String>,
    pub album_art: Option<String>,
    pub artists: Option<String>,
    pub meaning: Option<String>,
    pub fact: Option<String>,
    /// Every fact write, in order (`None` for a clear)
    pub fact_history: Vec<Option<String>>,
    /// Number of track slot writes
    pub track_writes: usize,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NowPlayingDisplay for MemoryDisplay {
    fn set_song_title(&mut self, title: &str) {
        self.song_title = Some(title.to_string());
        self.track_writes += 1;
    }

    fn set_album_art(&mut self, url: &str) {
        self.album_art = Some(url.to_string());
        self.track_writes += 1;
    }

    fn set_artists(&mut self, artists: &str) {
        self.artists = Some(artists.to_string());
        self.track_writes += 1;
    }

    fn set_meaning(&mut self, meaning: &str) {
        self.meaning = Some(meaning.to_string());
        self.track_writes += 1;
    }
}

impl FactDisplay for MemoryDisplay {
    fn show_fact(&mut self, fact: Option<&str>) {
        self.fact = fact.map(str::to_string);
        self.fact_history.push(self.fact.clone());
    }
}

/// Display printing every slot write to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl NowPlayingDisplay for LogDisplay {
    fn set_song_title(&mut self, title: &str) {
        tracing::info!(slot = "song_title", "{}", title);
    }

    fn set_album_art(&mut self, url: &str) {
        tracing::info!(slot = "album_art", "{}", url);
    }

    fn set_artists(&mut self, artists: &str) {
        tracing::info!(slot = "artists", "{}", artists);
    }

    fn set_meaning(&mut self, meaning: &str) {
        tracing::info!(slot = "meaning", "{}", meaning);
    }
}

impl FactDisplay for LogDisplay {
    fn show_fact(&mut self, fact: Option<&str>) {
        match fact {
            Some(fact) => tracing::info!(slot = "fact", "{}", fact),
            None => tracing::info!(slot = "fact", "(cleared)"),
        }
    }
}
