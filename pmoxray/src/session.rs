//! Streaming-state synchronizer
//!
//! [`Reconciler`] applies snapshots to the display and feeds the fact
//! carousel; [`XraySession`] drives it from a [`Subscription`]. Stream
//! deliveries and carousel ticks are serialized by a single `select!` loop,
//! so no two updates ever run at the same time.

use crate::carousel::CarouselController;
use crate::client::{StreamClient, Subscription};
use crate::config::XrayConfig;
use crate::display::{FactDisplay, NowPlayingDisplay};
use crate::error::Result;
use crate::events::{LoginRedirect, StreamError, StreamHandler};
use crate::models::Snapshot;

/// Applies snapshots to a display
///
/// While a snapshot reports `is_playing == false`, the track slots keep
/// their last rendered value; only the carousel sees the new fact list.
#[derive(Debug)]
pub struct Reconciler<D, F, R>
where
    D: NowPlayingDisplay,
    F: FactDisplay,
    R: LoginRedirect,
{
    display: D,
    carousel: CarouselController<F>,
    redirect: R,
    last_snapshot: Option<Snapshot>,
    snapshots: u64,
    transport_errors: u64,
}

impl<D, F, R> Reconciler<D, F, R>
where
    D: NowPlayingDisplay,
    F: FactDisplay,
    R: LoginRedirect,
{
    pub fn new(display: D, carousel: CarouselController<F>, redirect: R) -> Self {
        Self {
            display,
            carousel,
            redirect,
            last_snapshot: None,
            snapshots: 0,
            transport_errors: 0,
        }
    }

    /// Apply one snapshot
    pub fn apply(&mut self, snapshot: Snapshot) {
        self.snapshots += 1;

        if snapshot.is_playing {
            if let Some(track) = &snapshot.track {
                tracing::info!("Currently playing: {}", track.name);
                self.display.set_song_title(&track.name);
                if let Some(url) = &track.album_art_url {
                    self.display.set_album_art(url);
                }
                self.display.set_artists(&track.artists_display());
            }
            if let Some(meaning) = &snapshot.meaning {
                self.display.set_meaning(meaning);
            }
        }

        self.carousel.update(snapshot.facts.clone());
        self.last_snapshot = Some(snapshot);
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn carousel(&self) -> &CarouselController<F> {
        &self.carousel
    }

    pub fn carousel_mut(&mut self) -> &mut CarouselController<F> {
        &mut self.carousel
    }

    pub fn redirect(&self) -> &R {
        &self.redirect
    }

    /// Most recent snapshot applied
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// Number of snapshots applied
    pub fn snapshot_count(&self) -> u64 {
        self.snapshots
    }

    /// Number of transport errors reported
    pub fn transport_error_count(&self) -> u64 {
        self.transport_errors
    }
}

impl<D, F, R> StreamHandler for Reconciler<D, F, R>
where
    D: NowPlayingDisplay,
    F: FactDisplay,
    R: LoginRedirect,
{
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        self.apply(snapshot);
    }

    fn on_unauthorized(&mut self) {
        tracing::warn!("X-Ray stream reported 401, redirecting to login");
        self.redirect.redirect_to_login();
    }

    fn on_transport_error(&mut self, error: &StreamError) {
        self.transport_errors += 1;
        tracing::warn!("Error from X-Ray stream: {}", error.payload);
    }
}

/// A subscription wired to a reconciler
#[derive(Debug)]
pub struct XraySession<D, F, R>
where
    D: NowPlayingDisplay,
    F: FactDisplay,
    R: LoginRedirect,
{
    subscription: Subscription,
    reconciler: Reconciler<D, F, R>,
}

impl<D, F, R> XraySession<D, F, R>
where
    D: NowPlayingDisplay,
    F: FactDisplay,
    R: LoginRedirect,
{
    pub fn new(subscription: Subscription, reconciler: Reconciler<D, F, R>) -> Self {
        Self {
            subscription,
            reconciler,
        }
    }

    /// Start a subscription from `config` and wire it to the given sinks
    ///
    /// `facts` is the carousel's slot and is configured from the
    /// `carousel` section.
    pub fn connect(config: &XrayConfig, display: D, facts: F, redirect: R) -> Result<Self> {
        let client = StreamClient::from_config(config)?;
        let carousel = CarouselController::from_config(facts, &config.carousel);

        Ok(Self::new(
            client.start(),
            Reconciler::new(display, carousel, redirect),
        ))
    }

    /// Process events and ticks until the stream closes
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                event = self.subscription.next_event() => match event {
                    Some(event) => event.dispatch(&mut self.reconciler),
                    None => break,
                },
                _ = self.reconciler.carousel.next_tick() => {}
            }
        }

        tracing::debug!(
            snapshots = self.reconciler.snapshot_count(),
            "X-Ray session finished"
        );
    }

    /// Tear down the subscription and the carousel; idempotent
    pub fn stop(&mut self) {
        self.subscription.stop();
        self.reconciler.carousel.dispose();
    }

    pub fn reconciler(&self) -> &Reconciler<D, F, R> {
        &self.reconciler
    }

    pub fn into_reconciler(mut self) -> Reconciler<D, F, R> {
        self.stop();
        let Self { reconciler, .. } = self;
        reconciler
    }
}
