//! # cl-player
//!
//! Plays an ordered list of media segments as one continuous timeline.
//!
//! - [`Player`] is the entry point: construct it over segments and a
//!   [`DecoderFactory`], then `play`, `pause` and `seek` in global time.
//! - At most one [`Decoder`] is attached at any moment. Seeking across a
//!   segment boundary releases it and loads the target; natural end
//!   advances to the next segment.
//! - Observers read the [`TransportHandle`]: a snapshot plus an ordered
//!   stream of [`cl_core::events::TransportEvent`]s.
//! - [`ClockDecoderFactory`] provides a headless decoder that walks each
//!   segment on the tokio clock.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cl_core::config::Config;
//! use cl_core::{PlaybackStatus, Segment};
//! use cl_player::{ClockDecoderFactory, Player};
//!
//! # async fn run() -> cl_core::Result<()> {
//! let config = Config::default();
//! let factory = Arc::new(ClockDecoderFactory::new(&config.clock));
//! let player = Player::new(
//!     vec![
//!         Segment::new("a", "a.webm").with_declared_duration(10.0),
//!         Segment::new("b", "b.webm").with_declared_duration(12.0),
//!     ],
//!     factory,
//!     &config.player,
//! )?;
//!
//! player.seek(11.0)?;
//! player.play()?;
//! let t = player.transport().wait_for_status(PlaybackStatus::Ended).await;
//! assert_eq!(t.global_time, t.total_duration);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod decoder;
pub mod engine;
pub mod player;
pub mod transport;

pub use clock::{ClockDecoder, ClockDecoderFactory};
pub use decoder::{
    Decoder, DecoderEvent, DecoderEventKind, DecoderEvents, DecoderFactory, LoadRequest,
};
pub use engine::PlaybackEngine;
pub use player::Player;
pub use transport::TransportHandle;
