//! Audio player abstraction
//!
//! A player owns one stream on the output device for its whole life:
//! bind a stream, start it, and either let it finish or cancel it.
//! Players are never reused across requests.

use crate::speech::AudioStream;
use crate::Result;
use std::thread;
use std::time::Duration;

/// One-shot audio output
pub trait AudioPlayer: Send {
    /// Attach the audio to play; must be called before [`AudioPlayer::start`]
    fn bind(&mut self, stream: AudioStream) -> Result<()>;

    /// Begin asynchronous playback and return immediately
    fn start(&mut self) -> Result<()>;

    /// Best-effort immediate stop
    ///
    /// May report [`crate::SaydError::Interrupted`] when a blocking device
    /// call was cut short; callers treat that as success.
    fn cancel(&mut self) -> Result<()>;

    /// Whether playback has ended (naturally or by cancellation)
    fn is_finished(&mut self) -> bool;

    /// Block until the device has released the stream, at most `timeout`
    ///
    /// Returns true if release was acknowledged. Players that cannot
    /// observe release just wait out the full interval.
    fn wait_stopped(&mut self, timeout: Duration) -> bool {
        thread::sleep(timeout);
        false
    }
}

/// Builds a fresh player for each speech request
pub trait PlayerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioPlayer>>;
}

impl<F> PlayerFactory for F
where
    F: Fn() -> Result<Box<dyn AudioPlayer>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn AudioPlayer>> {
        self()
    }
}
