//! Signal chain configuration.
//!
//! Built in code with chained setters, or read from
//! `<config dir>/saavy_poly/config.json`. Missing fields fall back to their
//! defaults.
//!
//! ```ignore
//! let config = ChainConfig::new()
//!     .pool_size(20)
//!     .input_channel(Some(1))
//!     .steal_policy(StealPolicy::Oldest);
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    dsp::{envelope::EnvelopeParameters, oscillator::Waveform},
    error::{Result, SynthError},
    io::storage::APP_DIR,
    POOL_SIZE,
};

const CONFIG_FILE: &str = "config.json";

/// Which busy voice a note-on takes over when the pool is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StealPolicy {
    /// The most recently triggered voice.
    #[default]
    MostRecent,
    /// The least recently triggered voice.
    Oldest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub pool_size: usize,
    /// Only events on this channel (1..=16) are handled; `None` listens to all.
    pub input_channel: Option<u8>,
    pub initial_master_gain: f32,
    pub steal_policy: StealPolicy,
    pub handshake_timeout_ms: u64,
    pub handshake_poll_ms: u64,
    pub envelope: EnvelopeParameters,
    pub waveform: Waveform,
    /// Frames per block for the offline driver.
    pub block_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            pool_size: POOL_SIZE,
            input_channel: None,
            initial_master_gain: 0.2,
            steal_policy: StealPolicy::default(),
            handshake_timeout_ms: 5_000,
            handshake_poll_ms: 1,
            envelope: EnvelopeParameters::default(),
            waveform: Waveform::default(),
            block_size: 128,
        }
    }
}

impl ChainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn input_channel(mut self, channel: Option<u8>) -> Self {
        self.input_channel = channel;
        self
    }

    pub fn initial_master_gain(mut self, gain: f32) -> Self {
        self.initial_master_gain = gain;
        self
    }

    pub fn steal_policy(mut self, policy: StealPolicy) -> Self {
        self.steal_policy = policy;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn envelope(mut self, envelope: EnvelopeParameters) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn handshake_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn handshake_poll_interval(&self) -> Duration {
        Duration::from_millis(self.handshake_poll_ms.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(channel) = self.input_channel {
            if !(1..=16).contains(&channel) {
                return Err(SynthError::InvalidChannel(channel));
            }
        }
        Ok(())
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config from the platform config directory, or the defaults
    /// when there is no file.
    pub fn load_default() -> Result<Self> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        let path = dir.join(APP_DIR).join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        log::info!("loading config from {}", path.display());
        Self::load(&path)
    }
}
