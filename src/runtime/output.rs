use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    error::{Result, SynthError},
    graph::{AudioContext, AudioEngine, OutputStream},
    runtime::offline::OfflineDriver,
    MAX_BLOCK_SIZE,
};

/// Sample rate used when no output device is available.
pub const FALLBACK_SAMPLE_RATE: f32 = 48_000.0;

/// Open the default output device, or render headless on an
/// [`OfflineDriver`] of `block_size` frames when there is none.
pub fn open_output(max_voices: usize, block_size: usize) -> AudioContext {
    or_offline(CpalOutput::open(max_voices), max_voices, block_size)
}

fn or_offline(opened: Result<AudioContext>, max_voices: usize, block_size: usize) -> AudioContext {
    match opened {
        Ok(context) => context,
        Err(err) => {
            log::warn!("no audio output ({err}), rendering without a device");
            let (mut context, engine) = AudioContext::new(FALLBACK_SAMPLE_RATE, max_voices);
            context.attach_stream(Box::new(OfflineDriver::spawn(engine, block_size)));
            context
        }
    }
}

/// Default output device driving an engine from the cpal callback.
pub struct CpalOutput {
    stream: cpal::Stream,
}

impl CpalOutput {
    /// Open the default output device and return a context wired to it.
    ///
    /// The stream starts right away so envelope handshakes can run; the
    /// context is still suspended and renders silence until resumed.
    pub fn open(max_voices: usize) -> Result<AudioContext> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SynthError::AudioDevice("no default output device available".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| SynthError::AudioDevice(format!("failed to fetch default output config: {e}")))?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        log::info!(
            "output: {} at {sample_rate} Hz, {channels} channels",
            device.name().unwrap_or_else(|_| "unknown device".into())
        );

        let (mut context, engine) = AudioContext::new(sample_rate, max_voices);
        let stream = build_stream(&device, &config.into(), channels, engine)?;
        let output = Self { stream };
        output.play()?;
        context.attach_stream(Box::new(output));
        Ok(context)
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut engine: AudioEngine,
) -> Result<cpal::Stream> {
    let mut block = vec![0.0f32; MAX_BLOCK_SIZE];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _| {
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let rendered = &mut block[..frames];
                    engine.render_block(rendered);

                    // Mono to all channels
                    let out_off = frames_written * channels;
                    for (i, &s) in rendered.iter().enumerate() {
                        let frame = out_off + i * channels;
                        data[frame..frame + channels].fill(s);
                    }
                    frames_written += frames;
                }
            },
            |err| log::error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| SynthError::AudioDevice(e.to_string()))
}

impl OutputStream for CpalOutput {
    fn play(&self) -> Result<()> {
        self.stream.play().map_err(|e| SynthError::Resume(e.to_string()))
    }
}
