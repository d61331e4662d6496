use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use rtrb::{Producer, RingBuffer};

use crate::{
    dsp::oscillator::Waveform,
    error::{Result, SynthError},
    graph::{engine::AudioEngine, message::GraphCommand, voice::VoiceRenderer},
    worklet::ProcessorPort,
};

const GRAPH_QUEUE_SIZE: usize = 1024;

/// Something that pulls audio out of the engine and can be (re)started.
pub trait OutputStream {
    fn play(&self) -> Result<()>;
}

/// Frames rendered while running, as seconds.
#[derive(Debug)]
struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: f32,
}

impl AudioClock {
    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

/// Control-thread side of the signal graph.
///
/// Suspended on creation. While suspended the engine renders silence and the
/// clock stands still, but processor ports keep being serviced.
pub struct AudioContext {
    tx: Producer<GraphCommand>,
    clock: AudioClock,
    running: Arc<AtomicBool>,
    sample_rate: f32,
    voice_count: usize,
    waveform: Waveform,
    stream: Option<Box<dyn OutputStream>>,
}

impl AudioContext {
    /// Create a context and the engine it controls. `max_voices` only sizes
    /// the engine's voice list up front.
    pub fn new(sample_rate: f32, max_voices: usize) -> (Self, AudioEngine) {
        let (tx, rx) = RingBuffer::<GraphCommand>::new(GRAPH_QUEUE_SIZE);
        let frames = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(false));

        let engine = AudioEngine::new(rx, sample_rate, max_voices, frames.clone(), running.clone());
        let context = Self {
            tx,
            clock: AudioClock {
                frames,
                sample_rate,
            },
            running,
            sample_rate,
            voice_count: 0,
            waveform: Waveform::default(),
            stream: None,
        };
        (context, engine)
    }

    /// Hand over the stream driving the engine, so `resume` can start it.
    pub fn attach_stream(&mut self, stream: Box<dyn OutputStream>) {
        self.stream = Some(stream);
    }

    pub fn resume(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    pub fn suspend(&mut self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Add an unrouted voice with its own envelope processor.
    ///
    /// Returns the voice index and the processor's port. The voice stays
    /// silent until `GraphCommand::ConnectVoice` is sent.
    pub fn create_voice(&mut self) -> Result<(usize, ProcessorPort)> {
        let (port, renderer) = VoiceRenderer::new(self.sample_rate, self.waveform);
        self.send(GraphCommand::AddVoice(Box::new(renderer)))?;
        let index = self.voice_count;
        self.voice_count += 1;
        Ok((index, port))
    }

    pub fn send(&mut self, command: GraphCommand) -> Result<()> {
        let waveform = match &command {
            GraphCommand::SetWaveform(waveform) => Some(*waveform),
            _ => None,
        };
        let name = command.name();
        self.tx.push(command).map_err(|_| {
            log::warn!("graph queue full, dropped {name}");
            SynthError::QueueFull("graph")
        })?;
        if let Some(waveform) = waveform {
            self.waveform = waveform;
        }
        Ok(())
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }
}
