use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::{
    dsp::envelope::Envelope,
    error::{Result, SynthError},
    worklet::message::{EnvelopeState, Inbound, ParamName, PortMessage, ProcessorReply},
};

const PORT_QUEUE_SIZE: usize = 64;
const PENDING_PARAM_CAPACITY: usize = 32;

/// Construction options, mirroring the node layout the control layer asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorOptions {
    pub number_of_inputs: usize,
    pub number_of_outputs: usize,
    pub channel_count: usize,
    pub sample_rate: f32,
}

impl ProcessorOptions {
    pub fn envelope(sample_rate: f32) -> Self {
        Self {
            number_of_inputs: 0,
            number_of_outputs: 1,
            channel_count: 1,
            sample_rate,
        }
    }
}

/// Control-thread end of a processor's message port.
pub struct ProcessorPort {
    tx: Producer<Inbound>,
    rx: Consumer<ProcessorReply>,
    dropped: Arc<AtomicU64>,
}

impl ProcessorPort {
    pub fn post(&mut self, message: PortMessage) -> Result<()> {
        self.push(Inbound::Port(message))
    }

    pub fn set_param(&mut self, name: ParamName, value: f32, at: f64) -> Result<()> {
        self.push(Inbound::Param { name, value, at })
    }

    pub fn try_recv(&mut self) -> Option<ProcessorReply> {
        self.rx.pop().ok()
    }

    /// Replies the processor discarded because this port was not drained.
    pub fn dropped_replies(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The processor has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_abandoned()
    }

    fn push(&mut self, message: Inbound) -> Result<()> {
        if self.tx.is_abandoned() {
            return Err(SynthError::PortClosed);
        }
        self.tx
            .push(message)
            .map_err(|_| SynthError::QueueFull("processor port"))
    }
}

/// Audio-thread envelope processor.
///
/// Stays inert until it receives a non-empty payload; parameter events that
/// arrive before that are dropped.
pub struct EnvelopeProcessor {
    rx: Consumer<Inbound>,
    tx: Producer<ProcessorReply>,
    dropped: Arc<AtomicU64>,
    module: Option<Arc<[u8]>>,
    envelope: Envelope,
    pending: Vec<(ParamName, f32, f64)>,
}

impl EnvelopeProcessor {
    /// Create a processor together with the port used to drive it.
    pub fn new(options: ProcessorOptions) -> (ProcessorPort, Self) {
        let (to_processor, from_control) = RingBuffer::<Inbound>::new(PORT_QUEUE_SIZE);
        let (to_control, from_processor) = RingBuffer::<ProcessorReply>::new(PORT_QUEUE_SIZE);

        let dropped = Arc::new(AtomicU64::new(0));

        let port = ProcessorPort {
            tx: to_processor,
            rx: from_processor,
            dropped: dropped.clone(),
        };
        let processor = Self {
            rx: from_control,
            tx: to_control,
            dropped,
            module: None,
            envelope: Envelope::new(options.sample_rate),
            pending: Vec::with_capacity(PENDING_PARAM_CAPACITY),
        };
        (port, processor)
    }

    /// Drain the port and apply parameter events that are due at `now`.
    pub fn handle_messages(&mut self, now: f64) {
        while let Ok(message) = self.rx.pop() {
            match message {
                Inbound::Port(PortMessage::Wasm { wasm_module }) => {
                    let accepted = !wasm_module.is_empty();
                    if accepted {
                        self.module = Some(wasm_module);
                    }
                    self.reply(ProcessorReply::ModuleReady { value: accepted });
                }
                Inbound::Port(PortMessage::GetState) => {
                    self.reply(ProcessorReply::State { state: self.state() });
                }
                Inbound::Param { .. } if self.module.is_none() => {}
                Inbound::Param { name, value, at } => {
                    if at <= now {
                        self.apply(name, value);
                    } else if self.pending.len() < PENDING_PARAM_CAPACITY {
                        self.pending.push((name, value, at));
                    }
                }
            }
        }

        // Scheduled events, earliest first
        while let Some(index) = self.earliest_due(now) {
            let (name, value, _) = self.pending.remove(index);
            self.apply(name, value);
        }
    }

    /// Render envelope output into `out`.
    pub fn process(&mut self, out: &mut [f32]) {
        if self.module.is_none() {
            out.fill(0.0);
            return;
        }
        self.envelope.render(out);
    }

    pub fn is_ready(&self) -> bool {
        self.module.is_some()
    }

    pub fn state(&self) -> EnvelopeState {
        EnvelopeState {
            stage: self.envelope.stage(),
            stage_progress: self.envelope.stage_progress(),
            output_value: self.envelope.level(),
            parameters: self.envelope.parameters(),
        }
    }

    fn apply(&mut self, name: ParamName, value: f32) {
        match name {
            // Every write is an edge: non-zero (re)starts, zero releases
            ParamName::Trigger if value > 0.0 => self.envelope.note_on(),
            ParamName::Trigger => self.envelope.note_off(),
            _ => {
                let mut params = self.envelope.parameters();
                params.set(name, value);
                self.envelope.set_parameters(params);
            }
        }
    }

    fn reply(&mut self, reply: ProcessorReply) {
        if self.tx.push(reply).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn earliest_due(&self, now: f64) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .filter(|(_, (_, _, at))| *at <= now)
            .min_by(|(_, a), (_, b)| a.2.total_cmp(&b.2))
            .map(|(index, _)| index)
    }
}
