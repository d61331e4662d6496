use std::{cell::Cell, rc::Rc, sync::Arc, time::Duration};

use crate::{
    error::{Result, SynthError},
    worklet::{EnvelopeParameters, EnvelopeState, ParamName, PortMessage, ProcessorPort, ProcessorReply},
};

/// Envelope shape shared by every unit of a chain. Units read it, only the
/// chain writes it.
pub type SharedParameters = Rc<Cell<EnvelopeParameters>>;

/// Single-slot state subscriber; registering a new one replaces the old one.
pub type StateCallback = Box<dyn FnMut(EnvelopeState)>;

/// Parameter changes are applied as soon as the processor sees them.
const IMMEDIATE: f64 = 0.0;

/// Control-side driver for one voice's envelope processor.
pub struct EnvelopeUnit {
    voice: usize,
    port: ProcessorPort,
    parameters: SharedParameters,
    callback: Option<StateCallback>,
    ready: bool,
    reported_drops: u64,
}

impl EnvelopeUnit {
    pub fn new(voice: usize, port: ProcessorPort, parameters: SharedParameters) -> Self {
        Self {
            voice,
            port,
            parameters,
            callback: None,
            ready: false,
            reported_drops: 0,
        }
    }

    /// Hand the payload to the processor and wait for its `module-ready`.
    ///
    /// On success the current shared parameters are pushed so the processor
    /// starts from the chain's shape rather than its own defaults.
    pub async fn initialize(&mut self, payload: Arc<[u8]>, timeout: Duration, poll: Duration) -> Result<()> {
        self.port.post(PortMessage::Wasm { wasm_module: payload })?;

        let outcome = tokio::time::timeout(timeout, self.module_ready(poll)).await;
        match outcome {
            Ok(result) => result?,
            Err(_) => {
                self.report_drops();
                return Err(SynthError::HandshakeTimeout {
                    voice: self.voice,
                    timeout,
                })
            }
        }
        self.ready = true;

        let params = self.parameters.get();
        for name in ParamName::ENVELOPE {
            if let Some(value) = params.get(name) {
                self.set_parameter(name, value)?;
            }
        }
        log::trace!("voice {}: envelope processor ready", self.voice);
        Ok(())
    }

    async fn module_ready(&mut self, poll: Duration) -> Result<()> {
        loop {
            while let Some(reply) = self.port.try_recv() {
                match reply {
                    ProcessorReply::ModuleReady { value: true } => return Ok(()),
                    ProcessorReply::ModuleReady { value: false } => {
                        return Err(SynthError::HandshakeRejected { voice: self.voice })
                    }
                    ProcessorReply::State { state } => self.deliver(state),
                }
            }
            if self.port.is_closed() {
                return Err(SynthError::PortClosed);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn set_parameter(&mut self, name: ParamName, value: f32) -> Result<()> {
        self.port.set_param(name, value, IMMEDIATE)
    }

    /// Restart the attack stage.
    pub fn trigger(&mut self) -> Result<()> {
        self.set_parameter(ParamName::Trigger, 1.0)
    }

    /// Enter the release stage from wherever the envelope is.
    pub fn release(&mut self) -> Result<()> {
        self.set_parameter(ParamName::Trigger, 0.0)
    }

    /// Ask for a state snapshot. The reply is handed to the callback by a
    /// later `poll`.
    pub fn request_state(&mut self) -> Result<()> {
        self.port.post(PortMessage::GetState)
    }

    pub fn set_state_callback(&mut self, callback: impl FnMut(EnvelopeState) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_state_callback(&mut self) {
        self.callback = None;
    }

    /// Deliver pending replies. Returns the number of state snapshots seen.
    pub fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(reply) = self.port.try_recv() {
            match reply {
                ProcessorReply::State { state } => {
                    self.deliver(state);
                    delivered += 1;
                }
                ProcessorReply::ModuleReady { value } => {
                    log::debug!("voice {}: late module-ready ({value})", self.voice);
                }
            }
        }
        self.report_drops();
        delivered
    }

    /// Replies lost to a full reply queue since the unit was created.
    pub fn dropped_replies(&self) -> u64 {
        self.port.dropped_replies()
    }

    fn report_drops(&mut self) {
        let dropped = self.port.dropped_replies();
        if dropped > self.reported_drops {
            log::warn!(
                "voice {}: {} processor replies lost to a full queue",
                self.voice,
                dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
    }

    fn deliver(&mut self, state: EnvelopeState) {
        if let Some(callback) = self.callback.as_mut() {
            callback(state);
        }
    }

    pub fn parameters(&self) -> EnvelopeParameters {
        self.parameters.get()
    }

    pub fn release_time(&self) -> f32 {
        self.parameters.get().release_time
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}
