//! saavy-poly - play the polyphonic synth from a MIDI keyboard
//!
//! Run with: cargo run --bin saavy-poly [-- --list | -- <midi input id>]
//!
//! Without an id the last used input is picked, or the first one available.
//! Missing audio or MIDI hardware is logged and the synth keeps running.

use std::{env, time::Duration};

use color_eyre::eyre::{Result, WrapErr};
use crossbeam_channel::{select, tick, unbounded};

use saavy_poly::{
    decode,
    io::{
        converter::key_number_to_note_name,
        input::{choose_device, MidiInputs},
        storage::DeviceStore,
    },
    runtime::open_output,
    worklet::StaticModuleSource,
    ChainConfig, SignalChain,
};

/// How often release clears and envelope replies are serviced.
const TICK_INTERVAL: Duration = Duration::from_millis(5);

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let devices = MidiInputs::list();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--list") {
        for device in &devices {
            println!("{}\t{}", device.id, device.name);
        }
        return Ok(());
    }

    let config = ChainConfig::load_default().wrap_err("failed to load config")?;
    let context = open_output(config.pool_size, config.block_size);
    let mut chain = SignalChain::new(context, config.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .wrap_err("failed to build async runtime")?;
    if let Err(err) = runtime.block_on(chain.initialize(&StaticModuleSource::builtin())) {
        // Keep running with an empty pool; notes are ignored
        log::error!("signal chain failed to initialize: {err}");
    }
    if let Err(err) = chain.set_master_gain(config.initial_master_gain) {
        log::warn!("initial master gain not applied: {err}");
    }

    let store = match DeviceStore::default_location() {
        Ok(store) => Some(store),
        Err(err) => {
            log::warn!("device selection will not be remembered: {err}");
            None
        }
    };
    let remembered = args
        .first()
        .cloned()
        .or_else(|| store.as_ref().and_then(DeviceStore::selected_input));

    // `tx` outlives the loop so the channel stays open without an input
    let (tx, rx) = unbounded();
    let mut inputs = MidiInputs::new();
    let input_name = match choose_device(&devices, remembered.as_deref()) {
        Some(device) => match inputs.select(&device.id, tx.clone()) {
            Ok(device) => {
                if let Some(store) = &store {
                    if let Err(err) = store.set_selected_input(&device.id) {
                        log::warn!("could not remember MIDI input: {err}");
                    }
                }
                device.name
            }
            Err(err) => {
                log::error!("could not open MIDI input {}: {err}", device.id);
                "none".to_string()
            }
        },
        None => {
            log::warn!("no MIDI devices");
            "none".to_string()
        }
    };

    println!("=== saavy-poly ===");
    println!("Input: {input_name}");
    println!("Voices: {}", chain.pool().len());
    println!("Press Ctrl+C to stop");

    let ticker = tick(TICK_INTERVAL);
    loop {
        select! {
            recv(rx) -> bytes => {
                let Ok(bytes) = bytes else { break };
                let event = decode(&bytes);
                let delta = chain.handle_midi_event(&event);
                if let (true, Some(voices)) = (event.is_note(), &delta.voices) {
                    let held: Vec<String> = voices
                        .iter()
                        .filter(|v| v.is_busy && !v.is_releasing)
                        .filter_map(|v| v.note.map(key_number_to_note_name))
                        .collect();
                    log::debug!("held: [{}]", held.join(" "));
                }
                if let Some(gain) = delta.master_gain {
                    log::info!("master gain {gain:.2}");
                }
            }
            recv(ticker) -> _ => {
                chain.tick();
            }
        }
    }

    drop(tx);
    inputs.disconnect();
    Ok(())
}
