use petalsonic_backend::{
    AudioBackendController, AudioSession, CpalLibrary, EffectsCapability, ErrorLog,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Example walking the backend lifecycle against the system's default device
fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    println!("Testing PetalSonic audio backend lifecycle");

    let mut section = HashMap::new();
    section.insert("gain".to_string(), "0.1".to_string());
    if let Some(device) = std::env::args().nth(1) {
        section.insert("device".to_string(), device);
    }

    // 440Hz test tone; the listener gain keeps it quiet
    let frequency = 440.0;
    let phase = Arc::new(Mutex::new(0.0f32));
    let mut library = CpalLibrary::with_host(cpal::default_host()).auxiliary_sends(4);
    library.set_fill_callback(move |buffer: &mut [f32], sample_rate: u32, channels: u16| {
        let mut phase = phase.lock().unwrap();
        let frame_count = buffer.len() / channels as usize;

        for frame in buffer.chunks_mut(channels as usize) {
            let sample = (*phase * 2.0 * std::f32::consts::PI).sin();
            frame.fill(sample);

            *phase += frequency / sample_rate as f32;
            if *phase >= 1.0 {
                *phase -= 1.0;
            }
        }

        frame_count
    });

    let host = ErrorLog::new();
    let controller = AudioBackendController::new(library);
    let mut session = AudioSession::new(&host, controller, &section);
    if !session.is_created() {
        anyhow::bail!("backend refused its configuration: {:?}", host.errors());
    }

    session.start("demo");

    let Some(state) = session.state().filter(|state| state.is_loaded()) else {
        anyhow::bail!("backend failed to load: {:?}", host.errors());
    };

    if let Some(device) = state.device() {
        println!("Device: {}", device.name());
    }

    match state.effects_capability() {
        EffectsCapability::ExtendedEffects => println!(
            "✓ Effects available with {} auxiliary sends",
            state.auxiliary_send_count()
        ),
        EffectsCapability::None => println!("✓ Loaded without effects"),
    }

    if let Some(context) = state.context() {
        println!(
            "Context: {}ch, {}Hz, {:?}",
            context.channels(),
            context.sample_rate(),
            context.sample_format()
        );
    }

    let listener = session.module().library().listener();
    println!(
        "Listener: gain {}, speed of sound {} m/s, {} m/unit",
        listener.gain, listener.speed_of_sound, listener.meters_per_unit
    );
    let (forward, up) = listener.orientation();
    println!("Listener orientation: forward {}, up {}", forward, up);

    for _ in 0..10 {
        session.tick();
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    println!(
        "Frames rendered: {} at output gain {}",
        session.module().library().frames_rendered(),
        session.module().library().output_gain()
    );

    session.stop();
    println!("✓ Test completed successfully");
    Ok(())
}
