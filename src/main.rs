use std::time::Duration;

use terrarium::{ActorProfile, Presence, RawImage, RenderConfig, RenderHost, Rgb};

/// How long the demo run lasts.
const RUN_TIME: Duration = Duration::from_secs(12);
const OUTPUT_PATH: &str = "terrarium.gif";

fn main() {
    env_logger::init();
    log::info!("Terrarium starting up");

    if let Err(e) = run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading config from {path}");
            RenderConfig::from_toml_str(&std::fs::read_to_string(path)?)?
        }
        None => RenderConfig::default(),
    };

    let mut host = RenderHost::new(config)?;
    host.start()?;

    let commands = host.command_sender();
    commands.set_roster(vec![
        (1, Presence::Online),
        (2, Presence::Online),
        (3, Presence::Idle),
        (4, Presence::DoNotDisturb),
        (5, Presence::Offline),
    ]);

    // Synthetic chatter so the scene has something to show
    let mut rng = fastrand::Rng::new();
    let mut latest = None;
    let started = std::time::Instant::now();
    while started.elapsed() < RUN_TIME && host.is_running() {
        let actor = rng.u64(1..=5);
        match rng.u8(0..3) {
            0 if actor == 1 => commands.message_as(
                actor,
                "ribbit ribbit, anyone around?",
                ActorProfile {
                    avatar: Some(sparkle()),
                    color: Some(Rgb::new(60, 160, 90)),
                },
            ),
            0 => commands.message(actor, "ribbit ribbit, anyone around?"),
            1 => commands.typing(actor),
            _ => commands.reaction(actor, Some(sparkle())),
        };
        std::thread::sleep(Duration::from_millis(400));
        if let Some(output) = host.get_latest() {
            latest = Some(output);
        }
    }

    host.stop()?;
    let latest = latest.or_else(|| host.get_latest());
    match latest {
        Some(output) => {
            std::fs::write(OUTPUT_PATH, &output.blob)?;
            log::info!(
                "wrote {} ({} frames, {} bytes, cycle {})",
                OUTPUT_PATH,
                output.frames,
                output.blob.len(),
                output.cycle
            );
        }
        None => log::warn!("no animation completed before shutdown"),
    }
    Ok(())
}

/// Small yellow disc standing in for a reaction emoji or avatar.
fn sparkle() -> RawImage {
    const SIZE: u32 = 16;
    let mut rgba = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let dx = x as f32 - 7.5;
            let dy = y as f32 - 7.5;
            let alpha = if dx * dx + dy * dy <= 56.0 { 255 } else { 0 };
            rgba.extend_from_slice(&[255, 214, 64, alpha]);
        }
    }
    RawImage {
        width: SIZE,
        height: SIZE,
        rgba,
    }
}
