use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use glam::{Quat, Vec3};

use presence_sync::{
    apply_update, EntityRef, Interpolator, InterpolatorConfig, LinkConditions, LinkSimulator,
    PublisherConfig, Snapshot, SnapshotPublisher, SyncedFields,
};
use presence_voice::{
    LocalVoice, Pipeline, RawPcmDecoder, RawPcmEncoder, RemoteVoice, RemoteVoiceKey, VoiceInfo,
};

#[derive(Parser)]
#[command(name = "demo")]
#[command(about = "Replication and voice loopback over a simulated lossy link")]
struct Args {
    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value_t = 5.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 20, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 60, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 15, help = "Jitter in ms")]
    jitter: u32,

    #[arg(short, long, default_value_t = 5, help = "Run duration in seconds")]
    duration: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let conditions = LinkConditions {
        enabled: true,
        loss_percent: args.loss_percent,
        min_latency_ms: args.min_latency,
        max_latency_ms: args.max_latency,
        jitter_ms: args.jitter,
    };
    log::info!(
        "link: {:.0}% loss, {}-{} ms latency, {} ms jitter",
        conditions.loss_percent,
        conditions.min_latency_ms,
        conditions.max_latency_ms,
        conditions.jitter_ms
    );

    run_replication(&args, conditions)?;
    run_voice_loopback(&args)?;
    Ok(())
}

/// An object circling the origin, replicated through the lossy link and
/// played back by an interpolator on the "remote" side.
fn run_replication(args: &Args, conditions: LinkConditions) -> Result<()> {
    let mut publisher = SnapshotPublisher::new(PublisherConfig {
        fields: SyncedFields::POSITION | SyncedFields::ROTATION,
        ..PublisherConfig::default()
    });
    let mut link = LinkSimulator::new(conditions);
    let mut interpolator = Interpolator::new(InterpolatorConfig {
        sync_parent: false,
        ..InterpolatorConfig::default()
    });

    let no_hierarchy = |_: &EntityRef| None::<u32>;
    let tick = Duration::from_secs_f64(1.0 / args.tick_rate as f64);
    let ticks = args.duration * args.tick_rate as u64;
    // What a real client would feed us: a smoothed round-trip estimate.
    let ping_ms = (args.min_latency + args.max_latency) as f64;

    let mut applied_ticks = 0u64;
    let mut extrapolated_ticks = 0u64;

    for i in 0..ticks {
        let now_ms = i as f64 * tick.as_secs_f64() * 1000.0;

        let angle = (now_ms / 1000.0) as f32;
        let mut snapshot = Snapshot::at(now_ms);
        snapshot.position = Vec3::new(angle.cos() * 3.0, 1.5, angle.sin() * 3.0);
        snapshot.rotation = Quat::from_rotation_y(angle);
        publisher.publish(&snapshot, &mut link)?;

        for (_, payload) in link.poll() {
            if let Err(err) = apply_update(&mut interpolator, &payload) {
                log::warn!("bad payload: {err}");
            }
        }

        if let Some(applied) = interpolator.tick(now_ms, ping_ms, &no_hierarchy) {
            applied_ticks += 1;
            if applied.extrapolated {
                extrapolated_ticks += 1;
            }
            if i % args.tick_rate as u64 == 0 {
                let position = applied.position.unwrap_or(Vec3::ZERO);
                log::info!(
                    "t={:>5.1}s playback at ({:+.2}, {:.2}, {:+.2}){}",
                    now_ms / 1000.0,
                    position.x,
                    position.y,
                    position.z,
                    if applied.extrapolated { " [held]" } else { "" }
                );
            }
        }

        thread::sleep(tick);
    }

    log::info!(
        "replication done: {} sent, {} dropped by link, {} ticks applied ({} held)",
        publisher.sent(),
        link.dropped(),
        applied_ticks,
        extrapolated_ticks
    );
    Ok(())
}

/// A synthetic tone pushed through the full voice pipeline and back out of
/// a remote voice, with one frame dropped on purpose.
fn run_voice_loopback(args: &Args) -> Result<()> {
    const FRAME_SIZE: usize = 160; // 20 ms at 8 kHz

    let wire: Arc<Mutex<VecDeque<(Vec<u8>, u8)>>> = Arc::new(Mutex::new(VecDeque::new()));
    let tx = Arc::clone(&wire);
    let mut local = LocalVoice::new(
        1,
        0,
        VoiceInfo::raw_pcm(8000, 1, FRAME_SIZE),
        Pipeline::new(),
        RawPcmEncoder,
        move |payload: &[u8], sequence: u8| {
            tx.lock().unwrap().push_back((payload.to_vec(), sequence));
        },
    )?;

    let mut remote: RemoteVoice<i16> = RemoteVoice::new(
        RemoteVoiceKey {
            channel: 0,
            player: 2,
            voice: 1,
        },
        VoiceInfo::raw_pcm(8000, 1, FRAME_SIZE),
        RawPcmDecoder::new(FRAME_SIZE),
    )?;
    remote.add_sink(|samples: &[i16]| {
        log::debug!("played back {} samples", samples.len());
    });

    let frames = args.duration.min(2) * 50; // 20 ms frames
    let mut phase = 0f32;
    for _ in 0..frames {
        let buffer: Vec<i16> = (0..FRAME_SIZE)
            .map(|_| {
                phase += 440.0 / 8000.0 * std::f32::consts::TAU;
                (phase.sin() * 8000.0) as i16
            })
            .collect();
        local.push_audio(&buffer);
        thread::sleep(Duration::from_millis(2));

        let mut sent = wire.lock().unwrap();
        while let Some((payload, sequence)) = sent.pop_front() {
            // Every 16th frame goes missing in "transit".
            if sequence % 16 == 3 {
                continue;
            }
            remote.receive_frame(&payload, sequence);
        }
    }

    thread::sleep(Duration::from_millis(50));
    let counters = local.counters();
    log::info!(
        "voice done: {} frames sent, {} lost in transit, {} decoded (gaps concealed)",
        counters.frames_sent,
        remote.lost_frames(),
        remote.decoded_frames()
    );

    local.dispose();
    remote.dispose();
    Ok(())
}
