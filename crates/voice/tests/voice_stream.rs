use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use presence_voice::{
    Framer, LevelMeter, LocalVoice, Pipeline, PushQueue, RawPcmDecoder, RawPcmEncoder,
    RemoteVoice, RemoteVoiceKey, VadConfig, VoiceActivityDetector, VoiceInfo,
};

const FRAME_SIZE: usize = 8;

fn wait_until(mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "timed out waiting for voice workers"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn capture_to_playback_over_a_lossy_hop() {
    // Capture side: frames land in an in-memory "wire".
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
    )
    .unwrap();

    // Three distinguishable frames, pushed in uneven chunks.
    let spoken: Vec<i16> = (0..3 * FRAME_SIZE as i16)
        .map(|i| (i / FRAME_SIZE as i16) + 1)
        .collect();
    local.push_audio(&spoken[..5]);
    local.push_audio(&spoken[5..20]);
    local.push_audio(&spoken[20..]);

    wait_until(|| {
        let counters = local.counters();
        counters.frames_sent == 3
    });
    local.dispose();

    // Playback side, with the middle frame lost in transit.
    let mut remote: RemoteVoice<i16> = RemoteVoice::new(
        RemoteVoiceKey {
            channel: 0,
            player: 42,
            voice: 1,
        },
        VoiceInfo::raw_pcm(8000, 1, FRAME_SIZE),
        RawPcmDecoder::new(FRAME_SIZE),
    )
    .unwrap();

    let heard: Arc<Mutex<Vec<Vec<i16>>>> = Arc::new(Mutex::new(Vec::new()));
    let rx = Arc::clone(&heard);
    remote.add_sink(move |samples: &[i16]| rx.lock().unwrap().push(samples.to_vec()));

    let mut sent: Vec<(Vec<u8>, u8)> = wire.lock().unwrap().drain(..).collect();
    assert_eq!(sent.len(), 3);
    sent.remove(1);
    for (payload, sequence) in &sent {
        remote.receive_frame(payload, *sequence);
    }

    wait_until(|| remote.decoded_frames() == 3);
    assert_eq!(remote.lost_frames(), 1);

    let frames = heard.lock().unwrap().clone();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], vec![1i16; FRAME_SIZE]);
    assert_eq!(frames[1], vec![0i16; FRAME_SIZE]); // concealed loss
    assert_eq!(frames[2], vec![3i16; FRAME_SIZE]);

    remote.dispose();
    remote.dispose(); // second teardown is a no-op

    remote.receive_frame(&sent[0].0, 10);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(heard.lock().unwrap().len(), 3);
}

#[test]
fn silence_is_suppressed_but_metering_still_sees_it() {
    let meter = LevelMeter::new();
    let readout = meter.readout();
    let vad = VoiceActivityDetector::new(VadConfig {
        enabled: true,
        threshold: 0.05,
        hangover_frames: 0,
    });

    let wire: Arc<Mutex<Vec<(Vec<u8>, u8)>>> = Arc::new(Mutex::new(Vec::new()));
    let tx = Arc::clone(&wire);
    let mut local: LocalVoice<f32> = LocalVoice::new(
        2,
        0,
        VoiceInfo::raw_pcm(8000, 1, FRAME_SIZE),
        Pipeline::with_builtins(vec![Box::new(meter), Box::new(vad)]),
        RawPcmEncoder,
        move |payload: &[u8], sequence: u8| {
            tx.lock().unwrap().push((payload.to_vec(), sequence));
        },
    )
    .unwrap();

    local.push_audio(&vec![0.5f32; FRAME_SIZE]);
    wait_until(|| local.counters().frames_sent == 1);

    local.push_audio(&vec![0.0f32; FRAME_SIZE]);
    wait_until(|| local.counters().frames_suppressed == 1);

    // The meter ran on the suppressed frame too.
    assert_eq!(readout.peak_amplitude(), 0.0);
    assert_eq!(wire.lock().unwrap().len(), 1);

    // Sequence numbers stay contiguous across the suppressed frame.
    local.push_audio(&vec![0.5f32; FRAME_SIZE]);
    wait_until(|| local.counters().frames_sent == 2);
    let sent = wire.lock().unwrap();
    assert_eq!(sent[0].1, 0);
    assert_eq!(sent[1].1, 1);

    drop(sent);
    local.dispose();
}

#[test]
fn overloaded_capture_drops_buffers_instead_of_blocking() {
    // A raw queue stands in for a worker that never drains.
    let queue: PushQueue<i16> = PushQueue::new(4);

    let pushed = 10;
    let mut accepted = 0;
    for _ in 0..pushed {
        if queue.push(vec![0; FRAME_SIZE]) {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 4);
    assert_eq!(queue.len(), 4);
    assert_eq!(queue.skipped(), (pushed - 4) as u64);
    queue.dispose();
}

#[test]
fn framer_feeds_exact_frames_regardless_of_chunking() {
    let mut framer = Framer::new(FRAME_SIZE);
    let mut total = 0usize;

    // Prime-sized chunks exercise every carry path.
    for chunk in [3usize, 7, 11, 13, 5, 9] {
        let input = vec![1i16; chunk];
        framer.frame(&input, |frame| {
            assert_eq!(frame.len(), FRAME_SIZE);
            total += frame.len();
        });
    }

    let pushed: usize = [3usize, 7, 11, 13, 5, 9].iter().sum();
    assert_eq!(total + framer.carried(), pushed);
}
