//! Control-plane calls racing the render loop

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{constant, manual_engine, write_wav};

#[test]
fn test_volume_changes_during_render() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("hum.wav"), &constant(200_000, 0.5));

    let (engine, probe) = manual_engine();
    engine.load_sound_pack(dir.path()).unwrap();
    engine.configure(64, None).unwrap();
    engine.play("hum.wav", 0.0).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let engine = engine.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut i = t;
                while !done.load(Ordering::Relaxed) {
                    let value = (i % 23) as f32 / 11.0 - 0.5;
                    engine.set_volume(value);
                    let read = engine.volume();
                    assert!((0.0..=1.0).contains(&read));
                    i += 1;
                }
            })
        })
        .collect();

    for _ in 0..2000 {
        let block = probe.render_block().unwrap();
        // Volume is read once per block, so a constant input stays constant
        let first = block[0];
        assert!((0.0..=0.5 + 1e-6).contains(&first));
        assert!(block.iter().all(|s| *s == first));
    }

    done.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
    assert!((0.0..=1.0).contains(&engine.volume()));
}

#[test]
fn test_play_from_many_threads() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("tick.wav"), &constant(64, 0.01));

    let (engine, probe) = manual_engine();
    engine.load_sound_pack(dir.path()).unwrap();
    engine.configure(64, None).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let renderer = {
        let done = Arc::clone(&done);
        let probe = probe.clone();
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                probe.render_block();
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    let players: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(engine.play("tick.wav", 1.0).is_some());
                }
            })
        })
        .collect();
    for player in players {
        player.join().unwrap();
    }

    assert!(common::wait_for(Duration::from_secs(5), || {
        engine.active_voices() == 0
    }));
    done.store(true, Ordering::Relaxed);
    renderer.join().unwrap();
}

#[test]
fn test_pack_swap_keeps_playing_voices() {
    let first = tempfile::tempdir().unwrap();
    write_wav(&first.path().join("a.wav"), &constant(1000, 0.25));
    let second = tempfile::tempdir().unwrap();
    write_wav(&second.path().join("b.wav"), &constant(1000, 0.125));

    let (engine, probe) = manual_engine();
    engine.load_sound_pack(first.path()).unwrap();
    engine.configure(100, None).unwrap();
    engine.set_volume(1.0);
    engine.play("a.wav", 0.0).unwrap();
    probe.render_block().unwrap();

    engine.load_sound_pack(second.path()).unwrap();
    assert!(engine.library().get("a.wav").is_none());
    assert!(engine.play("a.wav", 0.0).is_none());

    // The voice started before the swap still plays its own sound to the end
    let mut blocks = 1;
    while engine.active_voices() > 0 {
        let block = probe.render_block().unwrap();
        assert!(block.iter().all(|s| (*s - 0.25).abs() < 1e-6));
        blocks += 1;
    }
    assert_eq!(blocks, 10);

    engine.play("b.wav", 0.0).unwrap();
    let block = probe.render_block().unwrap();
    assert!(block.iter().all(|s| (*s - 0.125).abs() < 1e-6));
}
