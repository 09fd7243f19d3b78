/*
 *  tests/spectrum_properties.rs
 *
 *  End to end behaviour of the spectrum engine through its public API
 *
 *  snapviz - spectrum and metadata for the snapcast squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use rand::Rng;

use snapviz::bands::{BandMode, BandTable};
use snapviz::config::SpectrumConfig;
use snapviz::frame;
use snapviz::spectrum::SpectrumEngine;

const FLOOR: f32 = -72.0;

fn sine(freq: f32, amp: f32, len: usize, sr: u32, phase0: usize) -> Vec<f32> {
    (phase0..phase0 + len)
        .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
        .collect()
}

/// Feed `ticks` consecutive hops of a continuous sine, return the last frame.
fn run_tone(eng: &mut SpectrumEngine, freq: f32, amp: f32, ticks: usize) -> String {
    let sr = eng.settings().sample_rate;
    let hop = eng.settings().hop_size();
    let mut out = String::new();
    for t in 0..ticks {
        out = eng.process_chunk(&sine(freq, amp, hop, sr, t * hop));
    }
    out
}

fn levels(frame_text: &str) -> Vec<f32> {
    frame::decode(frame_text, FLOOR)
}

fn argmax(v: &[f32]) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
        .0
}

fn engine() -> SpectrumEngine {
    SpectrumEngine::new(&SpectrumConfig::default()).unwrap()
}

#[test]
fn silence_is_floor() {
    let mut eng = engine();
    let out = eng.process_chunk(&vec![0.0; 1470]);
    assert!(levels(&out).iter().all(|&v| v == FLOOR));
}

#[test]
fn scenario_zero_chunk_exact_frame() {
    let mut eng = engine();
    let n = eng.band_count();
    assert_eq!(n, 21);
    let out = eng.process_chunk(&vec![0.0; 1470]);
    assert_eq!(out, vec!["-72.0"; n].join(";"));
}

#[test]
fn band_count_holds_for_many_configs() {
    let mut third = SpectrumConfig::default();
    third.band_mode = BandMode::ThirdOctave;
    let mut hi_res = SpectrumConfig::default();
    hi_res.sample_rate = 48_000;
    hi_res.fft_size = 4096;
    let mut explicit = SpectrumConfig::default();
    explicit.band_centers = Some(vec![63.0, 160.0, 400.0, 1000.0, 2500.0, 6300.0, 16_000.0]);
    let mut mono = SpectrumConfig::default();
    mono.channels = 1;
    mono.fft_size = 1024;
    mono.hop_size = Some(512);

    for cfg in [SpectrumConfig::default(), third, hi_res, explicit, mono] {
        let mut eng = SpectrumEngine::new(&cfg).unwrap();
        let n = eng.band_count();
        for len in [1usize, 3, 100, cfg.fft_size - 1, cfg.fft_size, cfg.fft_size + 1, 3 * cfg.fft_size] {
            let out = eng.process_chunk(&sine(523.0, 12_000.0, len, cfg.sample_rate, 0));
            assert_eq!(out.split(';').count(), n, "{len} samples, {n} bands");
            assert!(!out.ends_with(';'));
        }
    }
}

#[test]
fn louder_tone_reads_higher() {
    let mut soft = engine();
    let mut loud = engine();
    let a = levels(&run_tone(&mut soft, 1000.0, 2000.0, 12));
    let b = levels(&run_tone(&mut loud, 1000.0, 16_000.0, 12));
    let peak_a = a.iter().copied().fold(FLOOR, f32::max);
    let peak_b = b.iter().copied().fold(FLOOR, f32::max);
    assert!(peak_b > peak_a, "{peak_b} vs {peak_a}");
}

#[test]
fn tone_lands_in_its_band() {
    for freq in [100.0f32, 440.0, 1000.0, 3000.0, 8000.0, 15_000.0] {
        let mut eng = engine();
        let lv = levels(&run_tone(&mut eng, freq, 16_000.0, 12));
        let expected = eng.table().closest_to(freq).unwrap();
        let got = argmax(&lv);
        assert!(
            got.abs_diff(expected) <= 2,
            "{freq} Hz peaked in band {got}, expected near {expected}"
        );
    }
}

#[test]
fn nothing_below_floor() {
    let mut rng = rand::rng();
    let mut eng = engine();
    for _ in 0..40 {
        let amp: f32 = [0.0, 0.5, 1.5, 50.0, 3000.0, 32_767.0][rng.random_range(0..6)];
        let freq: f32 = rng.random_range(30.0..18_000.0);
        let out = eng.process_chunk(&sine(freq, amp, 1470, 44_100, 0));
        assert!(levels(&out).iter().all(|&v| v >= FLOOR), "{out}");
    }
}

#[test]
fn off_grid_floor_never_undercut() {
    let s = SpectrumConfig { noise_floor: -72.06, ..SpectrumConfig::default() };
    let mut eng = SpectrumEngine::new(&s).unwrap();
    let parsed = |text: &str| -> Vec<f32> { text.split(';').map(|f| f.parse::<f32>().unwrap()).collect() };

    let out = eng.process_chunk(&vec![0.0; 1470]);
    assert!(parsed(&out).iter().all(|&v| v >= s.noise_floor), "{out}");
    assert!(parsed(&eng.silence_frame()).iter().all(|&v| v >= s.noise_floor));

    for amp in [2.0, 40.0, 32_767.0] {
        let out = eng.process_chunk(&sine(440.0, amp, 1470, 44_100, 0));
        assert!(parsed(&out).iter().all(|&v| v >= s.noise_floor), "{out}");
    }
}

#[test]
fn rises_faster_than_it_falls() {
    let mut eng = engine();
    let band = eng.table().closest_to(1000.0).unwrap();
    let level = |out: &str| levels(out)[band];

    // settle on the quiet tone
    let quiet = level(&run_tone(&mut eng, 1000.0, 1600.0, 30));
    // how loud is loud once settled
    let mut probe = engine();
    let loud = level(&run_tone(&mut probe, 1000.0, 16_000.0, 30));
    assert!(loud - quiet > 15.0);

    let hop = eng.settings().hop_size();
    let mut t = 30;
    let mut up = 0;
    while level(&eng.process_chunk(&sine(1000.0, 16_000.0, hop, 44_100, t * hop))) < quiet + 0.9 * (loud - quiet) {
        up += 1;
        t += 1;
        assert!(up < 100);
    }
    for _ in 0..30 {
        eng.process_chunk(&sine(1000.0, 16_000.0, hop, 44_100, t * hop));
        t += 1;
    }
    let mut down = 0;
    while level(&eng.process_chunk(&sine(1000.0, 1600.0, hop, 44_100, t * hop))) > loud - 0.9 * (loud - quiet) {
        down += 1;
        t += 1;
        assert!(down < 100);
    }
    assert!(up < down, "attack {up} ticks, decay {down} ticks");
}

#[test]
fn dc_offset_rejected() {
    let mut rng = rand::rng();
    let mut eng = engine();
    let mut out = String::new();
    for _ in 0..10 {
        let chunk: Vec<f32> = (0..1470).map(|_| 10_000.0 + rng.random_range(-2.0f32..2.0)).collect();
        out = eng.process_chunk(&chunk);
    }
    let lowest = levels(&out)[0];
    assert!(lowest < FLOOR + 20.0, "lowest band {lowest}");
}

#[test]
fn scenario_1khz_near_full_scale() {
    let mut eng = engine();
    let lv = levels(&run_tone(&mut eng, 1000.0, 30_000.0, 15));
    let expected = eng.table().closest_to(1000.0).unwrap();
    let peak = argmax(&lv);
    assert!(peak.abs_diff(expected) <= 2);
    assert!(lv[peak] > -15.0, "peak {}", lv[peak]);
}

#[test]
fn scenario_table_bounds_48k_4096() {
    let table = BandTable::build(48_000, 4096, BandMode::HalfOctave.centers(), BandMode::HalfOctave.edge_ratio());
    assert_eq!(table.len(), 21);
    for b in table.iter() {
        assert!(b.lo < b.hi && b.hi <= 4096 / 2 + 1, "{b:?}");
    }
}

#[test]
fn reconfigured_engine_keeps_invariants() {
    let eng = engine();
    let mut next = eng.reconfigure(19).unwrap();
    assert_eq!(next.band_count(), 19);
    let lv = levels(&run_tone(&mut next, 2000.0, 16_000.0, 12));
    assert_eq!(lv.len(), 19);
    let expected = next.table().closest_to(2000.0).unwrap();
    assert!(argmax(&lv).abs_diff(expected) <= 2);
}
