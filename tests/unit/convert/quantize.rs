use std::collections::HashSet;

use super::*;

fn noise(seed: u32) -> Frame {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut buf = Vec::with_capacity(64 * 64 * 3);
    for _ in 0..64 * 64 * 3 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        buf.push((state >> 24) as u8);
    }
    Frame::from_rgb8(buf).unwrap()
}

fn near_black(i: u8) -> Frame {
    let mut buf = Vec::with_capacity(64 * 64 * 3);
    for p in 0..64 * 64u32 {
        let v = ((p % 7) as u8) + i;
        buf.extend_from_slice(&[v, v / 2, v % 3]);
    }
    Frame::from_rgb8(buf).unwrap()
}

#[test]
fn sampling_takes_every_fourth_frame() {
    let cfg = QuantizeConfig::default();
    let q = TemporalPaletteQuantizer::new(&cfg);
    assert_eq!(q.sample_indices(10), vec![0, 4, 8]);
    assert_eq!(q.sample_indices(4), vec![0, 1, 2, 3]);
    assert_eq!(q.sample_indices(1), vec![0]);
    assert_eq!(q.sample_indices(5), vec![0, 4]);
}

#[test]
fn near_black_animation_shares_one_palette() {
    let cfg = QuantizeConfig::default();
    let frames: Vec<Frame> = (0..10u8).map(near_black).collect();
    let seq = FrameSequence::new(frames, 100).unwrap();
    let out = TemporalPaletteQuantizer::new(&cfg).quantize(&seq).unwrap();

    assert_eq!(out.sampled, vec![0, 4, 8]);
    assert_eq!(out.sequence.len(), 10);
    assert!(out.sequence.distinct_colors() <= 256);
    let palette: HashSet<[u8; 3]> = out.palette.colors().iter().copied().collect();
    for frame in out.sequence.frames() {
        assert!(frame.pixels().all(|p| palette.contains(&p)));
    }
}

#[test]
fn few_colors_are_kept_exactly() {
    let cfg = QuantizeConfig::default();
    let seq = FrameSequence::new(vec![Frame::solid([10, 20, 30])], 1000).unwrap();
    let out = TemporalPaletteQuantizer::new(&cfg).quantize(&seq).unwrap();
    assert_eq!(out.palette.colors(), &[[10, 20, 30]]);
    assert_eq!(out.sequence, seq);
}

#[test]
fn busy_frames_are_capped_at_max_colors() {
    let cfg = QuantizeConfig::default();
    let seq = FrameSequence::new((0..6).map(noise).collect(), 100).unwrap();
    assert!(seq.distinct_colors() > 256);

    let out = TemporalPaletteQuantizer::new(&cfg).quantize(&seq).unwrap();
    assert!(out.palette.len() <= 256);
    assert!(out.palette.len() > 200, "{}", out.palette.len());
    assert!(out.sequence.distinct_colors() <= 256);
}

#[test]
fn smaller_palettes_and_pixel_caps_are_honored() {
    let cfg = QuantizeConfig {
        max_colors: 16,
        sample_stride: 4,
        max_pixels_per_frame: Some(500),
    };
    let seq = FrameSequence::new(vec![noise(1), noise(2)], 100).unwrap();
    let out = TemporalPaletteQuantizer::new(&cfg).quantize(&seq).unwrap();
    assert!(out.palette.len() <= 16);
    assert!(out.sequence.distinct_colors() <= 16);
}

#[test]
fn unsampled_frames_map_to_nearest_palette_color() {
    let cfg = QuantizeConfig::default();
    // Frame 1 is not sampled; its pure red must snap to the sampled near-red.
    let frames = vec![
        Frame::solid([250, 0, 0]),
        Frame::solid([255, 0, 0]),
        Frame::solid([250, 0, 0]),
        Frame::solid([250, 0, 0]),
        Frame::solid([0, 0, 250]),
    ];
    let seq = FrameSequence::new(frames, 100).unwrap();
    let out = TemporalPaletteQuantizer::new(&cfg).quantize(&seq).unwrap();
    assert_eq!(out.sampled, vec![0, 4]);
    assert_eq!(out.sequence.frames()[1], Frame::solid([250, 0, 0]));
}

#[test]
fn nearest_ties_go_to_the_lower_index() {
    let p = Palette::new(vec![[0, 0, 0], [10, 0, 0]]).unwrap();
    assert_eq!(p.nearest([5, 0, 0]), 0);
    assert_eq!(p.nearest([6, 0, 0]), 1);
}

#[test]
fn palette_size_is_validated() {
    assert!(matches!(
        Palette::new(Vec::new()),
        Err(PixooError::Quantization(_))
    ));
    assert!(Palette::new(vec![[0, 0, 0]; 257]).is_err());
}

#[test]
fn empty_input_is_a_quantization_error() {
    let cfg = QuantizeConfig::default();
    let err = TemporalPaletteQuantizer::new(&cfg)
        .quantize_frames(&[], 100)
        .unwrap_err();
    assert!(matches!(err, PixooError::Quantization(_)));
}

#[test]
fn median_cut_splits_at_weighted_median() {
    let mut hist = HashMap::new();
    hist.insert([0, 0, 0], 10);
    hist.insert([10, 0, 0], 1);
    hist.insert([200, 0, 0], 1);
    hist.insert([210, 0, 0], 1);
    // The heavy black bin alone carries half the weight, so it gets its own box.
    let colors = median_cut(hist, 2);
    assert_eq!(colors.len(), 2);
    assert!(colors.contains(&[0, 0, 0]));
    assert!(colors.contains(&[140, 0, 0]));
}
