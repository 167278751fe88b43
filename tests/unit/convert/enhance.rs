use super::*;

fn gray(v: u8) -> Frame {
    Frame::solid([v, v, v])
}

/// Left half `lo`, right half `hi`.
fn split(lo: u8, hi: u8) -> Frame {
    let mut buf = Vec::with_capacity(FRAME_BYTES);
    for _y in 0..PANEL_SIZE {
        for x in 0..PANEL_SIZE {
            let v = if x < PANEL_SIZE / 2 { lo } else { hi };
            buf.extend_from_slice(&[v, v, v]);
        }
    }
    Frame::from_rgb8(buf).unwrap()
}

fn neutral() -> ProfileParams {
    ProfileParams {
        contrast: 1.0,
        saturation: 1.0,
        sharpness: 1.0,
        brightness: 1.0,
        gamma: None,
    }
}

#[test]
fn stats_of_split_frame() {
    // RMS of 66 and 206 is ~153 (0.6 of full scale); deviation is 70.
    let stats = LuminanceStats::of_frame(&split(66, 206));
    assert!((stats.brightness - 0.6).abs() < 0.01, "{stats:?}");
    assert!((stats.contrast - 70.0).abs() < 0.1, "{stats:?}");
}

#[test]
fn classification_thresholds() {
    let cfg = EnhanceConfig::default();
    assert_eq!(
        LuminanceStats::of_frame(&gray(40)).classify(&cfg),
        EnhancementProfile::Dark
    );
    assert_eq!(
        LuminanceStats::of_frame(&gray(200)).classify(&cfg),
        EnhancementProfile::BrightLowContrast
    );
    assert_eq!(
        LuminanceStats::of_frame(&split(66, 206)).classify(&cfg),
        EnhancementProfile::BrightHighContrast
    );
}

#[test]
fn bright_high_contrast_profile_is_near_neutral() {
    let p = EnhancementProfile::BrightHighContrast.params(&EnhanceConfig::default());
    assert_eq!(p.saturation, 1.0);
    assert_eq!(p.sharpness, 1.0);
    assert_eq!(p.brightness, 1.0);
    assert!(p.gamma.is_none());
}

#[test]
fn neutral_params_are_identity() {
    let f = split(30, 220);
    assert_eq!(apply_profile(&f, &neutral()).unwrap(), f);
}

#[test]
fn gamma_below_one_lifts_shadows() {
    let params = ProfileParams {
        gamma: Some(0.6),
        ..neutral()
    };
    let out = apply_profile(&gray(40), &params).unwrap();
    assert!(out.pixel(10, 10)[0] > 40);
}

#[test]
fn contrast_pushes_away_from_mean() {
    let params = ProfileParams {
        contrast: 1.5,
        ..neutral()
    };
    let out = apply_profile(&split(100, 160), &params).unwrap();
    // Mean luma is 130; 100 -> 85, 160 -> 175.
    assert_eq!(out.pixel(0, 0), [85, 85, 85]);
    assert_eq!(out.pixel(63, 0), [175, 175, 175]);
}

#[test]
fn saturation_leaves_grays_alone_and_scales_chroma() {
    let params = ProfileParams {
        saturation: 0.0,
        ..neutral()
    };
    let out = apply_profile(&Frame::solid([200, 40, 40]), &params).unwrap();
    let [r, g, b] = out.pixel(5, 5);
    assert_eq!(r, g);
    assert_eq!(g, b);

    let params = ProfileParams {
        saturation: 2.0,
        ..neutral()
    };
    assert_eq!(apply_profile(&gray(90), &params).unwrap(), gray(90));
}

#[test]
fn sharpness_keeps_flat_areas_and_borders() {
    let params = ProfileParams {
        sharpness: 2.0,
        ..neutral()
    };
    assert_eq!(apply_profile(&gray(120), &params).unwrap(), gray(120));

    let mut buf = gray(100).as_bytes().to_vec();
    buf[..3].copy_from_slice(&[250, 250, 250]);
    let f = Frame::from_rgb8(buf).unwrap();
    let out = apply_profile(&f, &params).unwrap();
    assert_eq!(out.pixel(0, 0), [250, 250, 250]);
    // (1,1) sees the bright corner in its kernel and is pushed below 100.
    assert!(out.pixel(1, 1)[0] < 100);
}

#[test]
fn one_profile_for_the_whole_sequence() {
    let cfg = EnhanceConfig::default();
    let seq = FrameSequence::new(vec![gray(30), split(66, 206)], 125).unwrap();
    let (out, report) = AdaptiveEnhancer::new(&cfg).enhance(&seq).unwrap();
    assert_eq!(report.profile, EnhancementProfile::Dark);
    assert_eq!(out.len(), 2);
    assert_eq!(out.frame_duration_ms(), 125);
    let expected = apply_profile(&split(66, 206), &cfg.dark).unwrap();
    assert_eq!(out.frames()[1], expected);
}

#[test]
fn enhancement_is_deterministic() {
    let cfg = EnhanceConfig::default();
    let seq = FrameSequence::new(vec![split(10, 90), split(50, 240)], 100).unwrap();
    let enhancer = AdaptiveEnhancer::new(&cfg);
    let (a, ra) = enhancer.enhance(&seq).unwrap();
    let (b, rb) = enhancer.enhance(&seq).unwrap();
    assert_eq!(a, b);
    assert_eq!(ra, rb);
}

#[test]
fn darken_background_spares_bright_pixels() {
    let mut buf = [255u8, 255, 255].repeat(FRAME_BYTES / 3);
    buf[..12].copy_from_slice(&[60, 60, 60, 100, 100, 100, 140, 140, 140, 200, 200, 200]);
    let cfg = EnhanceConfig {
        darken_background: Some(DarkenBackground {
            threshold: 140.0,
            factor: 0.55,
        }),
        ..EnhanceConfig::default()
    };

    let out = apply_effects(&Frame::from_rgb8(buf).unwrap(), &cfg).unwrap();
    // Full effect, partial effect (mask 0.8), then untouched at and above the threshold.
    assert_eq!(out.pixel(0, 0), [33, 33, 33]);
    assert_eq!(out.pixel(1, 0), [64, 64, 64]);
    assert_eq!(out.pixel(2, 0), [140, 140, 140]);
    assert_eq!(out.pixel(3, 0), [200, 200, 200]);
    assert_eq!(out.pixel(63, 63), [255, 255, 255]);
}

#[test]
fn center_focus_darkens_corners_at_most_thirty_percent() {
    for (strength, corner) in [(0.25, 150u8), (1.0, 140), (5.0, 140)] {
        let cfg = EnhanceConfig {
            center_focus: Some(strength),
            ..EnhanceConfig::default()
        };
        let out = apply_effects(&gray(200), &cfg).unwrap();
        assert_eq!(out.pixel(0, 0), [corner; 3], "strength {strength}");
        assert_eq!(out.pixel(32, 32), [200; 3]);
        assert!(out.as_bytes().iter().all(|&v| v >= 140));
    }
}

#[test]
fn effects_are_off_by_default() {
    let cfg = EnhanceConfig::default();
    assert!(!cfg.has_effects());
    let seq = FrameSequence::new(vec![split(10, 90), gray(30)], 100).unwrap();
    let out = AdaptiveEnhancer::new(&cfg).apply_effects(seq.clone()).unwrap();
    assert_eq!(out, seq);
}
