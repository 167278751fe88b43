use super::*;

fn probe(fps: f64, duration_secs: f64) -> VideoProbe {
    VideoProbe {
        width: 640,
        height: 360,
        fps,
        duration_secs,
    }
}

fn seg(start_secs: f64, end_secs: f64) -> Option<ClipSegment> {
    Some(ClipSegment {
        start_secs,
        end_secs,
    })
}

#[test]
fn clip_rate_is_lowered_to_fit_the_ceiling() {
    let plan = plan_clip(&probe(30.0, 60.0), seg(10.0, 15.0), 5.0, 40).unwrap();
    assert_eq!(plan.start_secs, 10.0);
    assert!((plan.fps - 8.0).abs() < 1e-9);
    assert_eq!(plan.frame_count, 40);
    assert_eq!(plan.frame_duration_ms(), 125);
}

#[test]
fn slow_sources_keep_their_rate_with_a_floor() {
    let plan = plan_clip(&probe(6.0, 60.0), seg(0.0, 2.0), 5.0, 120).unwrap();
    assert!((plan.fps - 6.0).abs() < 1e-9);
    assert_eq!(plan.frame_count, 12);

    let plan = plan_clip(&probe(2.0, 60.0), seg(0.0, 2.0), 5.0, 120).unwrap();
    assert!((plan.fps - MIN_CLIP_FPS).abs() < 1e-9);
}

#[test]
fn bad_segments_are_rejected() {
    assert!(matches!(
        plan_clip(&probe(30.0, 60.0), seg(0.0, 6.0), 5.0, 40),
        Err(PixooError::Decode(_))
    ));
    assert!(plan_clip(&probe(30.0, 60.0), seg(3.0, 3.0), 5.0, 40).is_err());
    assert!(plan_clip(&probe(30.0, 60.0), seg(4.0, 2.0), 5.0, 40).is_err());
}

#[test]
fn whole_file_is_capped_at_max_duration() {
    let plan = plan_clip(&probe(25.0, 12.0), None, 5.0, 40).unwrap();
    assert_eq!(plan.start_secs, 0.0);
    assert_eq!(plan.duration_secs, 5.0);
    assert!(plan_clip(&probe(25.0, 0.0), None, 5.0, 40).is_err());
    assert!(plan_clip(&probe(0.0, 3.0), None, 5.0, 40).is_err());
}

#[test]
fn ffprobe_ratio_parsing() {
    assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
    assert_eq!(parse_ff_ratio("25/0"), None);
    assert_eq!(parse_ff_ratio("abc"), None);
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn video_decode_requires_feature() {
    let cfg = PipelineConfig::default();
    let err = FfmpegDecoder::new(&cfg, Phase::Transfer)
        .decode(&MediaSource::path("clip.mp4"))
        .unwrap_err();
    assert!(err.to_string().contains("media-ffmpeg"));
}
