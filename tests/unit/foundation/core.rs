use super::*;

#[test]
fn raw_frame_rejects_mismatched_buffer() {
    assert!(RawFrame::new(2, 2, vec![0; 12]).is_ok());
    assert!(RawFrame::new(2, 2, vec![0; 11]).is_err());
    let zero = RawFrame::new(0, 5, Vec::new()).unwrap();
    assert!(zero.is_zero_area());
}

#[test]
fn raw_frame_from_rgba_composites_over_black() {
    let raw = RawFrame::from_rgba8(2, 1, &[200, 100, 50, 255, 200, 100, 50, 0]).unwrap();
    assert_eq!(raw.rgb8, vec![200, 100, 50, 0, 0, 0]);

    let half = RawFrame::from_rgba8(1, 1, &[255, 255, 255, 128]).unwrap();
    assert_eq!(half.rgb8, vec![128, 128, 128]);
}

#[test]
fn frame_requires_panel_size() {
    assert!(Frame::from_rgb8(vec![0; FRAME_BYTES]).is_ok());
    assert!(Frame::from_rgb8(vec![0; FRAME_BYTES - 3]).is_err());
    assert_eq!(FRAME_BYTES, 12_288);
}

#[test]
fn frame_pixel_addressing_is_row_major() {
    let mut bytes = vec![0u8; FRAME_BYTES];
    let idx = ((2 * PANEL_SIZE + 5) as usize) * 3;
    bytes[idx..idx + 3].copy_from_slice(&[1, 2, 3]);
    let frame = Frame::from_rgb8(bytes).unwrap();
    assert_eq!(frame.pixel(5, 2), [1, 2, 3]);
    assert_eq!(frame.pixel(2, 5), [0, 0, 0]);
    assert_eq!(frame.to_rgb_image().get_pixel(5, 2).0, [1, 2, 3]);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "outside 64x64 frame")]
fn frame_pixel_rejects_column_past_the_edge() {
    let frame = Frame::solid([9, 9, 9]);
    let _ = frame.pixel(64, 0);
}

#[test]
fn sequence_rejects_empty_and_zero_duration() {
    assert!(FrameSequence::new(Vec::new(), 100).is_err());
    assert!(FrameSequence::new(vec![Frame::solid([0, 0, 0])], 0).is_err());
}

#[test]
fn sequence_ceiling_is_inclusive() {
    let seq = FrameSequence::new(vec![Frame::solid([1, 1, 1]); 40], 100).unwrap();
    assert!(seq.check_ceiling(Phase::Transfer, 40).is_ok());
    let err = seq.check_ceiling(Phase::Transfer, 39).unwrap_err();
    assert!(matches!(
        err,
        PixooError::ExceedsFrameCeiling {
            phase: Phase::Transfer,
            frames: 40,
            ceiling: 39
        }
    ));
}

#[test]
fn sequence_counts_colors_across_frames() {
    let seq = FrameSequence::new(
        vec![
            Frame::solid([1, 2, 3]),
            Frame::solid([1, 2, 3]),
            Frame::solid([9, 9, 9]),
        ],
        80,
    )
    .unwrap();
    assert_eq!(seq.distinct_colors(), 2);
    assert_eq!(seq.total_duration_ms(), 240);
}
