use std::io::Cursor;

use image::{
    Delay, Rgba, RgbaImage,
    codecs::gif::{GifEncoder, Repeat},
};

use super::*;

fn gif_bytes(delays_ms: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut enc = GifEncoder::new(&mut buf);
        enc.set_repeat(Repeat::Infinite).unwrap();
        for (i, &ms) in delays_ms.iter().enumerate() {
            let v = (i as u8) * 40 + 10;
            let img = RgbaImage::from_pixel(8, 4, Rgba([v, v, v, 255]));
            enc.encode_frame(image::Frame::from_parts(
                img,
                0,
                0,
                Delay::from_numer_denom_ms(ms, 1),
            ))
            .unwrap();
        }
    }
    buf
}

#[test]
fn animated_gif_frames_and_duration() {
    let media = ImageDecoder::default()
        .decode_bytes(&gif_bytes(&[150, 150, 200]))
        .unwrap();
    assert_eq!(media.frames.len(), 3);
    assert_eq!(media.natural_duration_ms, 500);
    assert_eq!((media.frames[0].width, media.frames[0].height), (8, 4));
    assert_eq!(&media.frames[1].rgb8[..3], &[50, 50, 50]);
}

#[test]
fn untimed_gif_frames_use_fallback_delay() {
    let media = ImageDecoder::default()
        .decode_bytes(&gif_bytes(&[0, 0]))
        .unwrap();
    assert_eq!(media.natural_duration_ms, 200);

    let mut cfg = PipelineConfig::default();
    cfg.fallback_frame_duration_ms = 70;
    let media = ImageDecoder::from_config(&cfg)
        .decode_bytes(&gif_bytes(&[0, 0]))
        .unwrap();
    assert_eq!(media.natural_duration_ms, 140);
}

#[test]
fn png_still_is_composited_over_black() {
    let img = RgbaImage::from_raw(2, 1, vec![200, 100, 50, 255, 200, 100, 50, 0]).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();

    let media = ImageDecoder::default().decode_bytes(&buf).unwrap();
    assert_eq!(media.natural_duration_ms, 0);
    assert_eq!(media.frames.len(), 1);
    assert_eq!(media.frames[0].rgb8, vec![200, 100, 50, 0, 0, 0]);
}

#[test]
fn garbage_bytes_are_decode_errors() {
    let err = ImageDecoder::default()
        .decode_bytes(b"definitely not an image")
        .unwrap_err();
    assert!(matches!(err, PixooError::Decode(_)));
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = ImageDecoder::default()
        .decode(&MediaSource::path("target/does-not-exist.gif"))
        .unwrap_err();
    assert!(err.to_string().contains("does-not-exist.gif"));
}

#[test]
fn video_paths_are_recognized_by_extension() {
    assert!(is_video_path(Path::new("clip.MP4")));
    assert!(is_video_path(Path::new("a/b/c.webm")));
    assert!(!is_video_path(Path::new("anim.gif")));
    assert!(!is_video_path(Path::new("noext")));
}

#[test]
fn segment_duration() {
    let src = MediaSource::path("clip.mp4").with_segment(1.5, 4.0);
    assert_eq!(src.segment.map(|s| s.duration_secs()), Some(2.5));
}
