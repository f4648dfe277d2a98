use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(30, 1).is_ok());
}

#[test]
fn timestamps_are_exact_multiples_of_frame_duration() {
    let fps = Fps::new(60, 1).unwrap();
    assert_eq!(fps.timestamp_of(FrameIndex(0)), Timestamp::zero(60));
    assert_eq!(
        fps.timestamp_of(FrameIndex(3)),
        Timestamp {
            value: 3,
            timescale: 60
        }
    );

    let ntsc = Fps::new(30000, 1001).unwrap();
    let ts = ntsc.timestamp_of(FrameIndex(2));
    assert_eq!(ts.value, 2002);
    assert_eq!(ts.timescale, 30000);
    assert_eq!(ntsc.frame_duration().value, 1001);
}

#[test]
fn timestamp_seconds() {
    let ts = Timestamp {
        value: 90,
        timescale: 60,
    };
    assert!((ts.as_secs_f64() - 1.5).abs() < 1e-12);
    assert_eq!(
        Timestamp {
            value: 5,
            timescale: 0
        }
        .as_secs_f64(),
        0.0
    );
}

#[test]
fn pixel_size_helpers() {
    let s = PixelSize::new(101, 75);
    assert_eq!(s.even_floor(), PixelSize::new(100, 74));
    assert_eq!(PixelSize::new(1, 1).even_floor(), PixelSize::new(2, 2));
    assert_eq!(PixelSize::new(3, 2).rgba8_len(), 24);
    assert!(PixelSize::new(0, 4).is_empty());
    assert_eq!(s.to_string(), "101x75");
}
