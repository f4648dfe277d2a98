use super::*;
use crate::encode::writer::{MemoryFault, MemoryWriterFactory};
use crate::foundation::core::Timestamp;

fn still(tag: u8, size: PixelSize) -> StillImage {
    StillImage::solid(size, [tag, 0, 0, 255]).unwrap()
}

fn open(factory: &MemoryWriterFactory, dir: &Path, opts: EncoderOpts) -> Encoder {
    Encoder::open(
        &still(0, PixelSize::new(4, 4)),
        factory,
        &dir.join("out.mp4"),
        None,
        opts,
    )
    .unwrap()
}

#[test]
fn frames_get_consecutive_timestamps_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let opts = EncoderOpts {
        fps: Fps::new(30, 1).unwrap(),
        ..EncoderOpts::default()
    };
    let mut enc = open(&factory, dir.path(), opts);

    let q = FrameQueue::default();
    for tag in 1..=4 {
        q.append(still(tag, PixelSize::new(4, 4)));
    }
    assert_eq!(enc.drain(&q).unwrap(), DrainStatus::QueueEmpty);
    q.finish_producing();
    assert_eq!(enc.drain(&q).unwrap(), DrainStatus::Complete);
    let path = enc.finish().unwrap();
    assert_eq!(path, dir.path().join("out.mp4"));
    assert!(path.exists());

    let rec = factory.recording();
    assert!(rec.finished);
    assert_eq!(rec.frames.len(), 4);
    for (i, f) in rec.frames.iter().enumerate() {
        assert_eq!(
            f.pts,
            Timestamp {
                value: i as u64,
                timescale: 30
            }
        );
        assert_eq!(f.data[0], i as u8 + 1);
    }
}

#[test]
fn busy_writer_pauses_the_drain() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new().with_stall_polls(1);
    let mut enc = open(&factory, dir.path(), EncoderOpts::default());

    let q = FrameQueue::default();
    q.append(still(1, PixelSize::new(4, 4)));
    q.append(still(2, PixelSize::new(4, 4)));
    q.finish_producing();

    assert_eq!(enc.drain(&q).unwrap(), DrainStatus::WriterBusy);
    assert_eq!(enc.frames_encoded(), 1);
    assert_eq!(q.len(), 1);
    assert_eq!(enc.drain(&q).unwrap(), DrainStatus::WriterBusy);
    assert_eq!(enc.frames_encoded(), 2);
    assert_eq!(enc.drain(&q).unwrap(), DrainStatus::Complete);
}

#[test]
fn mismatched_frames_are_letterboxed_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let mut enc = open(&factory, dir.path(), EncoderOpts::default());
    enc.append_image(still(9, PixelSize::new(8, 2))).unwrap();

    let rec = factory.recording();
    assert_eq!(rec.frames.len(), 1);
    assert_eq!(rec.frames[0].data.len(), 4 * 4 * 4);
}

#[test]
fn mismatched_frames_fail_under_reject_policy() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let opts = EncoderOpts {
        dimension_policy: DimensionPolicy::Reject,
        ..EncoderOpts::default()
    };
    let mut enc = open(&factory, dir.path(), opts);
    let err = enc
        .append_image(still(9, PixelSize::new(8, 2)))
        .unwrap_err();
    assert!(matches!(err, CaptureError::DimensionMismatch { .. }));
    assert_eq!(enc.frames_encoded(), 0);
}

#[test]
fn allocation_failure_aborts_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let opts = EncoderOpts {
        pool: PixelBufferPoolOpts {
            max_buffers: 1,
            max_buffer_bytes: 8,
        },
        ..EncoderOpts::default()
    };
    let mut enc = open(&factory, dir.path(), opts);
    let err = enc.append_image(still(1, PixelSize::new(4, 4))).unwrap_err();
    assert!(matches!(
        err,
        CaptureError::PixelBufferAllocationFailed { frame: 0, .. }
    ));
}

#[test]
fn allocation_failure_can_drop_frames() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let opts = EncoderOpts {
        alloc_failure_policy: AllocFailurePolicy::DropFrame,
        pool: PixelBufferPoolOpts {
            max_buffers: 1,
            max_buffer_bytes: 8,
        },
        ..EncoderOpts::default()
    };
    let mut enc = open(&factory, dir.path(), opts);
    enc.append_image(still(1, PixelSize::new(4, 4))).unwrap();
    assert_eq!(enc.frames_dropped(), 1);
    // Nothing made it into the stream.
    assert!(matches!(enc.finish(), Err(CaptureError::NoFramesToRender)));
    assert!(factory.recording().cancelled);
}

#[test]
fn start_failures_are_reported_and_cancel_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    for (fault, expect_unknown) in [
        (MemoryFault::Start, false),
        (MemoryFault::StartWithoutError, true),
    ] {
        let factory = MemoryWriterFactory::new().with_fault(fault);
        let err = Encoder::open(
            &still(0, PixelSize::new(4, 4)),
            &factory,
            &dir.path().join("x.mp4"),
            None,
            EncoderOpts::default(),
        )
        .err()
        .unwrap();
        if expect_unknown {
            assert!(matches!(err, CaptureError::UnknownWriteStartFailure));
        } else {
            assert!(matches!(err, CaptureError::WriterStartFailed(_)));
        }
        assert!(factory.recording().cancelled);
    }
}

#[test]
fn target_size_reaches_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let _enc = Encoder::open(
        &still(0, PixelSize::new(10, 10)),
        &factory,
        &dir.path().join("t.mp4"),
        Some(PixelSize::new(21, 20)),
        EncoderOpts::default(),
    )
    .unwrap();
    let cfg = factory.recording().config.unwrap();
    assert_eq!(cfg.input_size, PixelSize::new(10, 10));
    assert_eq!(cfg.output_size, PixelSize::new(20, 20));
}
