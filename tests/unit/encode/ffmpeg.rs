use super::*;
use crate::encode::pixel::PixelFormat;

fn cfg(out: &str, input: PixelSize, output: PixelSize) -> WriterConfig {
    WriterConfig {
        input_size: input,
        output_size: output,
        fps: Fps::new(30, 1).unwrap(),
        format: PixelFormat::Rgba8Opaque,
        out_path: PathBuf::from(out),
    }
}

fn args_of(cmd: &Command) -> Vec<String> {
    cmd.get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn command_streams_rawvideo_at_input_rate() {
    let size = PixelSize::new(100, 100);
    let w = FfmpegWriter::new(cfg("out/a.mp4", size, size), FfmpegWriterOpts::default());
    let args = args_of(&w.build_command());

    let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();
    assert_eq!(args[0], "-y");
    assert_eq!(args[pos("-s") + 1], "100x100");
    assert_eq!(args[pos("-r") + 1], "30/1");
    assert!(pos("-r") < pos("-i"));
    assert_eq!(args[pos("-c:v") + 1], VIDEO_CODEC);
    assert!(!args.iter().any(|a| a == "-vf"));
    assert_eq!(args.last().map(String::as_str), Some("out/a.mp4"));
}

#[test]
fn command_scales_to_even_target() {
    let w = FfmpegWriter::new(
        cfg("b.mp4", PixelSize::new(101, 75), PixelSize::new(101, 75)),
        FfmpegWriterOpts {
            overwrite: false,
            ..FfmpegWriterOpts::default()
        },
    );
    let args = args_of(&w.build_command());
    assert_eq!(args[0], "-n");
    let vf = args.iter().position(|a| a == "-vf").unwrap();
    assert_eq!(args[vf + 1], "scale=100:74");
}

#[test]
fn construction_rejects_other_containers() {
    let size = PixelSize::new(4, 4);
    let err = FfmpegWriterFactory::default()
        .create(&cfg("clip.mov", size, size))
        .err()
        .unwrap();
    assert!(matches!(err, CaptureError::WriterConstructionFailed(_)));
}

#[test]
fn construction_fails_when_ffmpeg_is_missing() {
    let size = PixelSize::new(4, 4);
    let factory = FfmpegWriterFactory::new(FfmpegWriterOpts {
        ffmpeg_bin: PathBuf::from("/nonexistent/framecast/ffmpeg"),
        overwrite: true,
    });
    let err = factory.create(&cfg("clip.mp4", size, size)).err().unwrap();
    assert!(matches!(err, CaptureError::WriterConstructionFailed(_)));
    assert!(err.to_string().contains("codec unavailable"));
}

#[test]
fn start_fails_when_output_parent_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let size = PixelSize::new(4, 4);
    let mut c = cfg("", size, size);
    c.out_path = blocker.join("clip.mp4");
    let mut w = FfmpegWriter::new(c, FfmpegWriterOpts::default());
    assert!(matches!(
        w.start_writing(),
        Err(CaptureError::WriterStartFailed(_))
    ));
    assert!(!w.is_ready_for_more_media_data());
}

#[test]
fn encoded_size_prefers_target_and_rounds_to_even() {
    let input = PixelSize::new(99, 99);
    assert_eq!(encoded_size(input, None), PixelSize::new(98, 98));
    assert_eq!(
        encoded_size(input, Some(PixelSize::new(64, 33))),
        PixelSize::new(64, 32)
    );
}

#[test]
fn no_overwrite_leaves_a_fresh_output_absent_for_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("clip.mp4");

    prepare_output(&out, false).unwrap();
    assert!(out.parent().unwrap().is_dir());
    assert!(!out.exists());
}

#[test]
fn no_overwrite_refuses_an_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clip.mp4");
    std::fs::write(&out, b"keep me").unwrap();

    let err = prepare_output(&out, false).err().unwrap();
    assert!(matches!(err, CaptureError::WriterStartFailed(_)));
    assert!(err.to_string().contains("already exists"));
    assert_eq!(std::fs::read(&out).unwrap(), b"keep me");
}

#[test]
fn overwrite_truncates_an_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clip.mp4");
    std::fs::write(&out, b"old").unwrap();

    prepare_output(&out, true).unwrap();
    assert_eq!(std::fs::metadata(&out).unwrap().len(), 0);
}

#[test]
fn failed_spawn_leaves_no_output_behind() {
    let dir = tempfile::tempdir().unwrap();
    let size = PixelSize::new(4, 4);
    for overwrite in [true, false] {
        let mut c = cfg("", size, size);
        c.out_path = dir.path().join(format!("clip-{overwrite}.mp4"));
        let opts = FfmpegWriterOpts {
            ffmpeg_bin: dir.path().join("no-such-ffmpeg"),
            overwrite,
        };
        let mut w = FfmpegWriter::new(c.clone(), opts);
        assert!(matches!(
            w.start_writing(),
            Err(CaptureError::WriterStartFailed(_))
        ));
        assert!(!c.out_path.exists(), "overwrite={overwrite}");
    }
}
