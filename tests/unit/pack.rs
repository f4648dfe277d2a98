use super::*;
use crate::encode::writer::{MemoryFault, MemoryWriterFactory};
use crate::foundation::core::PixelSize;

fn config(dir: &Path) -> CaptureConfig {
    CaptureConfig {
        output_dir: Some(dir.to_path_buf()),
        readiness_poll_ms: 1,
        ..CaptureConfig::default()
    }
}

fn still(tag: u8) -> StillImage {
    StillImage::solid(PixelSize::new(2, 2), [tag, tag, tag, 255]).unwrap()
}

#[test]
fn pack_is_encoded_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let path = encode_image_pack(
        (1..=3).map(still),
        StartOptions::default(),
        config(dir.path()),
        Arc::new(factory.clone()),
    )
    .unwrap();
    assert!(path.exists());

    let rec = factory.recording();
    let tags: Vec<u8> = rec.frames.iter().map(|f| f.data[0]).collect();
    assert_eq!(tags, vec![1, 2, 3]);
    assert!(rec.finished);
}

#[test]
fn empty_pack_has_nothing_to_render() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new();
    let res = encode_image_pack(
        Vec::new(),
        StartOptions::default(),
        config(dir.path()),
        Arc::new(factory.clone()),
    );
    assert!(matches!(res, Err(CaptureError::NoFramesToRender)));
    assert_eq!(factory.recording().writers_created, 0);
}

#[test]
fn writer_failure_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryWriterFactory::new().with_fault(MemoryFault::Start);
    let res = encode_image_pack(
        (0..50).map(still),
        StartOptions::default(),
        config(dir.path()),
        Arc::new(factory),
    );
    assert!(matches!(res, Err(CaptureError::WriterStartFailed(_))));
}

#[test]
fn png_dir_is_read_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    for (name, tag) in [("b.png", 2u8), ("a.png", 1), ("c.PNG", 3)] {
        still(tag).save_png(&dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

    let names: Vec<String> = sorted_png_paths(dir.path())
        .unwrap()
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_owned))
        .collect();
    assert_eq!(names, vec!["a.png", "b.png", "c.PNG"]);

    let images = load_png_dir(dir.path()).unwrap();
    let tags: Vec<u8> = images.iter().map(|i| i.pixels().get_pixel(0, 0).0[0]).collect();
    assert_eq!(tags, vec![1, 2, 3]);
}

#[test]
fn empty_png_dir_has_nothing_to_render() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_png_dir(dir.path()),
        Err(CaptureError::NoFramesToRender)
    ));
}
