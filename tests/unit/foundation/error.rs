use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CaptureError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CaptureError::writer_start("x")
            .to_string()
            .contains("writer start failed:")
    );
    assert!(
        CaptureError::writer_construction("x")
            .to_string()
            .contains("writer construction failed:")
    );
    assert_eq!(
        CaptureError::NoFramesToRender.to_string(),
        "no images to render"
    );
}

#[test]
fn kinds_are_distinct() {
    let errs = [
        CaptureError::NoFramesToRender,
        CaptureError::CaptureAlreadyInProgress,
        CaptureError::writer_construction("a"),
        CaptureError::writer_start("b"),
        CaptureError::UnknownWriteStartFailure,
        CaptureError::PixelBufferAllocationFailed {
            frame: 0,
            reason: "empty".into(),
        },
        CaptureError::draw("c"),
    ];
    let mut kinds: Vec<_> = errs.iter().map(CaptureError::kind).collect();
    kinds.sort_unstable();
    kinds.dedup();
    assert_eq!(kinds.len(), errs.len());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CaptureError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
