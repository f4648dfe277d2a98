use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::*;
use crate::foundation::core::PixelSize;

fn tagged(tag: u8) -> StillImage {
    StillImage::solid(PixelSize::new(2, 2), [tag, 0, 0, 255]).unwrap()
}

fn tag_of(img: &StillImage) -> u8 {
    img.pixels().get_pixel(0, 0).0[0]
}

#[test]
fn fifo_order_is_preserved() {
    let q = FrameQueue::default();
    for t in 0..5 {
        q.append(tagged(t));
    }
    assert_eq!(q.len(), 5);
    assert_eq!(q.enqueued_total(), 5);

    let drained: Vec<u8> = std::iter::from_fn(|| q.remove_first())
        .map(|img| tag_of(&img))
        .collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    assert!(q.is_empty());
    assert_eq!(q.enqueued_total(), 5);
}

#[test]
fn step_reports_finished_only_when_empty() {
    let q = FrameQueue::default();
    assert!(matches!(q.try_step(), QueueStep::Idle));

    q.append(tagged(1));
    q.finish_producing();
    assert!(q.is_producer_finished());
    assert!(matches!(q.try_step(), QueueStep::Frame(_)));
    assert!(matches!(q.try_step(), QueueStep::Finished));
}

#[test]
fn wait_for_work_times_out_without_frames() {
    let q = FrameQueue::default();
    let t0 = Instant::now();
    assert!(!q.wait_for_work(Duration::from_millis(20)));
    assert!(t0.elapsed() >= Duration::from_millis(15));
}

#[test]
fn wait_for_work_wakes_on_append_from_other_thread() {
    let q = Arc::new(FrameQueue::default());
    let producer = {
        let q = Arc::clone(&q);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            q.append(tagged(7));
        })
    };
    assert!(q.wait_for_work(Duration::from_secs(5)));
    producer.join().unwrap();
    assert_eq!(q.remove_first().map(|i| tag_of(&i)), Some(7));
}

#[test]
fn concurrent_append_and_drain_neither_lose_nor_duplicate() {
    const N: u32 = 2_000;
    let q = Arc::new(FrameQueue::new(16));

    let producer = {
        let q = Arc::clone(&q);
        std::thread::spawn(move || {
            for i in 0..N {
                q.append(tagged((i % 251) as u8));
                if i % 97 == 0 {
                    std::thread::yield_now();
                }
            }
            q.finish_producing();
        })
    };

    let mut drained = Vec::with_capacity(N as usize);
    loop {
        match q.try_step() {
            QueueStep::Frame(img) => drained.push(tag_of(&img)),
            QueueStep::Finished => break,
            QueueStep::Idle => {
                q.wait_for_work(Duration::from_millis(5));
            }
        }
    }
    producer.join().unwrap();

    assert_eq!(drained.len(), N as usize);
    assert_eq!(q.enqueued_total(), u64::from(N));
    for (i, tag) in drained.iter().enumerate() {
        assert_eq!(*tag, (i % 251) as u8, "frame {i} out of order");
    }
}

#[derive(Clone, Default)]
struct LogBuf(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuf {
    fn count(&self, needle: &str) -> usize {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .matches(needle)
            .count()
    }
}

/// Run `f` with warnings captured into the returned buffer.
fn with_captured_warnings(f: impl FnOnce()) -> LogBuf {
    let logs = LogBuf::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .with_writer(move || sink.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    logs
}

const BACKLOG_WARNING: &str = "encoder is falling behind capture";

#[test]
fn backlog_warning_fires_once_past_threshold() {
    let q = FrameQueue::new(3);
    let logs = with_captured_warnings(|| {
        for t in 0..3 {
            q.append(tagged(t));
        }
        assert!(!q.lock().warned_backlog);

        q.append(tagged(3));
        assert!(q.lock().warned_backlog);

        // Draining and refilling past the threshold stays silent.
        while q.remove_first().is_some() {}
        for t in 0..10 {
            q.append(tagged(t));
        }
    });
    assert_eq!(logs.count(BACKLOG_WARNING), 1);
    assert_eq!(logs.count("pending=4"), 1);
    assert_eq!(logs.count("threshold=3"), 1);
}

#[test]
fn zero_threshold_never_warns() {
    let q = FrameQueue::new(0);
    let logs = with_captured_warnings(|| {
        for t in 0..200u32 {
            q.append(tagged((t % 251) as u8));
        }
    });
    assert_eq!(q.len(), 200);
    assert!(!q.lock().warned_backlog);
    assert_eq!(logs.count(BACKLOG_WARNING), 0);
}
