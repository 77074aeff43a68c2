//! Paper-scale checks for rendered strips.

use ecglabel_core::model::{Signal, SignalId, SignalMetadata};
use ecglabel_core::render::{RenderOutcome, StripLayout, StripRenderer};

fn flat_signal(samples: usize, rate: f64) -> Signal {
    Signal {
        id: SignalId::new(201),
        samples: vec![0.0; samples],
        sampling_rate_hz: rate,
        reference_heart_rate: 60.0,
        metadata: SignalMetadata::default(),
    }
}

#[test]
fn thirty_seconds_at_25mm_per_second_is_750mm() {
    let renderer = StripRenderer::new(StripLayout::clinical(10.0, 30.0, 25.0, 10.0)).unwrap();
    let RenderOutcome::Rendered(strip) = renderer.render(&flat_signal(9000, 300.0)).unwrap() else {
        panic!("flat signal must render");
    };
    assert!((strip.geometry.trace_length_mm - 750.0).abs() < 1e-9);
    assert_eq!(strip.geometry.row_count, 3);

    // Each row's pixel width measures back to 250 mm at the stated dpi.
    let measured_mm = f64::from(strip.geometry.width_px) / strip.geometry.px_per_mm;
    assert!((measured_mm - 250.0).abs() < 0.1, "{measured_mm}");
}

#[test]
fn scale_is_independent_of_sampling_rate() {
    let renderer = StripRenderer::new(StripLayout::default()).unwrap();
    for rate in [250.0, 300.0, 500.0] {
        let strip = renderer
            .render(&flat_signal(20_000, rate))
            .unwrap()
            .into_strip()
            .unwrap();
        assert!((strip.geometry.trace_length_mm - 750.0).abs() < 1e-9);
        assert_eq!(strip.image.dimensions(), (2953, 1181));
    }
}

#[test]
fn faster_paper_widens_the_image() {
    let slow = StripRenderer::new(StripLayout::clinical(10.0, 30.0, 25.0, 10.0)).unwrap();
    let fast = StripRenderer::new(StripLayout::clinical(10.0, 30.0, 50.0, 10.0)).unwrap();
    let signal = flat_signal(9000, 300.0);
    let w_slow = slow.render(&signal).unwrap().into_strip().unwrap().geometry.width_px;
    let w_fast = fast.render(&signal).unwrap().into_strip().unwrap().geometry.width_px;
    assert!(w_fast.abs_diff(2 * w_slow) <= 1);
}

#[test]
fn png_file_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strip.png");
    let renderer = StripRenderer::new(StripLayout::default()).unwrap();
    let strip = renderer
        .render(&flat_signal(900, 300.0))
        .unwrap()
        .into_strip()
        .unwrap();
    strip.save_png(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
}
