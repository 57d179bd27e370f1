use std::path::Path;

use image::{Rgb, RgbImage};
use kmeans_filter::{
    EmptyClusterPolicy, Error, Options,
    diagnostics::{JsonLinesObserver, NoopObserver},
    filter_directory, filter_image, filter_image_traced,
};

fn two_tone(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([10, 20, 30])
        } else {
            Rgb([240, 230, 220])
        }
    })
}

fn seeded() -> Options {
    Options {
        seed: Some(42),
        ..Options::default()
    }
}

fn write(image: &RgbImage, path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image.save(path).unwrap();
}

#[test]
fn two_tone_image_survives_two_colours() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let image = two_tone(8, 4);
    write(&image, &input);

    let report = filter_image(&input, &output, 2, &seeded(), &mut NoopObserver).unwrap();
    assert!(report.fit.converged);
    assert_eq!((report.width, report.height), (8, 4));

    let out = image::open(&output).unwrap().into_rgb8();
    assert_eq!(out, image);
}

#[test]
fn one_colour_is_the_average() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write(&two_tone(4, 1), &input);

    filter_image(&input, &output, 1, &seeded(), &mut NoopObserver).unwrap();

    let out = image::open(&output).unwrap().into_rgb8();
    assert!(out.pixels().all(|p| *p == Rgb([125, 125, 125])));
}

#[test]
fn too_many_colours_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write(&two_tone(4, 2), &input);

    for k in [0, 9] {
        let err = filter_image(&input, &output, k, &seeded(), &mut NoopObserver).unwrap_err();
        assert!(matches!(err, Error::InvalidClusterCount { .. }));
        assert!(!output.exists());
    }
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let err = filter_image(
        dir.path().join("nope.png"),
        &output,
        2,
        &seeded(),
        &mut NoopObserver,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(!output.exists());
}

#[test]
fn big_images_are_shrunk_first() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write(&two_tone(40, 20), &input);

    let options = Options {
        max_width: 10,
        max_height: 10,
        empty_cluster: EmptyClusterPolicy::Reseed,
        ..seeded()
    };
    let report = filter_image(&input, &output, 2, &options, &mut NoopObserver).unwrap();
    assert_eq!((report.width, report.height), (10, 5));
    assert_eq!(image::open(&output).unwrap().into_rgb8().dimensions(), (10, 5));
}

#[test]
fn trace_has_a_line_per_phase() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write(&two_tone(6, 2), &input);

    let mut trace = JsonLinesObserver::new(Vec::new());
    let report = filter_image(&input, &output, 2, &seeded(), &mut trace).unwrap();
    let trace = String::from_utf8(trace.finish().unwrap()).unwrap();

    // every update is followed by another assignment pass
    assert_eq!(trace.lines().count(), 2 * report.fit.iterations + 1);
    let last: serde_json::Value = serde_json::from_str(trace.lines().last().unwrap()).unwrap();
    assert_eq!(last["phase"], "assign");
    assert_eq!(last["sizes"], serde_json::json!([6, 6]));
}

#[test]
fn directories_are_mirrored() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write(&two_tone(4, 4), &input.join("a.png"));
    write(&two_tone(6, 2), &input.join("nested/b.PNG"));
    std::fs::write(input.join("notes.txt"), "skip me").unwrap();
    std::fs::write(input.join("broken.png"), "not an image").unwrap();

    let entries = filter_directory(&input, &output, 2, &seeded()).unwrap();
    assert_eq!(entries.len(), 3);

    let failed = entries
        .iter()
        .filter(|e| e.result.is_err())
        .map(|e| e.input.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(failed, vec!["broken.png"]);

    assert!(output.join("a.png").exists());
    assert!(output.join("nested/b.PNG").exists());
    assert!(!output.join("broken.png").exists());
    assert!(!output.join("notes.txt").exists());
}

#[test]
fn nested_output_is_not_filtered_again() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("imgs");
    let output = input.join("out");
    write(&two_tone(4, 4), &input.join("a.png"));

    for _ in 0..3 {
        let entries = filter_directory(&input, &output, 2, &seeded()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].output, output.join("a.png"));
        assert!(entries[0].result.is_ok());
    }
    assert!(output.join("a.png").exists());
    assert!(!output.join("out").exists());
}

#[test]
fn input_inside_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let input = output.join("imgs");
    write(&two_tone(4, 4), &input.join("a.png"));

    for (input, output) in [(&input, &output), (&input, &input)] {
        let err = filter_directory(input, output, 2, &seeded()).unwrap_err();
        assert!(matches!(err, Error::InputInsideOutput { .. }));
    }
}

#[test]
fn traced_run_writes_image_and_trace() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let trace = dir.path().join("trace.jsonl");
    write(&two_tone(6, 2), &input);

    let report = filter_image_traced(&input, &output, &trace, 2, &seeded()).unwrap();
    assert!(output.exists());
    let trace = std::fs::read_to_string(&trace).unwrap();
    assert_eq!(trace.lines().count(), 2 * report.fit.iterations + 1);
}

#[test]
fn failed_traced_run_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let trace = dir.path().join("trace.jsonl");
    write(&two_tone(4, 2), &input);

    let err = filter_image_traced(&input, &output, &trace, 9, &seeded()).unwrap_err();
    assert!(matches!(err, Error::InvalidClusterCount { .. }));
    let err = filter_image_traced(dir.path().join("nope.png"), &output, &trace, 2, &seeded())
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));

    assert!(!output.exists());
    assert!(!trace.exists());
}
