//! End-to-end classification through `InferenceSession` on the stub runtime.

mod common;

use common::{StubBehaviour, StubRuntime};
use enginert_inference::InferenceSession;
use enginert_inference::dims::Dims;
use enginert_inference::errors::InferenceError;
use enginert_inference::inference::{DEFAULT_TOP_K, Labels, write_report};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SCORES: [f32; 10] = [0.1, 0.9, 0.05, 0.3, 0.02, 0.6, 0.01, 0.0, 0.0, 0.0];

fn write_image(dir: &TempDir, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join("input.png");
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    image.save(&path).unwrap();
    path
}

fn classifier_runtime(behaviour: StubBehaviour) -> StubRuntime {
    StubRuntime::new(vec![Dims::from([3, 224, 224]), Dims::from([10])], behaviour)
}

#[cfg(test)]
mod classify_tests {
    use super::*;

    #[test]
    fn test_classify_prints_six_ranked_lines() {
        let dir = TempDir::new().unwrap();
        let image_path = write_image(&dir, 224, 224);
        let labels_path = dir.path().join("labels.txt");
        fs::write(&labels_path, "zero\none\ntwo\nthree\nfour\nfive\nsix\nseven\neight\nnine").unwrap();

        let runtime = classifier_runtime(StubBehaviour::Fixed(SCORES.to_vec()));
        let labels = Labels::from_file(&labels_path).unwrap();
        let mut session = InferenceSession::load(&runtime, b"ignored").unwrap();

        let predictions = session.classify(&image_path, &labels, DEFAULT_TOP_K).unwrap();
        let mut output = Vec::new();
        write_report(&mut output, "input.png", &predictions).unwrap();
        let text = String::from_utf8(output).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "input.png is a ");
        assert_eq!(&lines[2..], &[
            "1 one 0.90000",
            "2 five 0.60000",
            "3 three 0.30000",
            "4 zero 0.10000",
            "5 two 0.05000",
            "6 four 0.02000",
        ]);
        assert_eq!(runtime.executions(), 1);
    }

    #[test]
    fn test_image_is_normalized_into_the_input() {
        let dir = TempDir::new().unwrap();
        let image_path = write_image(&dir, 300, 200);

        let runtime = classifier_runtime(StubBehaviour::PassThrough);
        let mut session = InferenceSession::load(&runtime, &[]).unwrap();
        session.load_image(&image_path).unwrap();

        let input = session.input_mut();
        assert_eq!(input.len(), 3 * 224 * 224);
        assert!(input.iter().all(|&value| (-1.0..=1.0).contains(&value)));

        // Blue is constant 128 before and after resizing.
        let blue = &input[2 * 224 * 224..];
        assert!(blue.iter().all(|&value| (value - (128.0 / 127.5 - 1.0)).abs() < 1e-6));
    }

    #[test]
    fn test_pass_through_output_starts_with_input() {
        let dir = TempDir::new().unwrap();
        let image_path = write_image(&dir, 224, 224);

        let runtime = classifier_runtime(StubBehaviour::PassThrough);
        let mut session = InferenceSession::load(&runtime, &[]).unwrap();
        session.load_image(&image_path).unwrap();
        let head = session.input_mut()[..10].to_vec();

        let output = session.infer().unwrap();
        assert_eq!(output, head.as_slice());
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let dir = TempDir::new().unwrap();
        let runtime = classifier_runtime(StubBehaviour::PassThrough);
        let mut session = InferenceSession::load(&runtime, &[]).unwrap();

        let result = session.load_image(&dir.path().join("absent.png"));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_image_input_shape_is_rejected() {
        let dir = TempDir::new().unwrap();
        let image_path = write_image(&dir, 16, 16);
        let runtime = StubRuntime::new(
            vec![Dims::from([4, 16, 16]), Dims::from([10])],
            StubBehaviour::PassThrough,
        );
        let mut session = InferenceSession::load(&runtime, &[]).unwrap();

        let result = session.load_image(&image_path);
        assert!(matches!(result, Err(InferenceError::UnsupportedInputShape { .. })));
    }

    #[test]
    fn test_missing_engine_file() {
        let dir = TempDir::new().unwrap();
        let runtime = classifier_runtime(StubBehaviour::PassThrough);

        let result = InferenceSession::from_file(&runtime, &dir.path().join("absent_engine"));
        assert!(matches!(result, Err(InferenceError::Io(_))));
    }
}
