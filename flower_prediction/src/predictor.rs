use crate::{
    decoder::{decode, CanonicalImage},
    error::{InferenceError, PredictionFailure},
    model_service::ClassifierModel,
    preprocess::preprocess_default,
    FLOWER_CLASSES,
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::sync::Arc;

/// Per-class probabilities in label order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<(&'static str, f32)>);

impl ClassProbabilities {
    pub fn get(&self, label: &str) -> Option<f32> {
        self.0
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, p)| *p)
    }

    /// Most likely class. Ties go to the earlier label.
    pub fn top(&self) -> Option<(&'static str, f32)> {
        self.0
            .iter()
            .copied()
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, probability) in &self.0 {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

/// Numerically stable softmax.
///
/// `+inf` scores share all of the mass, matching the limit of the exact
/// formula. NaN and `-inf` get zero mass. If no score is usable the result is
/// uniform, so the output always sums to one.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let infinite = scores.iter().filter(|s| **s == f32::INFINITY).count();
    if infinite > 0 {
        let share = 1.0 / infinite as f32;
        return scores
            .iter()
            .map(|&s| if s == f32::INFINITY { share } else { 0.0 })
            .collect();
    }

    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        let uniform = 1.0 / scores.len() as f32;
        return vec![uniform; scores.len()];
    }

    let exps: Vec<f32> = scores
        .iter()
        .map(|&s| if s.is_finite() { (s - max).exp() } else { 0.0 })
        .collect();
    // The max element contributes exp(0) = 1, so the sum is never zero.
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pairs probabilities with the fixed label list.
///
/// The label order must match the class order the model was trained with.
/// Only the length can be checked here; a reordered label list silently
/// mislabels every prediction.
fn label_probabilities(probabilities: Vec<f32>) -> Result<ClassProbabilities, InferenceError> {
    if probabilities.len() != FLOWER_CLASSES.len() {
        return Err(InferenceError::OutputLength {
            expected: FLOWER_CLASSES.len(),
            actual: probabilities.len(),
        });
    }
    Ok(ClassProbabilities(
        FLOWER_CLASSES.iter().copied().zip(probabilities).collect(),
    ))
}

pub struct Predictor<M: ClassifierModel> {
    model: Arc<M>,
}

impl<M: ClassifierModel> Clone for Predictor<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<M: ClassifierModel> Predictor<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    pub fn predict(&self, image: &CanonicalImage) -> Result<ClassProbabilities, PredictionFailure> {
        let tensor = preprocess_default(image)?;
        tracing::debug!("Preprocessed image into tensor of shape {:?}", tensor.shape());

        let scores = self.model.invoke(&tensor)?;
        tracing::debug!("Model returned {} scores", scores.len());

        let probabilities = label_probabilities(softmax(&scores))?;
        tracing::debug!(predictions = ?probabilities, "Prediction complete");

        Ok(probabilities)
    }

    /// Decodes an uploaded payload and classifies it.
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<ClassProbabilities, PredictionFailure> {
        let image = decode(bytes)?;
        self.predict(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::DecodeError, preprocess::NormalizedTensor};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    const TOLERANCE: f32 = 1e-6;

    struct FixedScores(Vec<f32>);

    impl ClassifierModel for FixedScores {
        fn invoke(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    impl ClassifierModel for FailingModel {
        fn invoke(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::MissingOutput("logits".to_string()))
        }
    }

    /// Scores the class whose index matches the red level of the top-left pixel.
    struct RedChannelModel;

    impl ClassifierModel for RedChannelModel {
        fn invoke(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
            let red = input.view()[[0, 0, 0, 0]];
            let class = (red * 255.0).round() as usize % FLOWER_CLASSES.len();
            let mut scores = vec![0.0; FLOWER_CLASSES.len()];
            scores[class] = 10.0;
            Ok(scores)
        }
    }

    fn solid_image(red: u8) -> CanonicalImage {
        CanonicalImage::from(ImageBuffer::from_pixel(64, 48, Rgb([red, 30, 60])))
    }

    fn png_bytes(image: &CanonicalImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.as_rgb().clone())
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        for scores in [
            vec![0.1, 0.1, 0.1, 0.1, 5.0],
            vec![-3.0, 2.5, 0.0, 7.25, -0.5],
            vec![0.0; 5],
        ] {
            let probabilities = softmax(&scores);
            let sum: f32 = probabilities.iter().sum();
            assert!((sum - 1.0).abs() < TOLERANCE, "sum was {}", sum);
            assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_softmax_large_logits_do_not_overflow() {
        let probabilities = softmax(&[1000.0, 1000.0, -1000.0, 999.0, 0.0]);

        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert!((probabilities[0] - probabilities[1]).abs() < TOLERANCE);
        assert_eq!(probabilities[2], 0.0);
    }

    #[test]
    fn test_softmax_ignores_nan_and_negative_infinity() {
        let probabilities = softmax(&[f32::NAN, 1.0, f32::NEG_INFINITY, 1.0, 0.0]);

        assert_eq!(probabilities[0], 0.0);
        assert_eq!(probabilities[2], 0.0);
        assert!(probabilities[1] > probabilities[4]);
        assert!((probabilities[1] - probabilities[3]).abs() < TOLERANCE);
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_softmax_positive_infinity_takes_all_mass() {
        let probabilities = softmax(&[f32::INFINITY, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(probabilities, vec![1.0, 0.0, 0.0, 0.0, 0.0]);

        // Agrees with the largest finite logit in the same position.
        let near = softmax(&[f32::MAX, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(near, probabilities);
    }

    #[test]
    fn test_softmax_splits_between_positive_infinities() {
        let probabilities = softmax(&[f32::INFINITY, f32::NAN, 3.0, f32::INFINITY, 0.0]);
        assert_eq!(probabilities, vec![0.5, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_predict_infinite_logit_wins() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![
            f32::INFINITY,
            0.0,
            0.0,
            0.0,
            0.0,
        ])));

        let result = predictor.predict(&solid_image(7)).unwrap();

        assert_eq!(result.top(), Some(("dandelion", 1.0)));
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn test_softmax_all_non_finite_is_uniform() {
        let probabilities = softmax(&[f32::NAN; 5]);
        assert!(probabilities.iter().all(|p| (*p - 0.2).abs() < TOLERANCE));
    }

    #[test]
    fn test_predict_roses() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![0.1, 0.1, 0.1, 0.1, 5.0])));

        let result = predictor.predict(&solid_image(200)).unwrap();

        assert_eq!(result.len(), 5);
        let (label, probability) = result.top().unwrap();
        assert_eq!(label, "roses");
        assert!(probability > 0.9);
        let rest: f32 = result
            .iter()
            .filter(|(name, _)| *name != "roses")
            .map(|(_, p)| p)
            .sum();
        assert!((rest + probability - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_predict_keeps_label_order() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![9.0, 0.0, 0.0, 0.0, 0.0])));

        let result = predictor.predict(&solid_image(0)).unwrap();
        let labels: Vec<_> = result.iter().map(|(name, _)| name).collect();

        assert_eq!(labels, FLOWER_CLASSES);
        assert_eq!(result.top().unwrap().0, "dandelion");
        assert!(result.get("tulips").unwrap() < 0.01);
    }

    #[test]
    fn test_predict_wraps_inference_error() {
        let predictor = Predictor::new(Arc::new(FailingModel));

        let result = predictor.predict(&solid_image(1));

        assert!(matches!(result, Err(PredictionFailure::Inference(_))));
    }

    #[test]
    fn test_predict_rejects_wrong_score_count() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![1.0, 2.0, 3.0])));

        let result = predictor.predict(&solid_image(1));

        assert!(matches!(
            result,
            Err(PredictionFailure::Inference(InferenceError::OutputLength {
                expected: 5,
                actual: 3
            }))
        ));
    }

    #[test]
    fn test_predict_bytes_rejects_non_image() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![0.0; 5])));

        let result = predictor.predict_bytes(b"GIF89a but not really");

        assert!(matches!(result, Err(PredictionFailure::Decode(_))));
    }

    #[test]
    fn test_predict_bytes_empty_payload() {
        let predictor = Predictor::new(Arc::new(FixedScores(vec![0.0; 5])));

        let result = predictor.predict_bytes(&[]);

        assert!(matches!(
            result,
            Err(PredictionFailure::Decode(DecodeError::Empty))
        ));
    }

    #[test]
    fn test_concurrent_predictions_are_independent() {
        let predictor = Predictor::new(Arc::new(RedChannelModel));
        let payloads: Vec<(usize, Vec<u8>)> = (0..FLOWER_CLASSES.len() * 4)
            .map(|i| (i % FLOWER_CLASSES.len(), png_bytes(&solid_image(i as u8))))
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = payloads
                .iter()
                .map(|(expected, bytes)| {
                    let predictor = predictor.clone();
                    scope.spawn(move || (*expected, predictor.predict_bytes(bytes).unwrap()))
                })
                .collect();

            for handle in handles {
                let (expected, result) = handle.join().unwrap();
                assert_eq!(result.top().unwrap().0, FLOWER_CLASSES[expected]);
                assert_eq!(result.len(), FLOWER_CLASSES.len());
            }
        });
    }

    #[test]
    fn test_serializes_in_label_order() {
        let probabilities = label_probabilities(vec![0.5, 0.25, 0.125, 0.0625, 0.0625]).unwrap();

        let json = serde_json::to_string(&probabilities).unwrap();

        assert_eq!(
            json,
            r#"{"dandelion":0.5,"daisy":0.25,"tulips":0.125,"sunflowers":0.0625,"roses":0.0625}"#
        );
    }
}
