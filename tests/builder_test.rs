//! Integration tests for describing networks and building engine plans.

use enginert_inference::engine_plan::LayerInfo;
use enginert_inference::errors::NetworkError;
use enginert_inference::network::{Builder, BuilderConfig, NetworkDefinition, TensorId, Weights};
use enginert_inference::{Activation, Dims};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn add_cbr(network: &mut NetworkDefinition, input: TensorId, rng: &mut StdRng) -> TensorId {
    let conv = network
        .add_convolution(
            input,
            64,
            [7, 7],
            Weights::random(64 * 3 * 7 * 7, rng),
            Weights::random(64, rng),
        )
        .unwrap();
    network.set_stride(conv, [2, 2]).unwrap();
    network.set_padding(conv, [3, 3]).unwrap();
    let relu = network
        .add_activation(network.layer_output(conv).unwrap(), Activation::Relu)
        .unwrap();
    network.layer_output(relu).unwrap()
}

fn cbr_network() -> NetworkDefinition {
    let mut rng = StdRng::seed_from_u64(7);
    let mut network = NetworkDefinition::new();
    let input = network.add_input("data", [3, 224, 224]).unwrap();

    let first = add_cbr(&mut network, input, &mut rng);
    let _unused = add_cbr(&mut network, input, &mut rng);
    let third = add_cbr(&mut network, input, &mut rng);

    let concat = network.add_concatenation(&[first, third]).unwrap();
    let output = network.layer_output(concat).unwrap();
    network.set_tensor_name(output, "prob").unwrap();
    network.mark_output(output).unwrap();
    network
}

#[cfg(test)]
mod cbr_tests {
    use super::*;

    #[test]
    fn test_cbr_plan_layout() {
        let plan = Builder::default().build_engine(&cbr_network()).unwrap();

        assert_eq!(plan.layers.len(), 7);
        assert_eq!(plan.weights.len(), 6);
        assert_eq!(plan.bindings.len(), 2);
        assert_eq!(plan.bindings[0].name, "data");
        assert!(plan.bindings[0].is_input);
        assert_eq!(plan.bindings[1].name, "prob");
        assert!(!plan.bindings[1].is_input);
        assert_eq!(plan.max_batch_size, 1);
    }

    #[test]
    fn test_cbr_output_shape() {
        let plan = Builder::default().build_engine(&cbr_network()).unwrap();

        assert_eq!(plan.binding_dims(0), Some(&Dims::from([3, 224, 224])));
        assert_eq!(plan.binding_dims(1), Some(&Dims::from([128, 112, 112])));
    }

    #[test]
    fn test_unused_branch_is_still_built() {
        let plan = Builder::default().build_engine(&cbr_network()).unwrap();

        let convolutions = plan
            .layers
            .iter()
            .filter(|layer| matches!(layer, LayerInfo::Convolution(_)))
            .count();
        assert_eq!(convolutions, 3);
        match plan.layers.last() {
            Some(LayerInfo::Concatenation(info)) => assert_eq!(info.inputs.len(), 2),
            other => panic!("Expected a concatenation last, got {:?}", other),
        }
    }

    #[test]
    fn test_same_seed_builds_same_plan() {
        let first = Builder::default().build_engine(&cbr_network()).unwrap();
        let second = Builder::default().build_engine(&cbr_network()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fp16_request_still_builds() {
        let builder = Builder::new(BuilderConfig {
            max_batch_size: 4,
            fp16_mode: true,
        });
        let plan = builder.build_engine(&cbr_network()).unwrap();
        assert_eq!(plan.max_batch_size, 4);
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_network_without_outputs() {
        let mut network = NetworkDefinition::new();
        network.add_input("data", [3, 8, 8]).unwrap();
        let result = Builder::default().build_engine(&network);
        assert!(matches!(result, Err(NetworkError::NoOutputs)));
    }

    #[test]
    fn test_network_without_inputs() {
        let result = Builder::default().build_engine(&NetworkDefinition::new());
        assert!(matches!(result, Err(NetworkError::NoInputs)));
    }

    #[test]
    fn test_kernel_size_mismatch() {
        let mut network = NetworkDefinition::new();
        let input = network.add_input("data", [3, 8, 8]).unwrap();
        let conv = network
            .add_convolution(input, 2, [3, 3], Weights::new(vec![0.0; 10]), Weights::empty())
            .unwrap();
        network.mark_output(network.layer_output(conv).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(
            result,
            Err(NetworkError::KernelSizeMismatch {
                expected: 54,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_bias_size_mismatch() {
        let mut network = NetworkDefinition::new();
        let input = network.add_input("data", [1, 4, 4]).unwrap();
        let conv = network
            .add_convolution(
                input,
                2,
                [1, 1],
                Weights::new(vec![1.0; 2]),
                Weights::new(vec![0.0; 3]),
            )
            .unwrap();
        network.mark_output(network.layer_output(conv).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(
            result,
            Err(NetworkError::BiasSizeMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_kernel_larger_than_input() {
        let mut network = NetworkDefinition::new();
        let input = network.add_input("data", [1, 2, 2]).unwrap();
        let conv = network
            .add_convolution(input, 1, [3, 3], Weights::new(vec![1.0; 9]), Weights::empty())
            .unwrap();
        network.mark_output(network.layer_output(conv).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(result, Err(NetworkError::EmptyOutput { .. })));
    }

    #[test]
    fn test_zero_stride() {
        let mut network = NetworkDefinition::new();
        let input = network.add_input("data", [1, 4, 4]).unwrap();
        let conv = network
            .add_convolution(input, 1, [1, 1], Weights::new(vec![1.0]), Weights::empty())
            .unwrap();
        network.set_stride(conv, [0, 1]).unwrap();
        network.mark_output(network.layer_output(conv).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(
            result,
            Err(NetworkError::NonPositiveParameter { value: [0, 1], .. })
        ));
    }

    #[test]
    fn test_concatenation_shape_mismatch() {
        let mut network = NetworkDefinition::new();
        let a = network.add_input("a", [2, 4, 4]).unwrap();
        let b = network.add_input("b", [2, 5, 4]).unwrap();
        let concat = network.add_concatenation(&[a, b]).unwrap();
        network.mark_output(network.layer_output(concat).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(
            result,
            Err(NetworkError::ConcatenationShapeMismatch { axis: 0, .. })
        ));
    }

    #[test]
    fn test_concatenation_axis_out_of_range() {
        let mut network = NetworkDefinition::new();
        let a = network.add_input("a", [2, 4, 4]).unwrap();
        let concat = network.add_concatenation(&[a, a]).unwrap();
        network.set_axis(concat, 3).unwrap();
        network.mark_output(network.layer_output(concat).unwrap()).unwrap();

        let result = Builder::default().build_engine(&network);
        assert!(matches!(
            result,
            Err(NetworkError::ConcatenationAxisOutOfRange { axis: 3, rank: 3, .. })
        ));
    }
}
