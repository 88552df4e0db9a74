pub mod encoder;
pub mod multi_layer_perceptron;
