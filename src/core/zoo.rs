//! The candidate architectures compared by the validation sweep.
//!
//! Candidates grow in capacity from a linear classifier on raw pixels up to two
//! convolution blocks with batch normalization and dropout.

use super::architecture::{Architecture, ConvSpec, DenseSpec};

/// All candidates, in evaluation order.
pub fn architectures() -> Vec<Architecture> {
    vec![
        Architecture::new("Model 1"),
        Architecture::new("Model 2").with_dense(DenseSpec::new(32)),
        Architecture::new("Model 3")
            .with_conv(ConvSpec::new(32))
            .with_dense(DenseSpec::new(64)),
        Architecture::new("Model 4")
            .with_conv(ConvSpec::new(64).with_batch_norm())
            .with_conv(ConvSpec::new(64))
            .with_dense(DenseSpec::new(128)),
        Architecture::new("Model 5")
            .with_conv(ConvSpec::new(128).with_batch_norm())
            .with_conv(ConvSpec::new(128))
            .with_dense(DenseSpec::new(256).with_dropout(0.3)),
        Architecture::new("Model 6")
            .with_conv(ConvSpec::new(256))
            .with_conv(ConvSpec::new(256))
            .with_dense(DenseSpec::new(512).with_dropout(0.4)),
        Architecture::new("Model 7")
            .with_conv(ConvSpec::new(128).with_batch_norm())
            .with_conv(ConvSpec::new(128))
            .with_dense(DenseSpec::new(256).with_dropout(0.5)),
        best(),
    ]
}

/// The best performing candidate, used for the deployed model.
pub fn best() -> Architecture {
    Architecture::new("Model 8")
        .with_conv(ConvSpec::new(128).with_batch_norm())
        .with_conv(ConvSpec::new(128))
        .with_dense(DenseSpec::new(256).with_dropout(0.4))
}
