//! Scenario tests for the generation core
//!
//! Unit tests live next to the code they cover; these exercise components
//! together.

pub mod quality_tests;
pub mod resilience_tests;

/// Shared sample content
pub(crate) mod fixtures {
    use crate::regeneration::RawGenerationResult;
    use crate::resilience::{OperationMetadata, OperationResult};

    /// A well-formed children's story, title on the first line
    pub const GOOD_STORY: &str = concat!(
        "Luna and the Lantern of Stars\n\n",
        "Once upon a time, in a quiet village by the sea, there lived a curious girl named Luna. Every night she watched the sparkling stars from her window and wondered why they glowed.\n\n",
        "One day, Luna found an ancient lantern in the attic of her grandmother. \"What is this?\" she asked. Her grandmother smiled. \"It is a magical lantern. It helps you discover the secrets of the sky.\"\n\n",
        "Luna was excited! That evening she climbed the hill with her friend Theo. Together they opened the lantern, and a gentle, golden light floated up toward the moon. Suddenly, the stars began to whisper. \"Count us, and you will learn our names,\" they said.\n\n",
        "Luna and Theo counted the stars one by one. They learned that stars are giant balls of burning gas, very far away. Theo was worried at first, but Luna was brave and helped him understand the shapes of the constellations.\n\n",
        "Finally, the lantern dimmed and the children walked home, proud and happy. From that day on, Luna and Theo explored the night sky together and shared what they learned with everyone in the village. The end.",
    );

    /// Too short to pass any reasonable gate
    pub const BAD_STORY: &str = "Bad story. The end.";

    pub fn raw(content: &str) -> RawGenerationResult {
        RawGenerationResult::new(content, "test-provider", "test-model")
    }

    pub fn generated(content: &str) -> OperationResult<RawGenerationResult> {
        OperationResult::success(raw(content), OperationMetadata::new("test"))
    }
}
