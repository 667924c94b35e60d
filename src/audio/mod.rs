pub mod analysis;
pub mod decode;
pub mod features;

pub use analysis::{AnalysisSettings, AudioFeatureExtractor};
pub use decode::{decode_audio, AudioData};
pub use features::AudioFeatures;
