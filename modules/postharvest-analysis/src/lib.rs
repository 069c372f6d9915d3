pub mod chain;
pub mod images;
pub mod parse;
pub mod prompt;

pub use chain::{
    placeholder_analysis, AnalysisChain, Stage, ANALYSIS_IMAGE_LIMIT, DEFAULT_FREE_MODELS,
    PLACEHOLDER_MODEL, REMIX_IMAGE_LIMIT,
};
pub use images::{collect_images, EncodedImage, HttpImageFetcher, ImageError, ImageFetcher};
pub use parse::{parse_ai_response, ParsedResponse};
pub use prompt::{remix_request, transcript, ANALYSIS_SYSTEM_PROMPT, REMIX_SYSTEM_PROMPT};
