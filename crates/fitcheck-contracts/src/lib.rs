pub mod analysis;
pub mod commands;
pub mod events;
pub mod history;
pub mod image;
pub mod outfits;
pub mod summary;

pub use analysis::{AnalysisDecodeError, OutfitAnalysis, OUTFIT_COUNT};
pub use history::ExclusionHistory;
pub use image::{DataUrl, ImageError, UploadedImage};
pub use outfits::{OutfitResult, OutfitResults, OutfitStatus};
