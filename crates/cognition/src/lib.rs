pub mod classifier;
pub mod engine;
pub mod merge;
pub mod present;
pub mod trajectory;
pub mod types;

pub use classifier::classify_complexity;
pub use engine::CognitionEngine;
pub use trajectory::EmotionalTrajectory;
pub use types::{CognitiveMerge, Complexity, HistoryTurn, MemoryStream, PresentStream};
