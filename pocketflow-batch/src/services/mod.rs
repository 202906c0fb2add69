//! Services: clustering, cliff analysis, discovery and tool collaborators

pub mod cliff_analyzer;
pub mod evaluation;
pub mod file_scanner;
pub mod fpocket_detector;
pub mod overlap_clusterer;
pub mod p2rank_rescorer;
pub mod tool_locator;

pub use cliff_analyzer::{analyze_cliff, CliffAnalysis, CliffError, CliffStatistics};
pub use file_scanner::{FileScanner, ScanError};
pub use fpocket_detector::FpocketDetector;
pub use overlap_clusterer::OverlapClusterer;
pub use p2rank_rescorer::P2RankRescorer;
pub use tool_locator::{P2RankHome, ToolError, ToolLocator};
