// balltrack_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::estimation::{BallFilter, TrackingPhase};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::messages::{BallState, CameraInfo, RobotInfo, VisionFrame};
pub use crate::types::{millis, secs_between, CameraId, RobotId, Team, Timestamp};

// --- Configuration & Errors ---
pub use crate::config::BallFilterConfig;
pub use crate::error::{ConfigError, FilterError};

// --- Concrete Implementations ---
pub use crate::estimation::filters::BallGroundCollisionFilter;
pub use crate::estimation::possession::{BallOffsetInfo, BallOffsetTracker};
pub use crate::tracking::{FilterManager, ManagerConfig};
