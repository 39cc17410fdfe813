mod bee_tracker;
mod blob;
mod kalman_filter;
mod matching;
mod palette;
mod registry;
mod track;
mod track_state;

pub use bee_tracker::{StepSummary, Tracker, TrackerConfig};
pub use blob::{AreaRange, Blob, Point, SizeClass, classify_area};
pub use kalman_filter::{KalmanFilter, KalmanNoise, MotionModel};
pub use matching::{AssignmentResult, association_costs, linear_assignment};
pub use palette::{Color, Palette, PaletteConfig};
pub use registry::{TrackId, TrackRegistry};
pub use track::{Trace, Track};
pub use track_state::TrackState;
