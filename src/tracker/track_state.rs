/// Track lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created from an unmatched blob this frame
    #[default]
    Spawned,
    /// Matched to a blob in the latest frame
    Active,
    /// Predicted without a match, miss counter above zero
    Coasting,
    /// Exceeded the miss limit and removed from tracking. Terminal.
    Expired,
}

impl TrackState {
    /// Whether the track is still part of the live set.
    pub fn is_live(self) -> bool {
        self != TrackState::Expired
    }
}
