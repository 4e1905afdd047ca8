pub mod analysis;
pub mod intent;
pub mod state;
pub mod venue;

pub use analysis::{
    CostConfidence, CostRecord, RankedVenue, RiskKind, RiskRecord, RiskSeverity, VibeRecord,
};
pub use intent::{AnalystKind, ComplexityTier, ParsedIntent};
pub use state::{LatLng, PlanState, StateUpdate};
pub use venue::{PriceBand, VenueRecord, VenueSource};
