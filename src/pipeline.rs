//! Incremental backfill pipeline: gap detection, asset resolution, spatial
//! aggregation, geometry repair and the run driver that sequences them.

pub mod aggregate;
pub mod gaps;
pub mod lease;
pub mod repair;
pub mod resolve;
pub mod run;

pub use aggregate::{Aggregation, AggregationSettings, SpatialAggregator};
pub use gaps::{GapResolver, PeriodGaps};
pub use lease::{LeaseRecord, RunLease};
pub use repair::{repair_geometries, RepairOutcome, RowDiagnostic};
pub use resolve::{AssetResolver, ResolvedAsset};
pub use run::{
    latest_snapshot, BackfillResult, BackfillSettings, BackfillStatus, SkippedPeriod, Snapshot,
    TableBuilder,
};
