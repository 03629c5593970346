// Pipeline stages, in execution order
//
// Each stage reads and updates the shared `PipelineContext` and reports its
// status line through `PipelineStatus`.

#[path = "01_gather.rs"]
pub mod gather;
#[path = "02_dedup.rs"]
pub mod dedup;
#[path = "03_enrich.rs"]
pub mod enrich;
#[path = "04_score.rs"]
pub mod score;
#[path = "05_output.rs"]
pub mod output;

pub use dedup::DedupPhase;
pub use enrich::EnrichPhase;
pub use gather::GatherPhase;
pub use output::OutputPhase;
pub use score::ScorePhase;
