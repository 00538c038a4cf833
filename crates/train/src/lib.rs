//! # dualgraph-train — The Variational Training Engine
//!
//! Training loop, objective, and scheduling for the conditional variational
//! dual-graph-to-sequence generator:
//!
//! * **[`Trainer`]** — owns model + optimiser + run state. One call to
//!   [`Trainer::fit`] drives the whole run: a training pass with the
//!   scheduled β, an evaluation pass at β = 1, console and file logging,
//!   checkpointing, and qualitative sampling on a new best.
//! * **[`KlAnneal`]** — cyclic linear KL-weight schedule, one β per epoch.
//! * **[`ScheduledAdam`]** — Adam behind warmup → inverse-square-root decay.
//! * **[`variational_loss`]** — masked reconstruction + analytic Gaussian KL.
//! * **[`SamplingProbe`]** — greedy decoding of a held-out batch for
//!   progress inspection.

pub mod metrics;
pub mod mocks;
pub mod objective;
pub mod probe;
pub mod scheduler;
pub mod trainer;

pub use metrics::{EpochMetrics, EpochSummary};
pub use objective::{gaussian_kld, variational_loss, LossBundle};
pub use probe::SamplingProbe;
pub use scheduler::{frange_cycle_linear, KlAnneal, ScheduledAdam};
pub use trainer::{CheckpointMeta, Trainer};
