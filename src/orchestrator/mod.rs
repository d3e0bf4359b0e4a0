pub mod actor;
pub mod registry;
pub mod state;
pub mod subscription;

pub use actor::{ActorContext, ActorHandle, SummaryTurn, TurnReport};
pub use registry::Orchestrator;
pub use state::{ActorPhase, OrchestratorState};
pub use subscription::SubscriptionManager;
