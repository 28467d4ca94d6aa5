//! Console request pipeline.
//!
//! 1. **Classification** (`classify`): raw path and query to `ConsoleOperation`
//! 2. **Routing** (`router`): catalog lookup, coercion, delegation, rendering
//! 3. **Delegation** (`delegate`): inline or single-thread affinity execution
//! 4. **Service** (`console`): `tower::Service` front running on the blocking pool
//! 5. **Background workers** (`worker`): periodic registry sweeps

pub mod classify;
pub mod config;
pub mod console;
pub mod delegate;
pub mod operation;
pub mod router;
pub mod worker;

pub use classify::classify;
pub use config::ConsoleConfig;
pub use console::{ConsoleError, ConsoleRequest, ConsoleService};
pub use delegate::{
    AffinityDelegate, AffinityQueue, Call, DelegateError, ExecutionDelegate, InlineDelegate,
};
pub use operation::{ConsoleOperation, ConsoleResponse, ResponseStatus, RouteError};
pub use router::InvocationRouter;
pub use worker::{BackgroundRunnable, BackgroundWorker, RegistrySweeper, SweepTask};
