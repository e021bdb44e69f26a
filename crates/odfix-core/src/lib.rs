//! odfix core library
//!
//! Repairs order-dependent tests by transplanting the code of a polluter (or
//! setter) into the victim behind a helper call, minimizing it with delta
//! debugging over the statement tree, and grading the result.

pub mod config;
pub mod ddmin;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod hooks;
pub mod inline;
pub mod metrics;
pub mod minimizer;
pub mod obs;
pub mod oracle;
pub mod patch;
pub mod persist;
pub mod placement;
pub mod probe;
pub mod recorder;
pub mod removal;
pub mod selector;
pub mod source;
pub mod statement;
pub mod telemetry;

pub use domain::{
    class_of, merge_cases, method_of, same_test_class, AggregateResult, CausalChain,
    CleanerGroup, CleanerInfo, CollaboratorError, Expectation, FlakyClass, OdfixError,
    OperationTime, PatchRecord, Removability, Result, Status, Stopwatch, TestId, VictimCase,
    NO_CANDIDATE,
};

pub use config::EngineConfig;
pub use ddmin::{ddmin, Validity};
pub use engine::{RepairEngine, RepairOutcome, RepairSession};
pub use metrics::METRICS;
pub use minimizer::minimize;
pub use oracle::{BuildTestOracle, OrderOracle, OrderOutcome, TestOutcome, TestReport};
pub use patch::{AppliedFix, FixPatch};
pub use persist::{sha256_hex, ResultStore};
pub use placement::HelperCall;
pub use probe::Goal;
pub use recorder::{write_patch, PatchArtifact};
pub use selector::{select_candidates, Selection};
pub use source::{ClassHierarchy, CodeUnit, FileBackup, HookCategory, MethodId, SourceTree};
pub use statement::{Handler, Statement};
pub use telemetry::init_tracing;
