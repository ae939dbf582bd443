pub mod compiler;
pub mod diagnostics;
pub mod errors;
pub mod introspector;
pub mod request;
pub mod resolver;
pub mod state;
pub mod synthesizer;

pub use compiler::{CompileOutcome, ProxyViewCompiler};
pub use errors::ProxyError;
pub use introspector::LiveViewIntrospector;
pub use request::{CompilationRequest, TargetField};
pub use resolver::{FieldEquivalenceResolver, Resolution};
pub use state::{ExposedViewState, Exposure, ViewSnapshot};
pub use synthesizer::{ExpressionSynthesizer, MAX_ARRAY_LITERAL_ELEMENTS};
