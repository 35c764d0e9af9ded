//! Mode_0's voice: response templates, text composition and profile
//! inference.

mod composer;
mod profiler;
mod templates;

pub use composer::ResponseComposer;
pub use profiler::{MessageInsights, ProfileAnalyzer};
pub use templates::ResponseTemplates;
