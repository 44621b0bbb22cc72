//! Command stack file formats
//!
//! The boundary between persisted stack files and the in-memory step model.
//!
//! # Core Operations
//!
//! - **Parse**: file text → steps (+ stack advancement for YCS)
//! - **Serialize**: steps + stack advancement → file text
//! - **Enrich**: resolve command definitions after parsing
//!
//! # Architecture
//!
//! ```text
//! Storage bytes → FormatCodec::parse → Vec<Step> → enrich_steps → session
//!                                                                    ↓
//! Storage bytes ← FormatCodec::serialize ←──────────────────────── Vec<Step>
//! ```
//!
//! # Example
//!
//! ```rust
//! use cstack_codec::{FormatCodec, StackFormat};
//! use cstack_model::AdvancementParams;
//!
//! let codec = FormatCodec::default();
//! let doc = codec
//!     .parse(r#"<commandStack><command qualifiedName="/A"/></commandStack>"#, StackFormat::Xml)
//!     .unwrap();
//!
//! let json = codec
//!     .serialize(&doc.steps, &AdvancementParams::default(), StackFormat::Ycs)
//!     .unwrap();
//! assert!(json.contains("\"steps\""));
//! ```

// Core modules
pub mod cache;
pub mod enrich;
pub mod error;
pub mod format;
pub mod options;
pub mod xml;
pub mod ycs;

use cstack_model::{AdvancementParams, Step};

// Re-exports for convenience
pub use cache::CachingLookup;
pub use enrich::{enrich_steps, CommandDefinitionLookup, EnrichmentSummary};
pub use error::{CodecError, CodecResult, LookupError, ParseError, SerializeError};
pub use format::{object_basename, object_name_for, StackFormat};
pub use options::{CommandOptionInfo, CommandOptions, OptionKind};
pub use xml::XmlCodec;
pub use ycs::YcsCodec;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A parsed stack file
#[derive(Debug, Clone, PartialEq)]
pub struct StackDocument {
    /// Steps, in file order
    pub steps: Vec<Step>,
    /// Stack advancement, when the format carries one
    pub advancement: Option<AdvancementParams>,
}

impl StackDocument {
    /// Stack advancement, or the caller's default for formats without one
    #[must_use]
    pub fn advancement_or(&self, default: &AdvancementParams) -> AdvancementParams {
        self.advancement.clone().unwrap_or_else(|| default.clone())
    }
}

/// Codec for one stack format
///
/// Implement this trait to add support for new stack formats.
pub trait StackCodec: Send + Sync {
    /// Format handled by this codec
    fn format(&self) -> StackFormat;

    /// Parse file text; any error rejects the whole file
    fn parse(&self, text: &str) -> Result<StackDocument, ParseError>;

    /// Serialize steps and stack advancement
    fn serialize(
        &self,
        steps: &[Step],
        advancement: &AdvancementParams,
    ) -> Result<String, SerializeError>;
}

/// Dispatches to the codec of each supported format
#[derive(Debug, Clone, Default)]
pub struct FormatCodec {
    xml: XmlCodec,
    ycs: YcsCodec,
}

impl FormatCodec {
    /// Codecs sharing one command option table
    #[must_use]
    pub fn new(options: CommandOptions) -> Self {
        Self {
            xml: XmlCodec::new(options.clone()),
            ycs: YcsCodec::new(options),
        }
    }

    /// Codec for a format
    #[must_use]
    pub fn codec(&self, format: StackFormat) -> &dyn StackCodec {
        match format {
            StackFormat::Xml => &self.xml,
            StackFormat::Ycs => &self.ycs,
        }
    }

    /// Parse text in the given format
    pub fn parse(&self, text: &str, format: StackFormat) -> Result<StackDocument, ParseError> {
        self.codec(format).parse(text)
    }

    /// Serialize into the given format
    pub fn serialize(
        &self,
        steps: &[Step],
        advancement: &AdvancementParams,
        format: StackFormat,
    ) -> Result<String, SerializeError> {
        self.codec(format).serialize(steps, advancement)
    }
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for reading and writing stack files
    pub use crate::enrich::{enrich_steps, CommandDefinitionLookup};
    pub use crate::error::{CodecError, LookupError, ParseError, SerializeError};
    pub use crate::format::StackFormat;
    pub use crate::options::{CommandOptionInfo, CommandOptions, OptionKind};
    pub use crate::{FormatCodec, StackCodec, StackDocument};
}
