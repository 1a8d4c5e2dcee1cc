pub mod backends;
pub mod error;
pub mod loader;
pub mod memory;
pub mod traits;

#[cfg(feature = "calamine")]
pub use backends::CalamineAdapter;
#[cfg(feature = "umya")]
pub use backends::UmyaAdapter;
pub use error::WorkbookError;
pub use loader::{BackendKind, open_document};
pub use memory::{MemoryDocument, MemoryDocumentBuilder, MemorySheet};
pub use traits::{Cell, Document, NamedExpression, Row, Sheet};

// Re-export for convenience
pub use formcorpus_common::{CellKind, FormulaToken, TokenKind};
